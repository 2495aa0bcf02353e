//! DAQ-Core: acquisition and recording coordination across independent devices
//!
//! Each device streams on its own worker thread; this crate turns those
//! independent lifecycles into blocking aggregate commands. It features:
//!
//! - A per-device streaming/recording state machine with live and trial buffers
//! - Keep-alive worker threads with falling-behind detection
//! - A device registry with concurrent fan-out and a synchronized recording start
//! - Layered TOML configuration with environment overrides
//! - A simulated device for tests and demos
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use daq_core::devices::{Devices, SimulatedDevice, SimulatorConfig};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut devices = Devices::new();
//!     devices.add(Box::new(SimulatedDevice::new(SimulatorConfig::named("emg"))?));
//!     devices.add(Box::new(SimulatedDevice::new(SimulatorConfig::named("imu"))?));
//!
//!     assert!(devices.connect());
//!     assert!(devices.start_recording());
//!     std::thread::sleep(Duration::from_millis(200));
//!     assert!(devices.stop_recording());
//!
//!     println!("{}", devices.serialize()?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod data;
pub mod devices;
pub mod error;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CollectorSettings, ConfigLoader, DevicesConfig, OrchestratorSettings};
pub use data::{DataPoint, TimeSeries};
pub use devices::{
    AsyncDataCollector, Collector, CollectorBackend, DataCollector, Device, DeviceId, Devices,
    PendingTransition, SimulatedDevice, SimulatorConfig, WorkerState,
};
pub use error::{DaqError, DaqResult};

pub use utils::{
    event::Event,
    time::{current_timestamp_nanos, TimeProvider},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Multi-device acquisition and recording coordination".to_string(),
        features: vec![
            "Streaming/recording state machine".to_string(),
            "Keep-alive collector workers".to_string(),
            "Barrier-synchronized recording start".to_string(),
            "Layered configuration management".to_string(),
            "Simulated devices".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub features: Vec<String>,
}
