// src/devices/mod.rs
//! Device abstraction, collectors and the multi-device orchestrator
//!
//! - [`DataCollector`]: per-device streaming/recording state machine and buffers
//! - [`AsyncDataCollector`]: the same driven by a keep-alive worker thread
//! - [`Devices`]: registry turning per-device operations into aggregate ones
//! - [`SimulatedDevice`]: synthetic signal source for tests and demos

pub mod async_collector;
pub mod data_collector;
pub mod pending;
pub mod registry;
pub mod simulator;
pub mod traits;
pub mod worker;

/// Registry key of a device. Allocated from a counter, never reused.
pub type DeviceId = usize;

pub use async_collector::AsyncDataCollector;
pub use data_collector::{CollectorFlags, DataCollector};
pub use pending::PendingTransition;
pub use registry::{CollectorSnapshot, Devices, DevicesSnapshot};
pub use simulator::{SimulatedDevice, SimulatorBackend, SimulatorConfig, SimulatorStats};
pub use traits::{Collector, CollectorBackend, Device};
pub use worker::WorkerState;
