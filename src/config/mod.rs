// src/config/mod.rs
//! Configuration for collectors, the orchestrator and simulated devices

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use crate::devices::simulator::SimulatorConfig;
use crate::error::{DaqError, DaqResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DevicesConfig {
    #[serde(default)]
    pub collector: CollectorSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub simulators: Vec<SimulatorConfig>,
}

/// Per-collector worker settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CollectorSettings {
    #[serde(default = "defaults::keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,

    #[serde(default = "defaults::start_timeout_ms")]
    pub start_timeout_ms: u64,

    #[serde(default = "defaults::collector_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default)]
    pub ignore_too_slow_warning: bool,
}

/// Aggregate operation settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OrchestratorSettings {
    #[serde(default = "defaults::barrier_timeout_ms")]
    pub barrier_timeout_ms: u64,

    #[serde(default = "defaults::orchestrator_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;

    pub fn keep_alive_interval_ms() -> u64 { collector::DEFAULT_KEEP_ALIVE_INTERVAL_MS }
    pub fn start_timeout_ms() -> u64 { collector::DEFAULT_START_TIMEOUT_MS }
    pub fn collector_stop_timeout_ms() -> u64 { collector::DEFAULT_STOP_TIMEOUT_MS }

    pub fn barrier_timeout_ms() -> u64 { orchestrator::DEFAULT_BARRIER_TIMEOUT_MS }
    pub fn orchestrator_stop_timeout_ms() -> u64 { orchestrator::DEFAULT_STOP_TIMEOUT_MS }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            keep_alive_interval_ms: defaults::keep_alive_interval_ms(),
            start_timeout_ms: defaults::start_timeout_ms(),
            stop_timeout_ms: defaults::collector_stop_timeout_ms(),
            ignore_too_slow_warning: false,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            barrier_timeout_ms: defaults::barrier_timeout_ms(),
            stop_timeout_ms: defaults::orchestrator_stop_timeout_ms(),
        }
    }
}

impl CollectorSettings {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> DaqResult<()> {
        let interval = self.keep_alive_interval_ms;
        if !(collector::MIN_KEEP_ALIVE_INTERVAL_MS..=collector::MAX_KEEP_ALIVE_INTERVAL_MS)
            .contains(&interval)
        {
            return Err(DaqError::configuration(
                "collector",
                "validate",
                format!(
                    "keep_alive_interval_ms must be within {}..={}, got {}",
                    collector::MIN_KEEP_ALIVE_INTERVAL_MS,
                    collector::MAX_KEEP_ALIVE_INTERVAL_MS,
                    interval
                ),
            ));
        }
        if self.start_timeout_ms == 0 || self.stop_timeout_ms == 0 {
            return Err(DaqError::configuration(
                "collector",
                "validate",
                "start and stop timeouts must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl OrchestratorSettings {
    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> DaqResult<()> {
        if self.barrier_timeout_ms == 0 || self.stop_timeout_ms == 0 {
            return Err(DaqError::configuration(
                "orchestrator",
                "validate",
                "barrier and stop timeouts must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl DevicesConfig {
    /// Validate every section
    pub fn validate(&self) -> DaqResult<()> {
        self.collector.validate()?;
        self.orchestrator.validate()?;
        for simulator in &self.simulators {
            simulator.validate()?;
        }
        Ok(())
    }
}
