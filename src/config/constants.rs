// src/config/constants.rs
//! System-wide configuration constants

/// Collector and keep-alive worker constants
pub mod collector {
    pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 1000;
    pub const MIN_KEEP_ALIVE_INTERVAL_MS: u64 = 1;
    pub const MAX_KEEP_ALIVE_INTERVAL_MS: u64 = 60_000;

    /// How long a blocking start waits for the worker to confirm
    pub const DEFAULT_START_TIMEOUT_MS: u64 = 5000;
    pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5000;

    pub const WORKER_THREAD_PREFIX: &str = "daq-worker";
}

/// Orchestrator constants
pub mod orchestrator {
    /// Upper bound on the recording-start barrier across all devices
    pub const DEFAULT_BARRIER_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;
}

/// Simulated device constants
pub mod simulator {
    pub const DEFAULT_CHANNEL_COUNT: usize = 8;
    pub const MAX_CHANNEL_COUNT: usize = 256;
    pub const DEFAULT_SAMPLING_RATE_HZ: u32 = 1000;
    pub const MAX_SAMPLING_RATE_HZ: u32 = 100_000;
    pub const DEFAULT_SIGNAL_AMPLITUDE: f64 = 1.0;
    pub const DEFAULT_SIGNAL_FREQUENCY_HZ: f64 = 10.0;
    pub const DEFAULT_NOISE_LEVEL: f64 = 0.05;
    pub const MIN_NOISE_LEVEL: f64 = 0.0;
    pub const MAX_NOISE_LEVEL: f64 = 1.0;
    pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 10;
}

/// Configuration file locations and environment overrides
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";

    /// `DAQ_COLLECTOR__KEEP_ALIVE_INTERVAL_MS=50` overrides `collector.keep_alive_interval_ms`
    pub const ENV_PREFIX: &str = "DAQ_";
    pub const ENV_SEPARATOR: &str = "__";
}
