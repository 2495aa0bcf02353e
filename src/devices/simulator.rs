// src/devices/simulator.rs
//! Simulated acquisition device
//!
//! Produces a per-channel sine wave with uniform noise at a fixed sampling
//! rate. Samples are synthesised on each keep-alive tick for the time elapsed
//! since the previous tick, so the stream rate is independent of the tick rate.
//! Connection and streaming refusals plus a start latency can be configured,
//! which makes the simulator the reference device for orchestration tests.

use crate::config::constants::{collector, simulator};
use crate::config::CollectorSettings;
use crate::data::DataPoint;
use crate::devices::async_collector::AsyncDataCollector;
use crate::devices::data_collector::DataCollector;
use crate::devices::traits::{Collector, CollectorBackend, Device};
use crate::error::{DaqError, DaqResult};
use crate::utils::time::current_timestamp_nanos;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Simulated device configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "defaults::name")]
    pub name: String,

    #[serde(default = "defaults::channel_count")]
    pub channel_count: usize,

    #[serde(default = "defaults::sampling_rate_hz")]
    pub sampling_rate_hz: u32,

    #[serde(default = "defaults::signal_amplitude")]
    pub signal_amplitude: f64,

    #[serde(default = "defaults::signal_frequency_hz")]
    pub signal_frequency_hz: f64,

    #[serde(default = "defaults::noise_level")]
    pub noise_level: f64,

    /// When false, `connect` is refused
    #[serde(default = "defaults::enabled")]
    pub connect_succeeds: bool,

    /// When false, the streaming hook reports failure
    #[serde(default = "defaults::enabled")]
    pub start_succeeds: bool,

    /// Latency of the streaming hook, emulating hardware arming time
    #[serde(default)]
    pub start_delay_ms: u64,

    #[serde(default = "defaults::keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,
}

mod defaults {
    use crate::config::constants::simulator;

    pub fn name() -> String { "simulator".to_string() }
    pub fn channel_count() -> usize { simulator::DEFAULT_CHANNEL_COUNT }
    pub fn sampling_rate_hz() -> u32 { simulator::DEFAULT_SAMPLING_RATE_HZ }
    pub fn signal_amplitude() -> f64 { simulator::DEFAULT_SIGNAL_AMPLITUDE }
    pub fn signal_frequency_hz() -> f64 { simulator::DEFAULT_SIGNAL_FREQUENCY_HZ }
    pub fn noise_level() -> f64 { simulator::DEFAULT_NOISE_LEVEL }
    pub fn enabled() -> bool { true }
    pub fn keep_alive_interval_ms() -> u64 { simulator::DEFAULT_KEEP_ALIVE_INTERVAL_MS }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            name: defaults::name(),
            channel_count: defaults::channel_count(),
            sampling_rate_hz: defaults::sampling_rate_hz(),
            signal_amplitude: defaults::signal_amplitude(),
            signal_frequency_hz: defaults::signal_frequency_hz(),
            noise_level: defaults::noise_level(),
            connect_succeeds: true,
            start_succeeds: true,
            start_delay_ms: 0,
            keep_alive_interval_ms: defaults::keep_alive_interval_ms(),
        }
    }
}

impl SimulatorConfig {
    /// Simulator with the given name and defaults for the rest
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DaqResult<()> {
        let invalid = |reason: String| Err(DaqError::configuration("simulator", "validate", reason));

        if self.name.trim().is_empty() {
            return invalid("name must not be empty".to_string());
        }
        if self.channel_count == 0 || self.channel_count > simulator::MAX_CHANNEL_COUNT {
            return invalid(format!(
                "{}: channel_count must be within 1..={}, got {}",
                self.name,
                simulator::MAX_CHANNEL_COUNT,
                self.channel_count
            ));
        }
        if self.sampling_rate_hz == 0 || self.sampling_rate_hz > simulator::MAX_SAMPLING_RATE_HZ {
            return invalid(format!(
                "{}: sampling_rate_hz must be within 1..={}, got {}",
                self.name,
                simulator::MAX_SAMPLING_RATE_HZ,
                self.sampling_rate_hz
            ));
        }
        if !(simulator::MIN_NOISE_LEVEL..=simulator::MAX_NOISE_LEVEL).contains(&self.noise_level) {
            return invalid(format!("{}: noise_level out of range: {}", self.name, self.noise_level));
        }
        if !self.signal_amplitude.is_finite() || !self.signal_frequency_hz.is_finite() || self.signal_frequency_hz < 0.0 {
            return invalid(format!("{}: signal amplitude and frequency must be finite", self.name));
        }
        if !(collector::MIN_KEEP_ALIVE_INTERVAL_MS..=collector::MAX_KEEP_ALIVE_INTERVAL_MS)
            .contains(&self.keep_alive_interval_ms)
        {
            return invalid(format!(
                "{}: keep_alive_interval_ms out of range: {}",
                self.name, self.keep_alive_interval_ms
            ));
        }
        Ok(())
    }
}

/// Counters shared between a simulated device and its observers
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    data_checks: Arc<AtomicU64>,
    samples_generated: Arc<AtomicU64>,
    streaming_starts: Arc<AtomicU64>,
}

impl SimulatorStats {
    pub fn data_checks(&self) -> u64 {
        self.data_checks.load(Ordering::Relaxed)
    }

    pub fn samples_generated(&self) -> u64 {
        self.samples_generated.load(Ordering::Relaxed)
    }

    /// Number of times the streaming hook ran
    pub fn streaming_starts(&self) -> u64 {
        self.streaming_starts.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Generator {
    last_check: Instant,
    /// Samples owed from previous ticks, below one
    carry: f64,
    sample_index: u64,
    next_timestamp_ns: u64,
}

/// Backend synthesising samples on each keep-alive tick
pub struct SimulatorBackend {
    config: SimulatorConfig,
    sample_period_ns: u64,
    generator: Mutex<Generator>,
    stats: SimulatorStats,
}

impl SimulatorBackend {
    pub fn new(config: SimulatorConfig, stats: SimulatorStats) -> Self {
        let sample_period_ns = 1_000_000_000 / u64::from(config.sampling_rate_hz.max(1));
        Self {
            config,
            sample_period_ns,
            generator: Mutex::new(Generator {
                last_check: Instant::now(),
                carry: 0.0,
                sample_index: 0,
                next_timestamp_ns: current_timestamp_nanos(),
            }),
            stats,
        }
    }

    fn sample(&self, sample_index: u64, channel: usize) -> f64 {
        let t = sample_index as f64 / f64::from(self.config.sampling_rate_hz);
        let phase_offset = channel as f64 * PI / 8.0;
        let signal = self.config.signal_amplitude * (2.0 * PI * self.config.signal_frequency_hz * t + phase_offset).sin();
        let noise = (rand::random::<f64>() - 0.5) * 2.0 * self.config.noise_level * self.config.signal_amplitude;
        signal + noise
    }

    /// Synthesise every sample due since the previous call
    fn generate_due_samples(&self) -> Vec<DataPoint> {
        let mut generator = self.generator.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(generator.last_check);
        generator.last_check = now;

        let due = elapsed.as_secs_f64() * f64::from(self.config.sampling_rate_hz) + generator.carry;
        let count = due.floor();
        generator.carry = due - count;

        let mut points = Vec::with_capacity(count as usize);
        for _ in 0..count as u64 {
            let index = generator.sample_index;
            let values = (0..self.config.channel_count).map(|ch| self.sample(index, ch)).collect();
            points.push(DataPoint::new(generator.next_timestamp_ns, values));
            generator.sample_index += 1;
            generator.next_timestamp_ns += self.sample_period_ns;
        }
        points
    }
}

impl CollectorBackend for SimulatorBackend {
    fn data_collector_name(&self) -> String {
        self.config.name.clone()
    }

    fn handle_start_data_streaming(&self) -> bool {
        if self.config.start_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.start_delay_ms));
        }
        self.stats.streaming_starts.fetch_add(1, Ordering::Relaxed);
        if !self.config.start_succeeds {
            tracing::warn!(device = %self.config.name, "simulated device refused to stream");
            return false;
        }

        let mut generator = self.generator.lock();
        generator.last_check = Instant::now();
        generator.carry = 0.0;
        generator.sample_index = 0;
        generator.next_timestamp_ns = current_timestamp_nanos();
        true
    }

    fn handle_stop_data_streaming(&self) -> bool {
        true
    }

    fn data_check(&self, collector: &DataCollector) {
        self.stats.data_checks.fetch_add(1, Ordering::Relaxed);
        if !collector.is_streaming_data() {
            return;
        }

        let points = self.generate_due_samples();
        self.stats
            .samples_generated
            .fetch_add(points.len() as u64, Ordering::Relaxed);
        self.handle_new_data(collector, points);
    }
}

/// [`Device`] backed by a [`SimulatorBackend`] on an [`AsyncDataCollector`]
pub struct SimulatedDevice {
    config: SimulatorConfig,
    collector: Arc<AsyncDataCollector>,
    stats: SimulatorStats,
    is_connected: bool,
}

impl SimulatedDevice {
    pub fn new(config: SimulatorConfig) -> DaqResult<Self> {
        Self::with_settings(config, CollectorSettings::default())
    }

    /// Build with explicit worker settings. The keep-alive interval of the
    /// simulator configuration takes precedence over the one in `settings`.
    pub fn with_settings(config: SimulatorConfig, settings: CollectorSettings) -> DaqResult<Self> {
        config.validate()?;
        settings.validate()?;

        let settings = CollectorSettings {
            keep_alive_interval_ms: config.keep_alive_interval_ms,
            ..settings
        };
        let stats = SimulatorStats::default();
        let backend = SimulatorBackend::new(config.clone(), stats.clone());
        let collector = AsyncDataCollector::with_settings(config.channel_count, Box::new(backend), settings);

        Ok(Self {
            config,
            collector: Arc::new(collector),
            stats,
            is_connected: false,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> SimulatorStats {
        self.stats.clone()
    }

    /// Concrete collector handle, for worker control
    pub fn async_collector(&self) -> Arc<AsyncDataCollector> {
        Arc::clone(&self.collector)
    }
}

impl Device for SimulatedDevice {
    fn device_name(&self) -> String {
        self.config.name.clone()
    }

    fn connect(&mut self) -> bool {
        if self.is_connected {
            return true;
        }
        if !self.config.connect_succeeds {
            tracing::warn!(device = %self.config.name, "simulated device refused to connect");
            return false;
        }
        if let Err(e) = self.collector.start_keep_data_worker_alive() {
            tracing::error!(device = %self.config.name, error = %e, "cannot start keep-alive worker");
            return false;
        }

        self.is_connected = true;
        tracing::info!(device = %self.config.name, "simulated device connected");
        true
    }

    fn disconnect(&mut self) -> bool {
        if self.collector.is_recording() {
            Collector::stop_recording(self.collector.as_ref());
        }
        if self.collector.is_streaming_data() {
            self.collector.stop_data_streaming();
        }
        self.collector.stop_data_collector_workers();

        self.is_connected = false;
        tracing::info!(device = %self.config.name, "simulated device disconnected");
        true
    }

    fn is_connected(&self) -> bool {
        self.is_connected
    }

    fn data_collector(&self) -> Arc<dyn Collector> {
        self.collector.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn fast_config(name: &str) -> SimulatorConfig {
        SimulatorConfig {
            channel_count: 2,
            sampling_rate_hz: 1000,
            keep_alive_interval_ms: 5,
            ..SimulatorConfig::named(name)
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let mut config = SimulatorConfig::default();
        config.channel_count = 0;
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.noise_level = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimulatorConfig::default();
        config.sampling_rate_hz = 0;
        assert!(SimulatedDevice::new(config).is_err());

        assert!(SimulatorConfig::named("  ").validate().is_err());
    }

    #[test]
    fn test_samples_follow_elapsed_time() {
        let config = SimulatorConfig {
            noise_level: 0.0,
            ..fast_config("sine")
        };
        let backend = SimulatorBackend::new(config, SimulatorStats::default());
        assert!(backend.handle_start_data_streaming());

        thread::sleep(Duration::from_millis(50));
        let points = backend.generate_due_samples();

        assert!(points.len() >= 45, "got {} samples", points.len());
        assert!(points.iter().all(|p| p.channel_count() == 2));
        let gaps: Vec<u64> = points.windows(2).map(|w| w[1].timestamp_ns - w[0].timestamp_ns).collect();
        assert!(gaps.iter().all(|gap| *gap == 1_000_000));
        // Channel 0 starts at phase zero
        assert!(points[0].values[0].abs() < 1e-9);
    }

    #[test]
    fn test_refusals() {
        let mut device = SimulatedDevice::new(SimulatorConfig {
            connect_succeeds: false,
            ..fast_config("offline")
        })
        .unwrap();
        assert!(!device.connect());
        assert!(!device.is_connected());

        let mut device = SimulatedDevice::new(SimulatorConfig {
            start_succeeds: false,
            ..fast_config("mute")
        })
        .unwrap();
        assert!(device.connect());
        let collector = device.data_collector();
        assert!(!collector.start_recording());
        assert!(collector.has_failed_to_start_data_streaming());
        assert!(device.disconnect());
    }

    #[test]
    #[serial]
    fn test_recording_collects_samples() {
        let mut device = SimulatedDevice::new(fast_config("emg")).unwrap();
        let stats = device.stats();
        assert!(device.connect());

        let collector = device.data_collector();
        assert!(collector.start_recording());
        thread::sleep(Duration::from_millis(100));
        assert!(collector.stop_recording());

        let trial = collector.trial_data();
        assert!(!trial.is_empty());
        assert!(collector.live_data().len() >= trial.len());
        assert!(stats.data_checks() > 0);
        assert_eq!(stats.streaming_starts(), 1);

        assert!(device.disconnect());
        assert!(!collector.is_streaming_data());
        assert_eq!(
            device.async_collector().worker_state(),
            crate::devices::worker::WorkerState::Stopped
        );
    }
}
