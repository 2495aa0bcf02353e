// demos/recording_demo.rs
//! Record a short synchronized trial from several simulated devices
//!
//! Reads `config/default.toml` and `config/local.toml` when present, falling
//! back to two simulators. Set `RUST_LOG=debug` for per-request logs.

use daq_core::config::ConfigLoader;
use daq_core::devices::{Devices, SimulatedDevice, SimulatorConfig};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ConfigLoader::new().load()?;
    if config.simulators.is_empty() {
        config.simulators = vec![
            SimulatorConfig { channel_count: 4, start_delay_ms: 20, ..SimulatorConfig::named("emg") },
            SimulatorConfig { channel_count: 6, start_delay_ms: 60, ..SimulatorConfig::named("imu") },
        ];
    }

    let mut devices = Devices::with_settings(config.orchestrator.clone());
    for simulator in &config.simulators {
        let device = SimulatedDevice::with_settings(simulator.clone(), config.collector.clone())?;
        let id = devices.add(Box::new(device));
        tracing::info!(id, name = %simulator.name, "registered simulated device");
    }

    if !devices.connect() {
        tracing::error!("not every device connected");
        return Ok(());
    }

    if devices.start_recording() {
        std::thread::sleep(Duration::from_millis(250));
        devices.pause_recording();
        std::thread::sleep(Duration::from_millis(100));
        devices.resume_recording();
        std::thread::sleep(Duration::from_millis(250));
        devices.stop_recording();
    }

    let snapshot = devices.snapshot();
    for (id, collector) in &snapshot.devices {
        println!(
            "device {} ({}): live {} samples, trial {} samples, trial start {:?}",
            id,
            collector.name,
            collector.live.len(),
            collector.trial.len(),
            collector.trial.start_time_ns()
        );
    }

    devices.disconnect();
    Ok(())
}
