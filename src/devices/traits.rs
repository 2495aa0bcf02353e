// src/devices/traits.rs
//! Capability traits implemented per concrete device

use crate::data::{DataPoint, TimeSeries};
use crate::devices::data_collector::DataCollector;
use crate::devices::pending::PendingTransition;
use std::sync::Arc;

/// Device-specific hooks driving a [`DataCollector`].
///
/// The collector owns the state machine and the buffers; the backend talks to
/// the hardware. Hooks run with the collector's transition lock held but never
/// with its data lock, so they may push data back into the collector.
pub trait CollectorBackend: Send + Sync + 'static {
    /// Human readable name used in logs and snapshots
    fn data_collector_name(&self) -> String;

    /// Ask the hardware to start streaming. Returns false on refusal.
    fn handle_start_data_streaming(&self) -> bool;

    /// Ask the hardware to stop streaming
    fn handle_stop_data_streaming(&self) -> bool;

    /// Route freshly acquired samples into the collector.
    ///
    /// Override to transform or filter samples before they are stored. Width
    /// errors are logged and the batch is dropped.
    fn handle_new_data(&self, collector: &DataCollector, mut data: Vec<DataPoint>) {
        let result = match data.len() {
            0 => return,
            1 => collector.add_data_point(data.remove(0)),
            _ => collector.add_data_points(data),
        };
        if let Err(e) = result {
            tracing::warn!(collector = %collector.name(), error = %e, "dropping new data");
        }
    }

    /// Called on every keep-alive tick of an async collector. Poll hardware or
    /// run light analysis here; the default only proves the worker is alive.
    fn data_check(&self, _collector: &DataCollector) {}
}

/// Uniform view over synchronous and asynchronous collectors.
///
/// This is the narrow surface the orchestrator relies on: state queries, the
/// blocking and non-blocking transitions, and data read access. Every method
/// but [`Collector::data_collector`] has a default delegating to the wrapped
/// [`DataCollector`].
pub trait Collector: Send + Sync {
    fn data_collector(&self) -> &DataCollector;

    fn name(&self) -> String {
        self.data_collector().name()
    }

    fn channel_count(&self) -> usize {
        self.data_collector().channel_count()
    }

    fn is_streaming_data(&self) -> bool {
        self.data_collector().is_streaming_data()
    }

    fn is_recording(&self) -> bool {
        self.data_collector().is_recording()
    }

    fn is_paused(&self) -> bool {
        self.data_collector().is_paused()
    }

    fn has_failed_to_start_data_streaming(&self) -> bool {
        self.data_collector().has_failed_to_start_data_streaming()
    }

    fn start_data_streaming(&self) -> bool {
        self.data_collector().start_data_streaming()
    }

    fn stop_data_streaming(&self) -> bool {
        self.data_collector().stop_data_streaming()
    }

    /// Start recording and wait for the outcome
    fn start_recording(&self) -> bool {
        self.data_collector().start_recording()
    }

    /// Begin starting the recording without waiting for it
    fn start_recording_async(&self) -> PendingTransition {
        PendingTransition::completed(self.start_recording())
    }

    fn stop_recording(&self) -> bool {
        self.data_collector().stop_recording()
    }

    fn stop_recording_async(&self) -> PendingTransition {
        PendingTransition::completed(self.stop_recording())
    }

    fn pause_recording(&self) -> bool {
        self.data_collector().pause_recording()
    }

    fn resume_recording(&self) -> bool {
        self.data_collector().resume_recording()
    }

    fn live_data(&self) -> TimeSeries {
        self.data_collector().live_data()
    }

    fn trial_data(&self) -> TimeSeries {
        self.data_collector().trial_data()
    }

    fn recording_start_time(&self) -> Option<u64> {
        self.data_collector().recording_start_time()
    }

    /// Stop any worker owned by this collector. No-op for synchronous ones.
    fn stop_workers(&self) {}
}

/// A physical (or simulated) instrument owning exactly one collector
pub trait Device: Send {
    fn device_name(&self) -> String;

    fn connect(&mut self) -> bool;

    fn disconnect(&mut self) -> bool;

    fn is_connected(&self) -> bool;

    /// Shared handle to the collector this device feeds
    fn data_collector(&self) -> Arc<dyn Collector>;
}
