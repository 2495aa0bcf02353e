// src/devices/async_collector.rs
//! Collector driven by a dedicated worker thread
//!
//! Recording transitions are executed on the worker so that slow hardware
//! hooks never run on the caller's thread. Between requests the worker ticks
//! at the keep-alive interval and runs the backend data check.

use crate::config::{constants::collector, CollectorSettings};
use crate::devices::data_collector::DataCollector;
use crate::devices::pending::PendingTransition;
use crate::devices::traits::{Collector, CollectorBackend};
use crate::devices::worker::{run as worker_loop, WorkerCommand, WorkerGeneration, WorkerShared, WorkerState};
use crate::error::{DaqError, DaqResult};
use crossbeam::channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    thread: JoinHandle<()>,
    generation: WorkerGeneration,
}

/// [`DataCollector`] plus a keep-alive worker thread.
///
/// The worker is started by [`AsyncDataCollector::start_keep_data_worker_alive`]
/// or lazily by the first recording request, and lives until
/// [`AsyncDataCollector::stop_data_collector_workers`] or drop.
pub struct AsyncDataCollector {
    collector: Arc<DataCollector>,
    settings: CollectorSettings,
    shared: Arc<WorkerShared>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AsyncDataCollector {
    /// Collector with the default worker settings
    pub fn new(channel_count: usize, backend: Box<dyn CollectorBackend>) -> Self {
        Self::with_settings(channel_count, backend, CollectorSettings::default())
    }

    pub fn with_settings(
        channel_count: usize,
        backend: Box<dyn CollectorBackend>,
        settings: CollectorSettings,
    ) -> Self {
        let shared = WorkerShared::new(settings.keep_alive_interval(), settings.ignore_too_slow_warning);
        Self {
            collector: Arc::new(DataCollector::new(channel_count, backend)),
            settings,
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Number of keep-alive ticks run since creation
    pub fn keep_alive_ticks(&self) -> u64 {
        self.shared.keep_alive_ticks()
    }

    /// Number of ticks whose data check overran the interval
    pub fn too_slow_warnings(&self) -> u64 {
        self.shared.too_slow_warnings()
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.shared.interval()
    }

    /// Change the keep-alive cadence of a running or future worker.
    ///
    /// The next tick fires at `last tick + interval`, immediately if that
    /// instant is already past.
    pub fn set_keep_alive_interval(&self, interval: Duration) {
        let interval = interval.max(Duration::from_millis(collector::MIN_KEEP_ALIVE_INTERVAL_MS));
        self.shared.set_interval(interval);

        let worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if handle.commands.send(WorkerCommand::SetInterval(interval)).is_err() {
                tracing::warn!(collector = %self.collector.name(), "worker gone, interval applies on restart");
            }
        }
    }

    pub fn set_ignore_too_slow_warning(&self, ignore: bool) {
        self.shared.set_ignore_too_slow_warning(ignore);
    }

    /// Start the worker and its keep-alive ticks. No-op if already running.
    pub fn start_keep_data_worker_alive(&self) -> DaqResult<()> {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if !handle.thread.is_finished() {
                return Ok(());
            }
        }
        // A finished thread is reaped before starting a new one
        if let Some(stale) = worker.take() {
            if stale.thread.join().is_err() {
                tracing::error!(collector = %self.collector.name(), "previous worker panicked");
            }
        }

        let name = self.collector.name();
        let (commands, receiver) = unbounded();
        let data_collector = Arc::clone(&self.collector);
        let shared = Arc::clone(&self.shared);

        let generation = self.shared.begin_generation();
        let thread = thread::Builder::new()
            .name(format!("{}-{}", collector::WORKER_THREAD_PREFIX, name))
            .spawn(move || worker_loop(data_collector, shared, receiver, generation))
            .map_err(|e| {
                self.shared.set_state(generation, WorkerState::Stopped);
                DaqError::worker(&name, "start_keep_data_worker_alive", e.to_string())
            })?;

        *worker = Some(WorkerHandle { commands, thread, generation });
        tracing::debug!(collector = %name, "keep-alive worker spawned");
        Ok(())
    }

    /// Post a command to the worker, starting it first if needed
    fn send_command(&self, command: WorkerCommand) -> DaqResult<()> {
        self.start_keep_data_worker_alive()?;
        let worker = self.worker.lock();
        let handle = worker
            .as_ref()
            .ok_or_else(|| DaqError::worker(&self.collector.name(), "send_command", "worker not running"))?;
        handle
            .commands
            .send(command)
            .map_err(|_| DaqError::worker(&self.collector.name(), "send_command", "worker channel closed"))
    }

    /// True when called from this collector's own worker, e.g. from a
    /// data check or an `on_new_data` subscriber
    fn on_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.thread.thread().id() == current)
    }

    /// Ask the worker to start recording and return without waiting.
    ///
    /// On the worker thread itself the transition runs inline, since the
    /// worker cannot serve a request while it runs the caller.
    pub fn start_recording_async(&self) -> PendingTransition {
        if self.on_worker_thread() {
            return PendingTransition::completed(self.collector.start_recording());
        }

        let (reply, pending) = PendingTransition::channel();
        match self.send_command(WorkerCommand::StartRecording(reply)) {
            Ok(()) => pending,
            Err(e) => {
                tracing::error!(error = %e, "cannot request recording start");
                PendingTransition::completed(false)
            }
        }
    }

    /// Ask the worker to stop recording and return without waiting.
    ///
    /// Without a running worker, or on the worker thread itself, the stop is
    /// performed on the caller's thread.
    pub fn stop_recording_async(&self) -> PendingTransition {
        if self.on_worker_thread() {
            return PendingTransition::completed(self.collector.stop_recording());
        }

        let running = {
            let worker = self.worker.lock();
            worker.as_ref().is_some_and(|handle| !handle.thread.is_finished())
        };
        if !running {
            return PendingTransition::completed(self.collector.stop_recording());
        }

        let (reply, pending) = PendingTransition::channel();
        match self.send_command(WorkerCommand::StopRecording(reply)) {
            Ok(()) => pending,
            Err(e) => {
                tracing::error!(error = %e, "cannot request recording stop");
                PendingTransition::completed(self.collector.stop_recording())
            }
        }
    }

    /// Stop the worker and join its thread.
    ///
    /// Safe to call repeatedly and when the worker never started. An in-flight
    /// data check is allowed to finish.
    pub fn stop_data_collector_workers(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        self.shared.set_state(handle.generation, WorkerState::Stopping);
        // Fails only if the worker already exited
        let _ = handle.commands.send(WorkerCommand::Shutdown);

        if handle.thread.thread().id() == thread::current().id() {
            // Joining ourselves would never return; the loop exits on Shutdown
            tracing::warn!(collector = %self.collector.name(), "worker stop requested from the worker itself");
            return;
        }
        if handle.thread.join().is_err() {
            tracing::error!(collector = %self.collector.name(), "keep-alive worker panicked");
        }

        // Only this generation; a worker started meanwhile keeps its state
        self.shared.set_state(handle.generation, WorkerState::Stopped);
        tracing::info!(collector = %self.collector.name(), "keep-alive worker stopped");
    }

    /// Shared handle on the wrapped collector
    pub fn collector(&self) -> Arc<DataCollector> {
        Arc::clone(&self.collector)
    }
}

impl Collector for AsyncDataCollector {
    fn data_collector(&self) -> &DataCollector {
        &self.collector
    }

    /// Start recording on the worker and wait for confirmation, bounded by the
    /// configured start timeout.
    fn start_recording(&self) -> bool {
        self.start_recording_async().wait(self.settings.start_timeout())
    }

    fn start_recording_async(&self) -> PendingTransition {
        AsyncDataCollector::start_recording_async(self)
    }

    fn stop_recording(&self) -> bool {
        self.stop_recording_async().wait(self.settings.stop_timeout())
    }

    fn stop_recording_async(&self) -> PendingTransition {
        AsyncDataCollector::stop_recording_async(self)
    }

    fn stop_workers(&self) {
        self.stop_data_collector_workers();
    }
}

impl Drop for AsyncDataCollector {
    fn drop(&mut self) {
        self.stop_data_collector_workers();
    }
}

impl std::fmt::Debug for AsyncDataCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDataCollector")
            .field("collector", &self.collector)
            .field("worker_state", &self.worker_state())
            .field("keep_alive_interval", &self.keep_alive_interval())
            .finish()
    }
}
