// src/devices/worker.rs
//! Keep-alive worker loop shared by asynchronous collectors
//!
//! The worker owns one command channel. Waiting for the next command is
//! bounded by the next keep-alive deadline, so the channel doubles as the
//! timer: a timeout means the tick is due.

use crate::devices::data_collector::DataCollector;
use crate::utils::time::duration_to_nanos;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Requests handled on the worker thread
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    StartRecording(Sender<bool>),
    StopRecording(Sender<bool>),
    SetInterval(Duration),
    Shutdown,
}

/// Lifecycle of a collector worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Starting,
            2 => WorkerState::Running,
            3 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Generation of a worker thread; every spawn gets a new one
pub(crate) type WorkerGeneration = u64;

const STATE_BITS: u32 = 8;
const STATE_MASK: u64 = 0xff;

/// State readable from any thread while the worker runs
#[derive(Debug)]
pub(crate) struct WorkerShared {
    /// Generation in the high bits, [`WorkerState`] in the low byte
    state: AtomicU64,
    interval_ns: AtomicU64,
    ignore_too_slow_warning: AtomicBool,
    keep_alive_ticks: AtomicU64,
    too_slow_warnings: AtomicU64,
}

impl WorkerShared {
    pub(crate) fn new(interval: Duration, ignore_too_slow_warning: bool) -> Self {
        Self {
            state: AtomicU64::new(WorkerState::Stopped as u64),
            interval_ns: AtomicU64::new(duration_to_nanos(interval)),
            ignore_too_slow_warning: AtomicBool::new(ignore_too_slow_warning),
            keep_alive_ticks: AtomicU64::new(0),
            too_slow_warnings: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8((self.state.load(Ordering::Acquire) & STATE_MASK) as u8)
    }

    /// Open a new generation in `Starting` and return it
    pub(crate) fn begin_generation(&self) -> WorkerGeneration {
        let mut generation = 0;
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
            generation = (packed >> STATE_BITS) + 1;
            Some((generation << STATE_BITS) | WorkerState::Starting as u64)
        });
        generation
    }

    /// Move `generation` to `state`. Ignored once a newer generation exists,
    /// so a late exit of an old worker never overwrites its successor.
    pub(crate) fn set_state(&self, generation: WorkerGeneration, state: WorkerState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |packed| {
                (packed >> STATE_BITS == generation).then_some((generation << STATE_BITS) | state as u64)
            })
            .is_ok()
    }

    pub(crate) fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns.load(Ordering::Acquire))
    }

    pub(crate) fn set_interval(&self, interval: Duration) {
        self.interval_ns.store(duration_to_nanos(interval), Ordering::Release);
    }

    pub(crate) fn ignore_too_slow_warning(&self) -> bool {
        self.ignore_too_slow_warning.load(Ordering::Relaxed)
    }

    pub(crate) fn set_ignore_too_slow_warning(&self, ignore: bool) {
        self.ignore_too_slow_warning.store(ignore, Ordering::Relaxed);
    }

    pub(crate) fn keep_alive_ticks(&self) -> u64 {
        self.keep_alive_ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn too_slow_warnings(&self) -> u64 {
        self.too_slow_warnings.load(Ordering::Relaxed)
    }
}

/// Marks the generation stopped however the worker exits, panics included
struct ExitGuard<'a> {
    shared: &'a WorkerShared,
    generation: WorkerGeneration,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.shared.set_state(self.generation, WorkerState::Stopped);
    }
}

/// Worker thread body. Returns on `Shutdown` or when every sender is gone.
pub(crate) fn run(
    collector: Arc<DataCollector>,
    shared: Arc<WorkerShared>,
    commands: Receiver<WorkerCommand>,
    generation: WorkerGeneration,
) {
    let _exit = ExitGuard { shared: &shared, generation };
    shared.set_state(generation, WorkerState::Running);
    tracing::info!(collector = %collector.name(), interval = ?shared.interval(), "keep-alive worker running");

    let mut last_tick = Instant::now();
    let mut next_tick = last_tick + shared.interval();

    loop {
        match commands.recv_deadline(next_tick) {
            Ok(WorkerCommand::StartRecording(reply)) => {
                tracing::debug!(collector = %collector.name(), "start recording requested");
                // The requester may have given up waiting
                let _ = reply.send(collector.start_recording());
            }
            Ok(WorkerCommand::StopRecording(reply)) => {
                tracing::debug!(collector = %collector.name(), "stop recording requested");
                let _ = reply.send(collector.stop_recording());
            }
            Ok(WorkerCommand::SetInterval(interval)) => {
                // Keep the time already elapsed since the last tick
                next_tick = last_tick + interval;
                tracing::debug!(collector = %collector.name(), ?interval, "keep-alive interval changed");
            }
            Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                last_tick = Instant::now();
                let interval = shared.interval();
                keep_data_worker_alive(&collector, &shared, interval);
                next_tick = last_tick + interval;
            }
        }
    }

    tracing::info!(
        collector = %collector.name(),
        ticks = shared.keep_alive_ticks(),
        "keep-alive worker exiting"
    );
}

/// One keep-alive tick: run the data check and time it.
///
/// A check slower than `interval` means the device is falling behind. That is
/// reported and counted, never fatal.
pub(crate) fn keep_data_worker_alive(collector: &DataCollector, shared: &WorkerShared, interval: Duration) {
    let started = Instant::now();
    collector.backend().data_check(collector);
    let elapsed = started.elapsed();

    shared.keep_alive_ticks.fetch_add(1, Ordering::Relaxed);

    if elapsed > interval && !shared.ignore_too_slow_warning() {
        shared.too_slow_warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            collector = %collector.name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            interval_ms = interval.as_secs_f64() * 1000.0,
            "data check slower than keep-alive interval, collector is falling behind"
        );
    }
}
