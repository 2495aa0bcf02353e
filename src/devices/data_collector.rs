// src/devices/data_collector.rs
//! Streaming/recording state machine and sample buffers of one device
//!
//! ```text
//! Idle --start_data_streaming--> Streaming --start_recording--> Recording <--> Paused
//!   ^                               |  ^                            |
//!   +------stop_data_streaming------+  +-------stop_recording-------+
//! ```
//!
//! Every invalid transition returns false and leaves the state untouched.

use crate::data::{DataPoint, TimeSeries};
use crate::devices::traits::{Collector, CollectorBackend};
use crate::error::DaqResult;
use crate::utils::event::Event;
use crate::utils::time::current_timestamp_nanos;
use parking_lot::Mutex;

/// Mutable fields guarded by the data lock
#[derive(Debug)]
struct CollectorState {
    is_streaming_data: bool,
    is_recording: bool,
    is_paused: bool,
    has_failed_to_start_data_streaming: bool,
    live: TimeSeries,
    trial: TimeSeries,
}

/// Copy of the state flags taken under one lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorFlags {
    pub is_streaming_data: bool,
    pub is_recording: bool,
    pub is_paused: bool,
    pub has_failed_to_start_data_streaming: bool,
}

/// Per-device streaming/recording state and buffers.
///
/// Two locks are involved. The data lock guards flags and buffers and is held
/// only for a single flag update or append. The transition lock serializes
/// state-machine transitions and is held across the backend hooks, so slow
/// hardware never blocks data appends or readers.
pub struct DataCollector {
    channel_count: usize,
    backend: Box<dyn CollectorBackend>,
    state: Mutex<CollectorState>,
    transition: Mutex<()>,

    /// Fired after every append with the newest point
    pub on_new_data: Event<DataPoint>,
}

impl DataCollector {
    pub fn new(channel_count: usize, backend: Box<dyn CollectorBackend>) -> Self {
        Self {
            channel_count,
            backend,
            state: Mutex::new(CollectorState {
                is_streaming_data: false,
                is_recording: false,
                is_paused: false,
                has_failed_to_start_data_streaming: false,
                live: TimeSeries::new(channel_count),
                trial: TimeSeries::new(channel_count),
            }),
            transition: Mutex::new(()),
            on_new_data: Event::new(),
        }
    }

    pub fn name(&self) -> String {
        self.backend.data_collector_name()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn backend(&self) -> &dyn CollectorBackend {
        self.backend.as_ref()
    }

    pub fn flags(&self) -> CollectorFlags {
        let state = self.state.lock();
        CollectorFlags {
            is_streaming_data: state.is_streaming_data,
            is_recording: state.is_recording,
            is_paused: state.is_paused,
            has_failed_to_start_data_streaming: state.has_failed_to_start_data_streaming,
        }
    }

    pub fn is_streaming_data(&self) -> bool {
        self.state.lock().is_streaming_data
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().is_recording
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().is_paused
    }

    pub fn has_failed_to_start_data_streaming(&self) -> bool {
        self.state.lock().has_failed_to_start_data_streaming
    }

    /// Start streaming into the live series, which is reset first
    pub fn start_data_streaming(&self) -> bool {
        let _transition = self.transition.lock();
        self.start_data_streaming_locked()
    }

    fn start_data_streaming_locked(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.is_streaming_data {
                tracing::debug!(collector = %self.name(), "already streaming");
                return false;
            }
            state.live.reset(Some(current_timestamp_nanos()));
        }

        let started = self.backend.handle_start_data_streaming();

        let mut state = self.state.lock();
        state.is_streaming_data = started;
        state.has_failed_to_start_data_streaming = !started;
        drop(state);

        if started {
            tracing::info!(collector = %self.name(), "data streaming started");
        } else {
            tracing::warn!(collector = %self.name(), "failed to start data streaming");
        }
        started
    }

    /// Stop streaming. Refused while recording: stop the recording first.
    pub fn stop_data_streaming(&self) -> bool {
        let _transition = self.transition.lock();
        {
            let state = self.state.lock();
            if !state.is_streaming_data {
                return false;
            }
            if state.is_recording {
                tracing::warn!(
                    collector = %self.name(),
                    "cannot stop streaming while recording, stop the recording first"
                );
                return false;
            }
        }

        let stopped = self.backend.handle_stop_data_streaming();
        self.state.lock().is_streaming_data = false;
        tracing::info!(collector = %self.name(), success = stopped, "data streaming stopped");
        stopped
    }

    /// Start a new trial, starting the stream first if needed.
    ///
    /// The trial series is reset and stamped with the current time. If the
    /// stream cannot be established nothing else changes.
    pub fn start_recording(&self) -> bool {
        let _transition = self.transition.lock();
        {
            let state = self.state.lock();
            if state.is_recording {
                tracing::debug!(collector = %self.name(), "already recording");
                return false;
            }
        }

        if !self.is_streaming_data() && !self.start_data_streaming_locked() {
            return false;
        }

        let mut state = self.state.lock();
        state.trial.reset(Some(current_timestamp_nanos()));
        state.is_recording = true;
        state.is_paused = false;
        drop(state);

        tracing::info!(collector = %self.name(), "recording started");
        true
    }

    /// End the trial. Streaming keeps going.
    pub fn stop_recording(&self) -> bool {
        let _transition = self.transition.lock();
        let mut state = self.state.lock();
        if !state.is_recording {
            return false;
        }
        state.is_recording = false;
        state.is_paused = false;
        drop(state);

        tracing::info!(collector = %self.name(), "recording stopped");
        true
    }

    /// Stop feeding the trial series without resetting it
    pub fn pause_recording(&self) -> bool {
        let _transition = self.transition.lock();
        let mut state = self.state.lock();
        if !state.is_recording || state.is_paused {
            return false;
        }
        state.is_paused = true;
        true
    }

    /// Continue feeding the same trial series
    pub fn resume_recording(&self) -> bool {
        let _transition = self.transition.lock();
        let mut state = self.state.lock();
        if !state.is_paused {
            return false;
        }
        state.is_paused = false;
        true
    }

    /// Store one point and notify subscribers with it.
    ///
    /// The point always lands in the live series, and in the trial series
    /// while recording and not paused.
    pub fn add_data_point(&self, point: DataPoint) -> DaqResult<()> {
        {
            let mut state = self.state.lock();
            state.live.check_width(&point)?;
            if state.is_recording && !state.is_paused {
                state.trial.push(point.clone())?;
            }
            state.live.push(point.clone())?;
        }

        self.on_new_data.notify(&point);
        Ok(())
    }

    /// Store a batch exactly like repeated [`DataCollector::add_data_point`]
    /// calls, but notify once, with the last point only.
    pub fn add_data_points(&self, points: Vec<DataPoint>) -> DaqResult<()> {
        let Some(last) = points.last().cloned() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            for point in &points {
                state.live.check_width(point)?;
            }
            if state.is_recording && !state.is_paused {
                state.trial.extend(&points)?;
            }
            state.live.extend(&points)?;
        }

        self.on_new_data.notify(&last);
        Ok(())
    }

    /// Copy of the live series
    pub fn live_data(&self) -> TimeSeries {
        self.state.lock().live.clone()
    }

    /// Copy of the trial series
    pub fn trial_data(&self) -> TimeSeries {
        self.state.lock().trial.clone()
    }

    /// Both series copied under one lock acquisition
    pub fn data(&self) -> (TimeSeries, TimeSeries) {
        let state = self.state.lock();
        (state.live.clone(), state.trial.clone())
    }

    /// Start time of the current trial
    pub fn recording_start_time(&self) -> Option<u64> {
        self.state.lock().trial.start_time_ns()
    }

    /// Re-anchor the current trial, used to align devices on one instant
    pub(crate) fn set_recording_start_time(&self, start_time_ns: u64) {
        self.state.lock().trial.set_start_time_ns(start_time_ns);
    }
}

impl Collector for DataCollector {
    fn data_collector(&self) -> &DataCollector {
        self
    }
}

impl std::fmt::Debug for DataCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollector")
            .field("name", &self.name())
            .field("channel_count", &self.channel_count)
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend whose hooks succeed or fail on demand
    struct ScriptedBackend {
        accept_start: Arc<AtomicBool>,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    fn collector(channel_count: usize) -> (DataCollector, Arc<AtomicBool>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let accept_start = Arc::new(AtomicBool::new(true));
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let backend = ScriptedBackend {
            accept_start: Arc::clone(&accept_start),
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };
        (DataCollector::new(channel_count, Box::new(backend)), accept_start, starts, stops)
    }

    impl CollectorBackend for ScriptedBackend {
        fn data_collector_name(&self) -> String {
            "scripted".to_string()
        }

        fn handle_start_data_streaming(&self) -> bool {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.accept_start.load(Ordering::SeqCst)
        }

        fn handle_stop_data_streaming(&self) -> bool {
            self.stops.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn point(timestamp_ns: u64) -> DataPoint {
        DataPoint::new(timestamp_ns, vec![timestamp_ns as f64, 0.0])
    }

    #[test]
    fn test_start_streaming_resets_live_series() {
        let (collector, _, starts, _) = collector(2);
        collector.add_data_point(point(1)).unwrap();
        assert_eq!(collector.live_data().len(), 1);

        assert!(collector.start_data_streaming());
        assert!(collector.is_streaming_data());
        assert!(collector.live_data().is_empty());
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        // Second start is a no-op
        assert!(!collector.start_data_streaming());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refused_streaming_sets_failure_flag() {
        let (collector, accept, _, _) = collector(2);
        accept.store(false, Ordering::SeqCst);

        assert!(!collector.start_data_streaming());
        assert!(!collector.is_streaming_data());
        assert!(collector.has_failed_to_start_data_streaming());

        accept.store(true, Ordering::SeqCst);
        assert!(collector.start_data_streaming());
        assert!(!collector.has_failed_to_start_data_streaming());
    }

    #[test]
    fn test_start_recording_starts_streaming_and_resets_trial() {
        let (collector, _, starts, _) = collector(2);

        assert!(collector.start_recording());
        assert!(collector.is_streaming_data());
        assert!(collector.is_recording());
        assert!(collector.trial_data().is_empty());
        assert!(collector.recording_start_time().is_some());
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        collector.add_data_point(point(1)).unwrap();
        assert!(collector.stop_recording());
        assert!(collector.start_recording());
        assert!(collector.trial_data().is_empty());
        // Streaming was already up, the hook is not called again
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_recording_fails_without_stream() {
        let (collector, accept, _, _) = collector(2);
        accept.store(false, Ordering::SeqCst);

        assert!(!collector.start_recording());
        assert!(!collector.is_recording());
        assert!(!collector.is_streaming_data());
    }

    #[test]
    fn test_stop_recording_when_idle_is_rejected() {
        let (collector, _, _, _) = collector(2);
        let before = collector.flags();

        assert!(!collector.stop_recording());
        assert_eq!(collector.flags(), before);

        assert!(collector.start_data_streaming());
        let before = collector.flags();
        assert!(!collector.stop_recording());
        assert_eq!(collector.flags(), before);
    }

    #[test]
    fn test_cannot_stop_streaming_while_recording() {
        let (collector, _, _, stops) = collector(2);
        assert!(collector.start_recording());

        assert!(!collector.stop_data_streaming());
        assert!(collector.is_streaming_data());
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        assert!(collector.stop_recording());
        assert!(collector.is_streaming_data());
        assert!(collector.stop_data_streaming());
        assert!(!collector.is_streaming_data());
        assert!(!collector.stop_data_streaming());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_trial_only_fed_while_recording() {
        let (collector, _, _, _) = collector(2);
        assert!(collector.start_data_streaming());

        collector.add_data_point(point(1)).unwrap();
        assert!(collector.start_recording());
        collector.add_data_point(point(2)).unwrap();
        assert!(collector.stop_recording());
        collector.add_data_point(point(3)).unwrap();

        let (live, trial) = collector.data();
        assert_eq!(live.len(), 3);
        assert_eq!(trial.len(), 1);
        assert_eq!(trial.points()[0].timestamp_ns, 2);
    }

    #[test]
    fn test_pause_and_resume() {
        let (collector, _, _, _) = collector(2);
        assert!(!collector.pause_recording());
        assert!(collector.start_recording());

        collector.add_data_point(point(1)).unwrap();
        assert!(collector.pause_recording());
        assert!(!collector.pause_recording());
        collector.add_data_point(point(2)).unwrap();
        assert!(collector.resume_recording());
        assert!(!collector.resume_recording());
        collector.add_data_point(point(3)).unwrap();

        let trial = collector.trial_data();
        let stamps: Vec<u64> = trial.points().iter().map(|p| p.timestamp_ns).collect();
        assert_eq!(stamps, vec![1, 3]);
        assert_eq!(collector.live_data().len(), 3);

        assert!(collector.pause_recording());
        assert!(collector.stop_recording());
        assert!(!collector.is_paused());
    }

    #[test]
    fn test_batch_notifies_once_with_last_point() {
        let (collector, _, _, _) = collector(2);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        collector.on_new_data.subscribe(move |p: &DataPoint| sink.lock().push(p.timestamp_ns));

        assert!(collector.start_recording());
        collector
            .add_data_points(vec![point(1), point(2), point(3)])
            .unwrap();

        assert_eq!(*seen.lock(), vec![3]);
        assert_eq!(collector.live_data().len(), 3);
        assert_eq!(collector.trial_data().len(), 3);

        collector.add_data_points(Vec::new()).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_wrong_width_is_rejected_without_notification() {
        let (collector, _, _, _) = collector(2);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        collector.on_new_data.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(collector.add_data_point(DataPoint::new(1, vec![0.0])).is_err());
        assert!(collector
            .add_data_points(vec![point(1), DataPoint::new(2, vec![0.0; 3])])
            .is_err());

        assert!(collector.live_data().is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscriber_may_read_collector() {
        let (collector, _, _, _) = collector(2);
        let collector = Arc::new(collector);
        let observed = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&collector);
        let sink = Arc::clone(&observed);
        collector.on_new_data.subscribe(move |_| {
            if let Some(collector) = weak.upgrade() {
                sink.store(collector.live_data().len(), Ordering::SeqCst);
            }
        });

        collector.add_data_point(point(1)).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }
}
