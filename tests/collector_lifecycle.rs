// tests/collector_lifecycle.rs
//! Collector state machine properties exercised through the public API

use daq_core::data::DataPoint;
use daq_core::devices::{Collector, CollectorBackend, DataCollector};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

struct Hardware;

impl CollectorBackend for Hardware {
    fn data_collector_name(&self) -> String {
        "hardware".to_string()
    }

    fn handle_start_data_streaming(&self) -> bool {
        true
    }

    fn handle_stop_data_streaming(&self) -> bool {
        true
    }
}

fn recording_collector(channels: usize) -> DataCollector {
    let collector = DataCollector::new(channels, Box::new(Hardware));
    assert!(collector.start_recording());
    collector
}

fn points_strategy(channels: usize) -> impl Strategy<Value = Vec<DataPoint>> {
    prop::collection::vec(
        (any::<u64>(), prop::collection::vec(-1.0e3f64..1.0e3, channels)),
        0..40,
    )
    .prop_map(|raw| raw.into_iter().map(|(t, v)| DataPoint::new(t, v)).collect())
}

proptest! {
    #[test]
    fn batch_storage_matches_sequential_appends(points in points_strategy(3)) {
        let batched = recording_collector(3);
        let sequential = recording_collector(3);

        batched.add_data_points(points.clone()).unwrap();
        for point in &points {
            sequential.add_data_point(point.clone()).unwrap();
        }

        let (batched_live, sequential_live) = (batched.live_data(), sequential.live_data());
        let (batched_trial, sequential_trial) = (batched.trial_data(), sequential.trial_data());
        prop_assert_eq!(batched_live.points(), sequential_live.points());
        prop_assert_eq!(batched_trial.points(), sequential_trial.points());
    }

    #[test]
    fn batch_notifies_once_with_last_point(points in points_strategy(2)) {
        let collector = recording_collector(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        collector.on_new_data.subscribe(move |p: &DataPoint| sink.lock().push(p.clone()));

        collector.add_data_points(points.clone()).unwrap();

        let seen = seen.lock();
        match points.last() {
            Some(last) => prop_assert_eq!(seen.as_slice(), std::slice::from_ref(last)),
            None => prop_assert!(seen.is_empty()),
        }
    }
}

#[test]
fn test_state_invariants_hold_across_transitions() {
    let collector = DataCollector::new(1, Box::new(Hardware));
    let check = |c: &DataCollector| {
        let flags = c.flags();
        assert!(!flags.is_recording || flags.is_streaming_data);
        assert!(!flags.is_paused || flags.is_recording);
    };

    check(&collector);
    assert!(collector.start_recording());
    check(&collector);
    assert!(collector.pause_recording());
    check(&collector);
    assert!(!collector.stop_data_streaming());
    check(&collector);
    assert!(collector.stop_recording());
    check(&collector);
    assert!(collector.stop_data_streaming());
    check(&collector);
}

#[test]
fn test_collector_trait_on_plain_collector() {
    let collector: Arc<dyn Collector> = Arc::new(DataCollector::new(2, Box::new(Hardware)));

    assert_eq!(collector.name(), "hardware");
    assert_eq!(collector.channel_count(), 2);
    assert!(collector.start_recording_async().wait(std::time::Duration::from_millis(1)));
    assert!(collector.is_recording());
    assert!(collector.stop_recording_async().wait(std::time::Duration::from_millis(1)));
    assert!(!collector.is_recording());
    // No worker to stop
    collector.stop_workers();
}
