// src/devices/registry.rs
//! Registry of devices and the aggregate operations over them
//!
//! Every aggregate operation is attempted on every device, concurrently, and
//! the per-device outcomes are joined into one boolean. Nothing is rolled back
//! on partial failure; per-device state stays queryable through the registry.

use crate::config::OrchestratorSettings;
use crate::data::TimeSeries;
use crate::devices::pending::PendingTransition;
use crate::devices::traits::{Collector, Device};
use crate::devices::DeviceId;
use crate::error::{DaqError, DaqResult};
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;
use std::sync::Arc;
use std::time::Instant;

struct DeviceEntry {
    device: Box<dyn Device>,
    collector: Arc<dyn Collector>,
}

/// Data of one collector as exported by [`Devices::snapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorSnapshot {
    pub name: String,
    pub live: TimeSeries,
    pub trial: TimeSeries,
}

/// Data of every registered collector, keyed by device id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicesSnapshot {
    pub devices: BTreeMap<DeviceId, CollectorSnapshot>,
}

/// Owner of every device and entry point for aggregate commands.
///
/// Dropping the registry stops every collector worker.
pub struct Devices {
    entries: BTreeMap<DeviceId, DeviceEntry>,
    next_id: DeviceId,
    settings: OrchestratorSettings,
    clock: Arc<dyn TimeProvider>,

    is_connected: bool,
    is_recording: bool,
    is_paused: bool,
}

impl Devices {
    pub fn new() -> Self {
        Self::with_settings(OrchestratorSettings::default())
    }

    pub fn with_settings(settings: OrchestratorSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemTimeProvider))
    }

    /// Registry stamping recording starts with `clock`
    pub fn with_clock(settings: OrchestratorSettings, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            settings,
            clock,
            is_connected: false,
            is_recording: false,
            is_paused: false,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Register a device and return its id. Ids are never reused.
    pub fn add(&mut self, device: Box<dyn Device>) -> DeviceId {
        let id = self.next_id;
        self.next_id += 1;

        let collector = device.data_collector();
        tracing::debug!(id, device = %device.device_name(), "device added");
        self.entries.insert(id, DeviceEntry { device, collector });
        id
    }

    /// Stop the device's workers and unregister it
    pub fn remove(&mut self, id: DeviceId) -> DaqResult<()> {
        let entry = self.entries.remove(&id).ok_or(DaqError::InvalidDeviceId(id))?;
        entry.collector.stop_workers();
        tracing::debug!(id, device = %entry.device.device_name(), "device removed");
        Ok(())
    }

    /// Stop every worker and unregister every device
    pub fn clear(&mut self) {
        for entry in self.entries.values() {
            entry.collector.stop_workers();
        }
        self.entries.clear();
        self.is_connected = false;
        self.is_recording = false;
        self.is_paused = false;
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<DeviceId> {
        self.entries.keys().copied().collect()
    }

    pub fn get_device(&self, id: DeviceId) -> DaqResult<&dyn Device> {
        self.entries
            .get(&id)
            .map(|entry| entry.device.as_ref())
            .ok_or(DaqError::InvalidDeviceId(id))
    }

    pub fn get_device_mut(&mut self, id: DeviceId) -> DaqResult<&mut (dyn Device + 'static)> {
        self.entries
            .get_mut(&id)
            .map(|entry| entry.device.as_mut())
            .ok_or(DaqError::InvalidDeviceId(id))
    }

    pub fn get_data_collector(&self, id: DeviceId) -> DaqResult<Arc<dyn Collector>> {
        self.entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.collector))
            .ok_or(DaqError::InvalidDeviceId(id))
    }

    /// True when every registered device was connected after the last
    /// connect or disconnect. False for an empty registry.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// True when every collector was recording after the last aggregate
    /// recording command
    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// True when every collector was paused after the last aggregate
    /// recording command
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Connect every device concurrently. True only if all of them connected.
    pub fn connect(&mut self) -> bool {
        let results: Vec<(DeviceId, bool)> = self
            .entries
            .par_iter_mut()
            .map(|(id, entry)| (*id, entry.device.connect()))
            .collect();

        let success = all_succeeded("connect", &results);
        self.is_connected = success && self.all_devices_connected();
        success
    }

    /// Disconnect every device concurrently
    pub fn disconnect(&mut self) -> bool {
        let results: Vec<(DeviceId, bool)> = self
            .entries
            .par_iter_mut()
            .map(|(id, entry)| (*id, entry.device.disconnect()))
            .collect();

        let success = all_succeeded("disconnect", &results);
        // A device refusing to disconnect keeps its state
        self.is_connected = self.all_devices_connected();
        self.refresh_recording_flags();
        success
    }

    /// Start recording on every device and align their start times.
    ///
    /// Every collector is asked to start without waiting, then the call blocks
    /// until all of them confirmed or the barrier timeout expired. The instant
    /// the barrier is passed becomes the trial start time of every collector
    /// that started.
    pub fn start_recording(&mut self) -> bool {
        let deadline = Instant::now() + self.settings.barrier_timeout();
        let pending = self.fan_out(|collector| collector.start_recording_async());

        let results: Vec<(DeviceId, bool)> = pending
            .iter()
            .map(|(id, _, transition)| (*id, transition.wait_until(deadline)))
            .collect();

        let barrier_ns = self.clock.now_nanos();
        for ((_, collector, _), (_, started)) in pending.iter().zip(&results) {
            if *started {
                collector.data_collector().set_recording_start_time(barrier_ns);
            }
        }

        let success = all_succeeded("start_recording", &results);
        self.refresh_recording_flags();
        // A timed-out collector may still confirm later; that is not a start
        self.is_recording &= success;
        if success {
            tracing::info!(devices = results.len(), start_time_ns = barrier_ns, "recording started on every device");
        }
        success
    }

    /// Stop recording on every device, waiting for the slowest one
    pub fn stop_recording(&mut self) -> bool {
        let deadline = Instant::now() + self.settings.stop_timeout();
        let pending = self.fan_out(|collector| collector.stop_recording_async());

        let results: Vec<(DeviceId, bool)> = pending
            .iter()
            .map(|(id, _, transition)| (*id, transition.wait_until(deadline)))
            .collect();

        let success = all_succeeded("stop_recording", &results);
        self.refresh_recording_flags();
        success
    }

    pub fn pause_recording(&mut self) -> bool {
        let results = self.par_collectors(|collector| collector.pause_recording());
        let success = all_succeeded("pause_recording", &results);
        self.refresh_recording_flags();
        success
    }

    pub fn resume_recording(&mut self) -> bool {
        let results = self.par_collectors(|collector| collector.resume_recording());
        let success = all_succeeded("resume_recording", &results);
        self.refresh_recording_flags();
        success
    }

    /// Collector handles, so fan-outs never touch the devices themselves
    fn collectors(&self) -> Vec<(DeviceId, Arc<dyn Collector>)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.collector)))
            .collect()
    }

    fn fan_out<F>(&self, request: F) -> Vec<(DeviceId, Arc<dyn Collector>, PendingTransition)>
    where
        F: Fn(&dyn Collector) -> PendingTransition + Sync,
    {
        self.collectors()
            .into_par_iter()
            .map(|(id, collector)| {
                let transition = request(collector.as_ref());
                (id, collector, transition)
            })
            .collect()
    }

    fn par_collectors<F>(&self, op: F) -> Vec<(DeviceId, bool)>
    where
        F: Fn(&dyn Collector) -> bool + Sync,
    {
        self.collectors()
            .into_par_iter()
            .map(|(id, collector)| (id, op(collector.as_ref())))
            .collect()
    }

    /// `predicate` holds for every collector. False for an empty registry.
    fn all_collectors<F>(&self, predicate: F) -> bool
    where
        F: Fn(&dyn Collector) -> bool,
    {
        !self.entries.is_empty() && self.entries.values().all(|entry| predicate(entry.collector.as_ref()))
    }

    fn all_devices_connected(&self) -> bool {
        !self.entries.is_empty() && self.entries.values().all(|entry| entry.device.is_connected())
    }

    fn refresh_recording_flags(&mut self) {
        self.is_recording = self.all_collectors(|collector| collector.is_recording());
        self.is_paused = self.all_collectors(|collector| collector.is_paused());
    }

    /// Copy the name and both series of every collector
    pub fn snapshot(&self) -> DevicesSnapshot {
        let devices = self
            .entries
            .iter()
            .map(|(id, entry)| {
                let collector = entry.collector.data_collector();
                let (live, trial) = collector.data();
                (*id, CollectorSnapshot { name: collector.name(), live, trial })
            })
            .collect();
        DevicesSnapshot { devices }
    }

    /// JSON object keyed by device id with each collector's data
    pub fn serialize(&self) -> DaqResult<serde_json::Value> {
        let snapshot = self.snapshot();
        let mut object = serde_json::Map::with_capacity(snapshot.devices.len());
        for (id, collector) in snapshot.devices {
            object.insert(id.to_string(), serde_json::to_value(collector)?);
        }
        Ok(serde_json::Value::Object(object))
    }
}

fn all_succeeded(operation: &str, results: &[(DeviceId, bool)]) -> bool {
    let failed: Vec<DeviceId> = results.iter().filter(|(_, ok)| !ok).map(|(id, _)| *id).collect();
    if failed.is_empty() {
        tracing::debug!(operation, devices = results.len(), "aggregate operation succeeded");
        true
    } else {
        tracing::warn!(operation, ?failed, devices = results.len(), "aggregate operation failed on some devices");
        false
    }
}

impl Default for Devices {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<DeviceId> for Devices {
    type Output = dyn Device;

    /// # Panics
    ///
    /// Panics if no device is registered under `id`.
    fn index(&self, id: DeviceId) -> &Self::Output {
        match self.entries.get(&id) {
            Some(entry) => entry.device.as_ref(),
            None => panic!("no device registered under id {}", id),
        }
    }
}

impl Drop for Devices {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.collector.stop_workers();
        }
    }
}

impl std::fmt::Debug for Devices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Devices")
            .field("ids", &self.ids())
            .field("is_connected", &self.is_connected)
            .field("is_recording", &self.is_recording)
            .field("is_paused", &self.is_paused)
            .finish()
    }
}
