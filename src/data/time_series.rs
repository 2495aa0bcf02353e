// src/data/time_series.rs
//! Append-only ordered series of data points with a fixed channel width

use crate::data::DataPoint;
use crate::error::{DaqError, DaqResult};
use serde::{Deserialize, Serialize};

/// Ordered container of [`DataPoint`]s sharing one channel width.
///
/// The series only grows; [`TimeSeries::reset`] is the single way to drop its
/// content, and it also re-anchors the start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    channel_count: usize,
    /// Start of the series in nanoseconds since the Unix epoch
    start_time_ns: Option<u64>,
    points: Vec<DataPoint>,
}

impl TimeSeries {
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            start_time_ns: None,
            points: Vec::new(),
        }
    }

    /// Drop every point and restart the series at `start_time_ns`
    pub fn reset(&mut self, start_time_ns: Option<u64>) {
        self.points.clear();
        self.start_time_ns = start_time_ns;
    }

    /// Check that a point fits this series without storing it
    pub fn check_width(&self, point: &DataPoint) -> DaqResult<()> {
        if point.channel_count() != self.channel_count {
            return Err(DaqError::ChannelMismatch {
                expected: self.channel_count,
                actual: point.channel_count(),
            });
        }
        Ok(())
    }

    /// Append one point
    pub fn push(&mut self, point: DataPoint) -> DaqResult<()> {
        self.check_width(&point)?;
        self.points.push(point);
        Ok(())
    }

    /// Append a batch. Either every point is stored or none is.
    pub fn extend(&mut self, points: &[DataPoint]) -> DaqResult<()> {
        for point in points {
            self.check_width(point)?;
        }
        self.points.extend_from_slice(points);
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn start_time_ns(&self) -> Option<u64> {
        self.start_time_ns
    }

    pub fn set_start_time_ns(&mut self, start_time_ns: u64) {
        self.start_time_ns = Some(start_time_ns);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&DataPoint> {
        self.points.last()
    }
}
