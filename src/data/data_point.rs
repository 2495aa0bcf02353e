// src/data/data_point.rs
//! Single timestamped multi-channel sample

use serde::{Deserialize, Serialize};

/// One acquisition frame: a timestamp plus one value per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Acquisition time in nanoseconds since the Unix epoch
    pub timestamp_ns: u64,
    pub values: Vec<f64>,
}

impl DataPoint {
    pub fn new(timestamp_ns: u64, values: Vec<f64>) -> Self {
        Self { timestamp_ns, values }
    }

    /// Number of channels carried by this point
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }
}
