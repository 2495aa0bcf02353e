// src/data/mod.rs
//! Sample containers shared by collectors and the orchestrator

pub mod data_point;
pub mod time_series;

pub use data_point::*;
pub use time_series::*;
