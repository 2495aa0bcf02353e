//! Common utilities shared across DAQ Core
//!
//! - Time and timestamp management with an injectable clock
//! - Synchronous notification events used by the collectors

pub mod event;
pub mod time;

pub use event::{Event, SubscriptionId};
pub use time::{
    current_timestamp_nanos,
    duration_to_nanos,
    MockTimeProvider,
    SystemTimeProvider,
    TimeProvider,
};
