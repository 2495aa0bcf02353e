// src/error.rs
//! Unified error handling for DAQ Core
//!
//! Operational failures (a device refusing to connect, a hook failing to start
//! streaming, an invalid state transition) are reported as `false` by the
//! collector and orchestrator operations. `DaqError` covers the other class:
//! misuse of the API, configuration problems and worker plumbing failures.

use crate::devices::DeviceId;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::SystemTime;
use thiserror::Error;

/// Unified error type for the whole crate
#[derive(Debug, Clone, Error)]
pub enum DaqError {
    /// No device is registered under this id (never added, or removed)
    #[error("[REGISTRY] No device registered under id {0}")]
    InvalidDeviceId(DeviceId),

    /// A data point does not match the collector channel width
    #[error("[DATA] Data point has {actual} channels, expected {expected}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// The worker thread could not be spawned or reached
    #[error("[WORKER] {collector}: {reason} ({})", .context.operation)]
    Worker {
        collector: String,
        reason: String,
        context: ErrorContext,
    },

    /// Configuration and setup errors
    #[error("[CONFIG] Configuration error in {component}: {reason} ({})", .context.operation)]
    Configuration {
        component: String,
        reason: String,
        context: ErrorContext,
    },

    /// Snapshot serialization errors
    #[error("[SERIALIZE] {0}")]
    Serialization(String),

    /// Foreign errors mapped through [`IntoDaqError`]
    #[error("[SYSTEM] {subsystem} error: {reason} ({})", .context.operation)]
    System {
        subsystem: String,
        reason: String,
        context: ErrorContext,
    },
}

/// Error context for debugging and analysis
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_id: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_id: std::thread::current().name().map(|s| s.to_string()),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    /// Add additional information to the context
    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl DaqError {
    /// Configuration error raised by `component` while running `operation`
    pub fn configuration(component: &str, operation: &str, reason: impl Into<String>) -> Self {
        DaqError::Configuration {
            component: component.to_string(),
            reason: reason.into(),
            context: ErrorContext::new(component, operation),
        }
    }

    /// Worker error raised for the named collector
    pub fn worker(collector: &str, operation: &str, reason: impl Into<String>) -> Self {
        DaqError::Worker {
            collector: collector.to_string(),
            reason: reason.into(),
            context: ErrorContext::new("worker", operation).add_info("collector", collector),
        }
    }

    /// Context attached to the error, if the variant carries one
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            DaqError::Worker { context, .. }
            | DaqError::Configuration { context, .. }
            | DaqError::System { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DaqError {
    fn from(err: serde_json::Error) -> Self {
        DaqError::Serialization(err.to_string())
    }
}

/// Result type alias for DAQ operations
pub type DaqResult<T> = Result<T, DaqError>;

/// Convenience trait mapping foreign errors into [`DaqError::System`]
pub trait IntoDaqError<T> {
    fn daq_err(self, component: &str, operation: &str) -> DaqResult<T>;
}

impl<T, E> IntoDaqError<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn daq_err(self, component: &str, operation: &str) -> DaqResult<T> {
        self.map_err(|err| DaqError::System {
            subsystem: component.to_string(),
            reason: err.to_string(),
            context: ErrorContext::new(component, operation),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("test_component", "test_operation");
        assert_eq!(context.component, "test_component");
        assert_eq!(context.operation, "test_operation");
        assert!(context.timestamp <= SystemTime::now());
    }

    #[test]
    fn test_error_context_macro_records_location() {
        let context = error_context!("registry", "remove");
        assert_eq!(context.file, Some(file!()));
        assert!(context.line.is_some());
    }

    #[test]
    fn test_error_display() {
        let err = DaqError::ChannelMismatch { expected: 4, actual: 3 };
        let display = format!("{}", err);
        assert!(display.contains("3 channels"));
        assert!(display.contains("expected 4"));

        let err = DaqError::InvalidDeviceId(7);
        assert!(err.to_string().contains("id 7"));
    }

    #[test]
    fn test_configuration_builder() {
        let err = DaqError::configuration("collector", "validate", "interval must be positive");
        match &err {
            DaqError::Configuration { component, reason, .. } => {
                assert_eq!(component, "collector");
                assert_eq!(reason, "interval must be positive");
            }
            _ => panic!("Expected configuration error"),
        }
        assert_eq!(err.context().map(|c| c.operation.as_str()), Some("validate"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DaqError>();
    }

    #[test]
    fn test_into_daq_error_trait() {
        let result: Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "test error",
        ));

        match result.daq_err("config_loader", "load_file").unwrap_err() {
            DaqError::System { subsystem, reason, .. } => {
                assert_eq!(subsystem, "config_loader");
                assert!(reason.contains("test error"));
            }
            _ => panic!("Expected system error"),
        }
    }
}
