//! Error types for the test switch driver.

use std::io;

use l1_mapping_store::StoreError;
use thiserror::Error;

/// Result type alias for driver operations.
pub type SwitchResult<T> = Result<T, SwitchError>;

/// Errors surfaced to the caller of a driver command.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// A port involved in the operation is fault-injected.
    #[error("{marker}")]
    ExceptionPort {
        /// The exception-marked port.
        port: String,
        /// The stored marker text.
        marker: String,
    },

    /// Destination already mapped to another source and override is off.
    #[error("DST port already used in {existing_src}->{dst}, override mapping is not allowed.")]
    MappingConflict {
        /// Source currently recorded for the destination.
        existing_src: String,
        /// The destination port.
        dst: String,
    },

    /// Mapping store failure (lock or write).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Command not supported by the simulated device.
    #[error("{operation} is not implemented")]
    NotImplemented {
        /// The unsupported command.
        operation: String,
    },

    /// Mapping command issued before Login established a device.
    #[error("{operation} requires a session, call Login first")]
    NoSession {
        /// The rejected command.
        operation: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SwitchError {
    /// Creates an exception-port error.
    pub fn exception_port(port: impl Into<String>, marker: impl Into<String>) -> Self {
        Self::ExceptionPort {
            port: port.into(),
            marker: marker.into(),
        }
    }

    /// Creates a mapping conflict error.
    pub fn mapping_conflict(existing_src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self::MappingConflict {
            existing_src: existing_src.into(),
            dst: dst.into(),
        }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable error kind reported on the command protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            SwitchError::ExceptionPort { .. } => "ExceptionPort",
            SwitchError::MappingConflict { .. } => "MappingConflict",
            SwitchError::Store(_) | SwitchError::Io(_) => "StoreIO",
            SwitchError::NotImplemented { .. } => "NotImplemented",
            SwitchError::NoSession { .. } => "NoSession",
            SwitchError::InvalidConfig { .. } | SwitchError::Config(_) => "Config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_port_shows_marker() {
        let err = SwitchError::exception_port("P1", "except: fiber fault");
        assert_eq!(err.to_string(), "except: fiber fault");
        assert_eq!(err.kind(), "ExceptionPort");
    }

    #[test]
    fn test_mapping_conflict_display() {
        let err = SwitchError::mapping_conflict("dev/1/1", "dev/1/3");
        assert_eq!(
            err.to_string(),
            "DST port already used in dev/1/1->dev/1/3, override mapping is not allowed."
        );
        assert_eq!(err.kind(), "MappingConflict");
    }

    #[test]
    fn test_store_error_kind() {
        let err: SwitchError = StoreError::lock(
            "x.yaml",
            io::Error::new(io::ErrorKind::Other, "no lock"),
        )
        .into();
        assert_eq!(err.kind(), "StoreIO");
        assert!(err.to_string().contains("no lock"));
    }

    #[test]
    fn test_not_implemented_display() {
        let err = SwitchError::not_implemented("SetSpeedManual");
        assert_eq!(err.to_string(), "SetSpeedManual is not implemented");
    }
}
