//! Error types for mapping store operations.
//!
//! Every variant is an I/O-level failure of the store itself. Unreadable
//! content is never an error: see [`crate::MappingStore`] for the tolerant
//! read policy.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while accessing a mapping store file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The exclusive lock for a store file could not be acquired.
    #[error("Failed to lock mapping store '{}': {source}", path.display())]
    Lock {
        /// The store file whose lock failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The store file could not be written.
    #[error("Failed to write mapping store '{}': {source}", path.display())]
    Write {
        /// The store file that failed to persist.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The in-memory mapping set could not be serialized.
    #[error("Failed to serialize mapping store '{}': {message}", path.display())]
    Serialize {
        /// The store file being written.
        path: PathBuf,
        /// Serializer error message.
        message: String,
    },
}

impl StoreError {
    /// Creates a lock error.
    pub fn lock(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Returns the store file this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            StoreError::Lock { path, .. }
            | StoreError::Write { path, .. }
            | StoreError::Serialize { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_display() {
        let err = StoreError::lock(
            "/tmp/dev-mappings.yaml",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to lock mapping store '/tmp/dev-mappings.yaml': denied"
        );
    }

    #[test]
    fn test_error_path() {
        let err = StoreError::Serialize {
            path: PathBuf::from("a.yaml"),
            message: "bad".to_string(),
        };
        assert_eq!(err.path(), std::path::Path::new("a.yaml"));
        assert!(err.to_string().contains("bad"));
    }
}
