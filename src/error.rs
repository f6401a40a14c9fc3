//! Custom error types for Snapvault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// How a transfer attempt ended when it did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferExit {
    /// The process exited with this status code
    Code(i32),
    /// The process was terminated without an exit code (e.g. by a signal)
    Terminated,
}

impl TransferExit {
    /// Whether this exit counts as a successful transfer
    pub fn success(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for TransferExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit status {}", code),
            Self::Terminated => write!(f, "terminated by signal"),
        }
    }
}

/// The main error type for Snapvault operations
#[derive(Error, Debug)]
pub enum SnapvaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A directory with the new snapshot's name already exists
    #[error("Snapshot already exists: {name}")]
    NamingCollision { name: String },

    /// The destination directory could not be created
    #[error("Failed to create snapshot directory {}: {reason}", path.display())]
    DestinationCreate { path: PathBuf, reason: String },

    /// The transfer tool kept failing until the retry ceiling was reached
    #[error("Transfer failed with {exit} after {attempts} attempt(s)")]
    TransferFailed { exit: TransferExit, attempts: u32 },

    /// The transfer tool could not be started
    #[error("Failed to start transfer program '{program}': {reason}")]
    TransferSpawn { program: String, reason: String },

    /// The failed snapshot could not be renamed aside
    #[error("{source}; additionally failed to rename {} to {}: {reason}", from.display(), to.display())]
    RenameToFailed {
        source: Box<SnapvaultError>,
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Part of a snapshot could not be removed during pruning
    #[error("Failed to prune snapshot {name} ({}): {reason}", path.display())]
    PruneDelete {
        name: String,
        path: PathBuf,
        reason: String,
    },

    /// A pruning pass finished but some snapshots were not removed cleanly
    #[error("Pruning finished with {failures} problem(s)")]
    PruneIncomplete { failures: usize },

    /// Another cycle holds the store lock
    #[error("Lock error: {0}")]
    Lock(String),
}

impl SnapvaultError {
    /// Check if this error means the transfer itself did not succeed
    ///
    /// A failed rename wraps the transfer failure, so it counts as well.
    pub fn is_transfer_failure(&self) -> bool {
        match self {
            Self::TransferFailed { .. } | Self::TransferSpawn { .. } => true,
            Self::RenameToFailed { source, .. } => source.is_transfer_failure(),
            _ => false,
        }
    }

    /// Check if this is a naming collision
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::NamingCollision { .. })
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for SnapvaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapvaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for Snapvault operations
pub type SnapvaultResult<T> = Result<T, SnapvaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SnapvaultError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_transfer_failed_display() {
        let err = SnapvaultError::TransferFailed {
            exit: TransferExit::Code(23),
            attempts: 10,
        };
        assert_eq!(
            err.to_string(),
            "Transfer failed with exit status 23 after 10 attempt(s)"
        );
        assert!(err.is_transfer_failure());
    }

    #[test]
    fn test_rename_to_failed_wraps_transfer_failure() {
        let err = SnapvaultError::RenameToFailed {
            source: Box::new(SnapvaultError::TransferFailed {
                exit: TransferExit::Terminated,
                attempts: 1,
            }),
            from: PathBuf::from("/b/2024-01-01-00:00:00"),
            to: PathBuf::from("/b/2024-01-01-00:00:00-FAILED"),
            reason: "permission denied".into(),
        };

        let message = err.to_string();
        assert!(message.starts_with("Transfer failed with terminated by signal"));
        assert!(message.contains("-FAILED"));
        assert!(message.ends_with("permission denied"));
        assert!(err.is_transfer_failure());
    }

    #[test]
    fn test_collision_error() {
        let err = SnapvaultError::NamingCollision {
            name: "2024-01-01-00:00:00".into(),
        };
        assert_eq!(err.to_string(), "Snapshot already exists: 2024-01-01-00:00:00");
        assert!(err.is_collision());
        assert!(!err.is_transfer_failure());
    }

    #[test]
    fn test_transfer_exit_success() {
        assert!(TransferExit::Code(0).success());
        assert!(!TransferExit::Code(1).success());
        assert!(!TransferExit::Terminated.success());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SnapvaultError = io_err.into();
        assert!(matches!(err, SnapvaultError::Io(_)));
    }
}
