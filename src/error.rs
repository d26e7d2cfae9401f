//! Error types for PiCopy
//!
//! This module defines the error taxonomy used by the transfer engine and
//! its collaborators. Per-file errors are caught at the batch and directory
//! boundaries and surfaced through status messages, never by aborting the
//! host process.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PiCopy operations
#[derive(Error, Debug)]
pub enum TransferError {
    /// Remote operation attempted with no active session
    #[error("No active remote session")]
    ConnectionUnavailable,

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path already exists (tolerated by directory creation)
    #[error("Path already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Operation cancelled by user
    #[error("Transfer cancelled")]
    Cancelled,

    /// I/O error during local or remote file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path the operation was working on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Generic remote fault without an io::Error behind it
    #[error("Remote error at '{path}': {message}")]
    Remote {
        /// Remote path involved
        path: PathBuf,
        /// Message reported by the remote side
        message: String,
    },

    /// A batch is already running
    #[error("A transfer batch is already in progress")]
    Busy,

    /// The remote-access collaborator rejected the chunk progress hook
    #[error("Chunked progress is not supported for '{0}'")]
    ProgressUnsupported(PathBuf),

    /// Network/SSH connection error
    #[error("Connection error to '{host}': {message}")]
    Connection {
        /// Host that could not be reached
        host: String,
        /// Failure description
        message: String,
    },

    /// SSH authentication failed
    #[error("SSH authentication failed for '{user}@{host}': {message}")]
    Authentication {
        /// Login user
        user: String,
        /// Host that rejected the login
        host: String,
        /// Failure description
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings or history (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The batch worker thread died
    #[error("Transfer worker failed: {0}")]
    Internal(String),
}

impl TransferError {
    /// Create an I/O error with path context, mapping well-known kinds
    /// onto the matching taxonomy variants
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            _ => Self::Io { path, source },
        }
    }

    /// Create a generic remote error
    pub fn remote(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Remote {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(
        user: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Authentication {
            user: user.into(),
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error is a user-initiated cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is recoverable (a later attempt may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Remote { .. } | Self::Connection { .. } | Self::Busy
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::Remote { path, .. }
            | Self::NotFound(path)
            | Self::PermissionDenied(path)
            | Self::AlreadyExists(path)
            | Self::ProgressUnsupported(path) => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for PiCopy operations
pub type Result<T> = std::result::Result<T, TransferError>;

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::Serialization(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| TransferError::from_io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_kinds_map_to_taxonomy() {
        let err = TransferError::from_io("/a", Error::new(ErrorKind::NotFound, "gone"));
        assert!(matches!(err, TransferError::NotFound(_)));

        let err = TransferError::from_io("/a", Error::new(ErrorKind::PermissionDenied, "no"));
        assert!(matches!(err, TransferError::PermissionDenied(_)));

        let err = TransferError::from_io("/a", Error::new(ErrorKind::AlreadyExists, "dup"));
        assert!(matches!(err, TransferError::AlreadyExists(_)));

        let err = TransferError::from_io("/a", Error::new(ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(err, TransferError::Io { .. }));
        assert_eq!(err.path().unwrap(), &PathBuf::from("/a"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(TransferError::Cancelled.is_cancelled());
        assert!(!TransferError::Busy.is_cancelled());
        assert!(TransferError::remote("/x", "eof").is_recoverable());
        assert!(!TransferError::PermissionDenied(PathBuf::from("/x")).is_recoverable());
        assert!(TransferError::ConnectionUnavailable.path().is_none());
    }

    #[test]
    fn test_structured_messages() {
        assert_eq!(
            TransferError::remote("/srv/a", "eof").to_string(),
            "Remote error at '/srv/a': eof"
        );
        assert_eq!(
            TransferError::connection("pi.local", "refused").to_string(),
            "Connection error to 'pi.local': refused"
        );
        assert_eq!(
            TransferError::auth("pi", "pi.local", "bad key").to_string(),
            "SSH authentication failed for 'pi@pi.local': bad key"
        );
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> = Err(Error::new(ErrorKind::Other, "boom"));
        let err = res.with_path("/tmp/file").unwrap_err();
        assert_eq!(err.to_string(), "I/O error at '/tmp/file': boom");
    }
}
