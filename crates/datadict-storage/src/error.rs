//! Error types for the persistent log.

use std::path::PathBuf;
use std::time::Duration;

use datadict::DataDictError;
use thiserror::Error;

/// Errors that can occur while writing or reading a log.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Another writer holds the log.
    #[error("log {} is busy: another writer holds it", .0.display())]
    Busy(PathBuf),

    /// The access lock could not be acquired in time.
    #[error("timed out after {:?} waiting for access to {}", .waited, .path.display())]
    Timeout { path: PathBuf, waited: Duration },

    /// The log or a dataset inside it does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    Zarr(String),

    /// Data does not fit what is already stored.
    #[error("incompatible with stored data: {0}")]
    Incompatible(String),

    /// Stored attributes are missing or malformed.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The dataset itself is invalid.
    #[error(transparent)]
    Data(#[from] DataDictError),

    /// Filesystem error.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a Zarr error.
    pub fn zarr(msg: impl Into<String>) -> Self {
        Self::Zarr(msg.into())
    }

    /// Create an Incompatible error.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::Incompatible(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Whether the error is transient lock contention.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StorageError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Data(DataDictError::from(err))
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
