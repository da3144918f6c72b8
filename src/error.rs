//! Error types for gridstore.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Common error type for gridstore.
#[derive(Error, Debug)]
pub enum GridStoreError {
    /// No metadata record matched a query.
    #[error("{0} not found")]
    NotFound(String),

    /// A string could not be parsed into a file identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A local upload source does not exist.
    #[error("source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A local download destination cannot be written.
    #[error("destination path unavailable: {}", .path.display())]
    PathUnavailable {
        /// The path that could not be used.
        path: PathBuf,
        /// The underlying I/O error, when the filesystem reported one.
        #[source]
        source: Option<io::Error>,
    },

    /// A read or write failed while bytes were moving.
    ///
    /// The underlying stream error is kept as-is.
    #[error("transfer failed: {0}")]
    Transfer(#[source] io::Error),

    /// Any other error reported by the backing store.
    ///
    /// Store errors are forwarded without being mapped onto the other variants.
    #[error("store error: {0}")]
    Store(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside an active transfer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// Conversion from driver errors
impl From<mongodb::error::Error> for GridStoreError {
    fn from(e: mongodb::error::Error) -> Self {
        GridStoreError::Store(e.to_string())
    }
}

/// Result type alias for gridstore operations.
pub type Result<T> = std::result::Result<T, GridStoreError>;
