//! Error types for the geosearch library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`GeoSearchError`] enum.
//!
//! # Examples
//!
//! ```
//! use geosearch::error::{GeoSearchError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(GeoSearchError::invalid_argument("range must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for geosearch operations.
#[derive(Error, Debug)]
pub enum GeoSearchError {
    /// I/O errors (file operations, truncated reads, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage-related errors (missing or malformed segment files)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rejected input, such as an out-of-domain latitude or a negative range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Query execution errors
    #[error("Query error: {0}")]
    Query(String),

    /// Index-related errors (manifest, segment bookkeeping)
    #[error("Index error: {0}")]
    Index(String),

    /// Operation cancelled or timed out
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with GeoSearchError.
pub type Result<T> = std::result::Result<T, GeoSearchError>;

impl GeoSearchError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::Storage(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::InvalidArgument(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::Query(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::Index(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::OperationCancelled(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::OperationCancelled(format!("Timeout: {}", msg.into()))
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GeoSearchError::Other(msg.into())
    }

    /// Whether this error was caused by rejected caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, GeoSearchError::InvalidArgument(_))
    }
}
