//! Error types for tdlpack
//!
//! Provides a unified error type for all operations. Every variant is fatal
//! to the call that raised it; nothing is retried internally.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using TdlpackError
pub type Result<T> = std::result::Result<T, TdlpackError>;

/// Unified error type for tdlpack operations
#[derive(Debug, Error)]
pub enum TdlpackError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    // -------------------------------------------------------------------------
    // Archive Errors
    // -------------------------------------------------------------------------
    /// Physical framing inconsistency or unrecognized record
    #[error("Format error: {0}")]
    Format(String),

    #[error("Record index {index} out of bounds (archive has {len} records)")]
    Bounds { index: usize, len: usize },

    // -------------------------------------------------------------------------
    // Dataset Errors
    // -------------------------------------------------------------------------
    /// Uneven axis coverage, disagreeing cubes, duplicate coordinates
    #[error("Schema error: {0}")]
    Schema(String),

    /// Geometry combinations the cube engine cannot represent
    #[error("Unsupported: {0}")]
    Unsupported(String),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    /// Identifier field out of range, missing metadata on write
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload codec error: {0}")]
    Codec(String),
}

impl TdlpackError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
