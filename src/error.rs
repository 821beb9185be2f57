//! Error types for linestore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::id::Ksid;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for linestore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid blob reference: {0:?}")]
    InvalidBlobRef(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Table File Errors
    // -------------------------------------------------------------------------
    #[error("Schema mismatch in {}: {reason}", path.display())]
    SchemaMismatch { path: PathBuf, reason: String },

    #[error("Corrupt table {} at line {line}: {reason}", path.display())]
    Corruption {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Row Errors
    // -------------------------------------------------------------------------
    #[error("Row {0} not found")]
    NotFound(Ksid),

    #[error("Duplicate row ID {0}")]
    DuplicateId(Ksid),

    #[error("Invalid row: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Blob Errors
    // -------------------------------------------------------------------------
    #[error("Blob not found: {0}")]
    BlobNotFound(String),
}

impl StoreError {
    /// Shorthand for rejecting a row from `Row::validate`
    pub fn invalid(reason: impl Into<String>) -> Self {
        StoreError::Validation(reason.into())
    }
}
