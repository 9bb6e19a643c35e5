//! Record store error types
//!
//! Error codes:
//! - FILESTORE_DUPLICATE_ID: insert target id already stored
//! - FILESTORE_NOT_FOUND: update target id not stored
//! - FILESTORE_ID_CHANGED: update mutator changed a record's id
//! - FILESTORE_IO_ERROR: filesystem primitive failed
//! - FILESTORE_DECODE_FAILED / FILESTORE_ENCODE_FAILED: converter failed
//! - FILESTORE_CONTAINER_MISSING: store opened on a missing directory or file
//! - FILESTORE_CONFIG_ERROR: invalid store configuration
//! - FILESTORE_LOCK_POISONED: serialized store mutex poisoned
//!
//! Every batch rejection is detected before the first write, so a rejected
//! call leaves the backing directory or file exactly as it was.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use crate::convert::ConvertError;
use crate::fs::FsError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Records with the same ids already exist: [{}]", .ids.join(", "))]
    DuplicateId { ids: Vec<String> },

    #[error("Records with such ids do not exist: [{}]", .ids.join(", "))]
    NotFound { ids: Vec<String> },

    #[error("The update function changed the record id: {before} -> {after}")]
    IdChanged { before: String, after: String },

    #[error("I/O error: {0}")]
    Io(#[from] FsError),

    #[error("Failed to decode record at {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: ConvertError,
    },

    #[error("Failed to encode record {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: ConvertError,
    },

    #[error("Store container does not exist: {}", .path.display())]
    ContainerMissing { path: PathBuf },

    #[error("Invalid store configuration: {0}")]
    Config(String),

    #[error("Store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl StoreError {
    /// Duplicate ids, rendered with `Display`
    pub fn duplicate_ids<I: Display>(ids: impl IntoIterator<Item = I>) -> Self {
        StoreError::DuplicateId {
            ids: ids.into_iter().map(|id| id.to_string()).collect(),
        }
    }

    /// Missing ids, rendered with `Display`
    pub fn not_found<I: Display>(ids: impl IntoIterator<Item = I>) -> Self {
        StoreError::NotFound {
            ids: ids.into_iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn id_changed(before: &impl Display, after: &impl Display) -> Self {
        StoreError::IdChanged {
            before: before.to_string(),
            after: after.to_string(),
        }
    }

    pub fn decode(location: impl Into<String>, source: ConvertError) -> Self {
        StoreError::Decode {
            location: location.into(),
            source,
        }
    }

    pub fn encode(id: &impl Display, source: ConvertError) -> Self {
        StoreError::Encode {
            id: id.to_string(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        StoreError::Config(message.into())
    }

    /// Returns the string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateId { .. } => "FILESTORE_DUPLICATE_ID",
            StoreError::NotFound { .. } => "FILESTORE_NOT_FOUND",
            StoreError::IdChanged { .. } => "FILESTORE_ID_CHANGED",
            StoreError::Io(_) => "FILESTORE_IO_ERROR",
            StoreError::Decode { .. } => "FILESTORE_DECODE_FAILED",
            StoreError::Encode { .. } => "FILESTORE_ENCODE_FAILED",
            StoreError::ContainerMissing { .. } => "FILESTORE_CONTAINER_MISSING",
            StoreError::Config(_) => "FILESTORE_CONFIG_ERROR",
            StoreError::LockPoisoned(_) => "FILESTORE_LOCK_POISONED",
        }
    }

    /// Whether the call can be retried once the caller corrects its input.
    ///
    /// True for the input-validation kinds, which never touch storage.
    pub fn is_retryable_after_fix(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateId { .. } | StoreError::NotFound { .. } | StoreError::IdChanged { .. }
        )
    }
}
