//! Storage layer error types.

use crate::catalog::TableId;
use crate::storage::page::{PageId, RecordId};
use thiserror::Error;

/// Errors that can occur in the storage layer and the operators built on it.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page not found: {0} lies outside its file")]
    PageNotFound(PageId),

    #[error("Tuple not found: {0}")]
    TupleNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Table not found: {0:?}")]
    TableNameNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("No such element")]
    NoSuchElement,

    #[error("Page {page_id} is full: all {capacity} slots are in use")]
    PageFull { page_id: PageId, capacity: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch for field {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("String of {len} bytes exceeds maximum length {max_len}")]
    ValueTooLong { len: usize, max_len: usize },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid page image for {page_id}: {reason}")]
    InvalidPageImage { page_id: PageId, reason: String },

    #[error("Iterator is not open")]
    IteratorNotOpen,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Could not evict: {reason}")]
    EvictionFailed { reason: String },

    #[error("Failed to flush page {page_id}: {source}")]
    FlushFailed {
        page_id: PageId,
        #[source]
        source: Box<StorageError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn stale_record(record_id: RecordId) -> Self {
        StorageError::TupleNotFound(format!("slot {} is empty", record_id))
    }

    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::PageNotFound(_)
                | StorageError::TupleNotFound(_)
                | StorageError::TableNotFound(_)
                | StorageError::TableNameNotFound(_)
                | StorageError::FieldNotFound(_)
                | StorageError::NoSuchElement
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
