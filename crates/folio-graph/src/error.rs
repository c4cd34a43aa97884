use folio_types::EntryStatus;
use thiserror::Error;

/// Errors produced by graph mutation and commit operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("unknown entry: {0}")]
    UnknownEntry(String),

    #[error("entry {id} already exists")]
    DuplicateEntry { id: String },

    #[error("no {status} row for entry {id}")]
    NoSuchRow { id: String, status: EntryStatus },

    #[error("type {parent_type} does not contain {child_type}")]
    RejectedByContains {
        parent_type: String,
        child_type: String,
    },

    #[error("moving {id} under its own subtree")]
    CircularMove { id: String },

    #[error("invalid order key: {0}")]
    InvalidOrderKey(String),

    #[error("entry payload rejected: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Source(#[from] folio_source::SourceError),

    #[error(transparent)]
    Object(#[from] folio_object::ObjectError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
