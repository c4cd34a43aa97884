use folio_object::ObjectError;
use folio_types::Digest;
use thiserror::Error;

/// Errors from source operations and the commit protocol.
///
/// Concurrency conflicts (`ShaMismatch`, `StaleEntry`) are expected and
/// recoverable: the caller re-syncs and recomputes its change against the
/// new base. Format and transport errors propagate as-is; no source masks
/// them with defaults.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The caller's declared base tree does not match the store's current
    /// tree: another writer got there first.
    #[error("sha mismatch: expected {expected}, actual {actual}")]
    ShaMismatch { expected: Digest, actual: Digest },

    /// A per-path commit check failed: the entry at `path` changed since
    /// the request was computed.
    #[error("stale entry at {path}")]
    StaleEntry { path: String },

    /// A change path does not carry a namespace prefix.
    #[error("invalid change path: {0}")]
    InvalidPath(String),

    /// A change addressed a namespace no member source is mounted under.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// A requested blob is not present in the source.
    #[error("blob not found: {0}")]
    BlobMissing(Digest),

    /// The remote reported a response this implementation cannot operate
    /// on (e.g. a truncated tree listing). Fatal: we never operate on
    /// partial data.
    #[error("unsupported remote response: {0}")]
    Unsupported(String),

    /// Network or authentication failure talking to a remote.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed tree or blob data.
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// Result alias for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
