use folio_types::Digest;
use thiserror::Error;

/// Errors from patch creation and application.
///
/// All of these are fatal verification or format failures; none are
/// retryable. A caller seeing [`PatchError::BaseMismatch`] may re-fetch a
/// fresh base and recompute, but the patch itself is never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The patch is shorter than the two digest frames.
    #[error("truncated patch: {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    /// The supplied base does not match the digest the patch was created
    /// against.
    #[error("patch base mismatch: patch expects {expected}, base is {actual}")]
    BaseMismatch { expected: Digest, actual: Digest },

    /// The decoded result does not match the trailing digest: the patch
    /// bytes are corrupt.
    #[error("corrupt patch: result digest {actual} does not match declared {expected}")]
    CorruptPatch { expected: Digest, actual: Digest },

    /// The delta instruction stream is malformed.
    #[error("malformed delta: {0}")]
    MalformedDelta(String),
}

/// Result alias for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;
