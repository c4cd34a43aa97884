use thiserror::Error;

/// Errors from object hashing, tree encoding, and change application.
///
/// Format errors indicate corruption rather than a race; they are always
/// fatal and never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectError {
    /// Tree bytes do not follow the tree-object encoding.
    #[error("malformed tree object: {0}")]
    MalformedTree(String),

    /// A tree record carries a mode this implementation does not know.
    #[error("unknown tree entry mode: {0}")]
    UnknownMode(String),

    /// A change path is empty, absolute, or contains an empty segment.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result alias for object operations.
pub type ObjectResult<T> = Result<T, ObjectError>;
