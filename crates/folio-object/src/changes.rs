//! Content changes: the unit of mutation against a tree.
//!
//! A change is always expressed as "replace or remove the blob a path points
//! to". Blobs are never edited in place. A batch declares the tree digest it
//! was computed against (`from_sha`), which makes every mutation a
//! compare-and-swap against a known base.

use folio_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};

/// A single content change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Change {
    /// Put a blob at `path`. `digest` is the content digest of `contents`.
    Add {
        path: String,
        digest: Digest,
        contents: Vec<u8>,
    },
    /// Remove the blob at `path`. `digest` names the blob being removed.
    Delete { path: String, digest: Digest },
}

impl Change {
    /// The path this change targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } => path,
            Self::Delete { path, .. } => path,
        }
    }

    /// The digest this change carries.
    pub fn digest(&self) -> Digest {
        match self {
            Self::Add { digest, .. } => *digest,
            Self::Delete { digest, .. } => *digest,
        }
    }
}

/// An ordered batch of changes relative to a declared base tree.
///
/// Within one batch, changes apply in the order given: a delete followed by
/// an add to the same path is well-defined (the add wins).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesBatch {
    /// The tree digest this batch was computed against.
    pub from_sha: Digest,
    /// The changes, in application order.
    pub changes: Vec<Change>,
}

impl ChangesBatch {
    /// Create a new batch against the given base tree digest.
    pub fn new(from_sha: Digest, changes: Vec<Change>) -> Self {
        Self { from_sha, changes }
    }

    /// Returns `true` if the batch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Validate a change path: relative, non-empty, no empty segments.
pub fn validate_path(path: &str) -> ObjectResult<()> {
    if path.is_empty() {
        return Err(ObjectError::InvalidPath("empty path".into()));
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(ObjectError::InvalidPath(format!(
            "path must be relative without trailing slash: {path}"
        )));
    }
    if path.split('/').any(|segment| segment.is_empty()) {
        return Err(ObjectError::InvalidPath(format!(
            "path contains empty segment: {path}"
        )));
    }
    Ok(())
}
