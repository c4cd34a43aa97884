//! The [`Source`] trait: a polymorphic place entries are stored.
//!
//! Local in-memory operations are synchronous in practice, but the trait is
//! async because remote-backed sources suspend on network I/O. Callers must
//! not assume ordering between two concurrent [`CommitAuthority::submit`]
//! calls beyond what the authority serializes.

use async_trait::async_trait;
use folio_object::{ChangesBatch, Tree};
use folio_types::Digest;

use crate::commit::CommitRequest;
use crate::error::SourceResult;

/// A place entries are stored, addressed as a content tree plus blobs.
///
/// Invariants all implementations must satisfy:
/// - Trees and blobs are immutable; a mutation always produces a new tree
///   digest.
/// - `apply_changes` is the sole writer gate and enforces the
///   compare-and-swap check against `batch.from_sha`.
/// - Errors propagate; no implementation substitutes defaults for missing
///   or partial data.
#[async_trait]
pub trait Source: Send + Sync {
    /// The current content tree.
    async fn get_tree(&self) -> SourceResult<Tree>;

    /// The current tree, or `Ok(None)` when its digest still equals `sha`.
    ///
    /// Lets callers poll for changes without re-materializing an unchanged
    /// tree.
    async fn get_tree_if_different(&self, sha: Digest) -> SourceResult<Option<Tree>>;

    /// Read a blob by content digest.
    async fn get_blob(&self, sha: Digest) -> SourceResult<Vec<u8>>;

    /// Read several blobs. The default implementation loops
    /// [`Source::get_blob`]; backends may override to batch round-trips.
    async fn get_blobs(&self, shas: &[Digest]) -> SourceResult<Vec<Vec<u8>>> {
        let mut blobs = Vec::with_capacity(shas.len());
        for sha in shas {
            blobs.push(self.get_blob(*sha).await?);
        }
        Ok(blobs)
    }

    /// Apply a batch of changes and return the new tree digest.
    ///
    /// Fails with `ShaMismatch` when `batch.from_sha` is not the current
    /// tree digest.
    async fn apply_changes(&self, batch: &ChangesBatch) -> SourceResult<Digest>;
}

/// The authority side of the commit protocol.
///
/// Unlike [`Source::apply_changes`], `submit` accepts a request whose
/// `from_sha` has been overtaken, as long as every per-path check in the
/// request still holds. This is a narrow per-path optimistic lock: two
/// commits touching disjoint paths both succeed even when the base tree has
/// moved.
#[async_trait]
pub trait CommitAuthority: Send + Sync {
    /// Validate and apply a commit request, returning the resulting tree
    /// digest.
    async fn submit(&self, request: &CommitRequest) -> SourceResult<Digest>;
}

#[async_trait]
impl<T: Source + ?Sized> Source for std::sync::Arc<T> {
    async fn get_tree(&self) -> SourceResult<Tree> {
        (**self).get_tree().await
    }

    async fn get_tree_if_different(&self, sha: Digest) -> SourceResult<Option<Tree>> {
        (**self).get_tree_if_different(sha).await
    }

    async fn get_blob(&self, sha: Digest) -> SourceResult<Vec<u8>> {
        (**self).get_blob(sha).await
    }

    async fn get_blobs(&self, shas: &[Digest]) -> SourceResult<Vec<Vec<u8>>> {
        (**self).get_blobs(shas).await
    }

    async fn apply_changes(&self, batch: &ChangesBatch) -> SourceResult<Digest> {
        (**self).apply_changes(batch).await
    }
}

#[async_trait]
impl<T: CommitAuthority + ?Sized> CommitAuthority for std::sync::Arc<T> {
    async fn submit(&self, request: &CommitRequest) -> SourceResult<Digest> {
        (**self).submit(request).await
    }
}
