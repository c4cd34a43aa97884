//! The commit protocol: optimistic-concurrency validation of change sets.
//!
//! A commit either extends from the tree it claims to extend from, or it is
//! rejected/reconciled. Validation is a narrow per-path optimistic lock
//! rather than a whole-tree lock, so two commits touching disjoint paths
//! both succeed even when the base tree has moved between them.

use folio_object::{Change, ChangesBatch, Tree};
use folio_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SourceError, SourceResult};
use crate::memory::MemorySource;
use crate::traits::{CommitAuthority, Source};

/// A proposed set of changes, with the evidence needed to validate it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Human-readable description of the mutation.
    pub description: String,
    /// The tree digest the changes were computed against.
    pub from_sha: Digest,
    /// The tree digest the changes are expected to produce.
    pub into_sha: Digest,
    /// Per-path preconditions: each path must still carry the given digest
    /// when `from_sha` has been overtaken.
    pub checks: Vec<(String, Digest)>,
    /// The content changes, in application order.
    pub changes: Vec<Change>,
}

impl CommitRequest {
    /// The changes as a batch against the request's declared base.
    pub fn batch(&self) -> ChangesBatch {
        ChangesBatch::new(self.from_sha, self.changes.clone())
    }
}

/// Validate a commit request against the current tree.
///
/// Trivially compatible when the current digest equals the request's
/// `from_sha`. Otherwise every `(path, digest)` in the request's check list
/// must exist in the current tree with exactly that digest, or the commit
/// fails with [`SourceError::StaleEntry`] naming the first failing path.
pub fn check_commit(current: &Tree, request: &CommitRequest) -> SourceResult<()> {
    if current.sha() == request.from_sha {
        return Ok(());
    }
    for (path, expected) in &request.checks {
        match current.digest_at(path) {
            Some(actual) if actual == *expected => {}
            _ => {
                return Err(SourceError::StaleEntry { path: path.clone() });
            }
        }
    }
    Ok(())
}

/// Result of a commit attempt against a remote authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The remote produced exactly the declared target tree; local
    /// speculative state is confirmed.
    Committed { sha: Digest },
    /// The remote diverged (a concurrent writer won a race). Local state
    /// has been discarded and re-synced from the remote's authoritative
    /// tree. Never retried automatically; the caller recomputes.
    Conflicted { remote_sha: Digest },
}

/// Attempt a commit: apply speculatively to `local`, submit to the remote
/// authority, and reconcile.
///
/// Invariant: when this returns — success, conflict, or transport error —
/// local state has been re-synced with the remote authority. A caller-level
/// timeout that abandons the future mid-flight finds a consistent local
/// snapshot on its next re-sync.
pub async fn attempt_commit<R>(
    local: &MemorySource,
    remote: &R,
    request: &CommitRequest,
) -> SourceResult<CommitOutcome>
where
    R: Source + CommitAuthority,
{
    debug!(
        from = %request.from_sha.short_hex(),
        into = %request.into_sha.short_hex(),
        changes = request.changes.len(),
        description = %request.description,
        "attempting commit"
    );
    if let Err(err) = local.apply_changes(&request.batch()).await {
        // The re-sync is owed even when the speculative apply itself fails:
        // a caller whose local tree drifted from its request must still
        // converge on the authority before seeing the error.
        if let Err(resync_err) = resync(local, remote).await {
            warn!(error = %resync_err, "re-sync after failed local apply also failed");
        }
        return Err(err);
    }

    let submitted = remote.submit(request).await;
    match submitted {
        Ok(remote_sha) if remote_sha == request.into_sha => {
            // Local speculative state already equals the remote result.
            Ok(CommitOutcome::Committed { sha: remote_sha })
        }
        Ok(remote_sha) => {
            debug!(
                expected = %request.into_sha.short_hex(),
                actual = %remote_sha.short_hex(),
                "remote diverged, re-syncing local state"
            );
            resync(local, remote).await?;
            Ok(CommitOutcome::Conflicted { remote_sha })
        }
        Err(err) => {
            // Re-sync even on failure; surface the original error if the
            // re-sync itself also fails.
            if let Err(resync_err) = resync(local, remote).await {
                warn!(error = %resync_err, "re-sync after failed commit also failed");
            }
            Err(err)
        }
    }
}

/// Replace local state with the remote authority's tree, fetching any blobs
/// the local source does not hold.
pub async fn resync(local: &MemorySource, remote: &dyn Source) -> SourceResult<()> {
    let tree = remote.get_tree().await?;
    let missing = local.missing_blobs(&tree);
    let fetched = remote.get_blobs(&missing).await?;
    let blobs = missing.into_iter().zip(fetched).collect();
    local.restore(tree, blobs);
    Ok(())
}
