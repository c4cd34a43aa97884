//! In-memory source: a tree and a blob map behind a `RwLock`.
//!
//! Intended for tests, local speculative state, and embedding. The lock is
//! never held across an await point; all mutation happens synchronously
//! inside `apply_changes`, which makes the compare-and-swap check atomic
//! with respect to a single in-process caller.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use folio_object::{Change, ChangesBatch, Tree};
use folio_types::Digest;

use crate::commit::{check_commit, CommitRequest};
use crate::error::{SourceError, SourceResult};
use crate::traits::{CommitAuthority, Source};

struct MemoryState {
    tree: Tree,
    blobs: HashMap<Digest, Vec<u8>>,
}

/// An in-memory implementation of [`Source`].
///
/// Holds the current tree and all blob contents. Data is lost when the
/// source is dropped.
pub struct MemorySource {
    state: RwLock<MemoryState>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                tree: Tree::empty(),
                blobs: HashMap::new(),
            }),
        }
    }

    /// Create a source from an existing tree and blob map.
    pub fn with_contents(tree: Tree, blobs: HashMap<Digest, Vec<u8>>) -> Self {
        Self {
            state: RwLock::new(MemoryState { tree, blobs }),
        }
    }

    /// The current tree digest.
    pub fn sha(&self) -> Digest {
        self.state.read().expect("lock poisoned").tree.sha()
    }

    /// Number of blobs currently held.
    pub fn blob_count(&self) -> usize {
        self.state.read().expect("lock poisoned").blobs.len()
    }

    /// Blob digests referenced by `tree` that this source does not hold.
    pub fn missing_blobs(&self, tree: &Tree) -> Vec<Digest> {
        let state = self.state.read().expect("lock poisoned");
        tree.index()
            .into_iter()
            .map(|(_, digest)| digest)
            .filter(|digest| !state.blobs.contains_key(digest))
            .collect()
    }

    /// Overwrite local state with an authoritative tree plus the blobs
    /// backing it. Used by the commit protocol's re-sync step; existing
    /// blobs are kept (content addressing makes them still valid).
    pub fn restore(&self, tree: Tree, blobs: Vec<(Digest, Vec<u8>)>) {
        let mut state = self.state.write().expect("lock poisoned");
        for (digest, contents) in blobs {
            state.blobs.insert(digest, contents);
        }
        state.tree = tree;
    }

    fn apply_locked(state: &mut MemoryState, batch: &ChangesBatch) -> SourceResult<Digest> {
        let next = state.tree.with_changes(batch)?;
        for change in &batch.changes {
            if let Change::Add {
                digest, contents, ..
            } = change
            {
                state.blobs.insert(*digest, contents.clone());
            }
        }
        state.tree = next;
        Ok(state.tree.sha())
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("MemorySource")
            .field("sha", &state.tree.sha())
            .field("blobs", &state.blobs.len())
            .finish()
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn get_tree(&self) -> SourceResult<Tree> {
        Ok(self.state.read().expect("lock poisoned").tree.clone())
    }

    async fn get_tree_if_different(&self, sha: Digest) -> SourceResult<Option<Tree>> {
        let state = self.state.read().expect("lock poisoned");
        if state.tree.sha() == sha {
            Ok(None)
        } else {
            Ok(Some(state.tree.clone()))
        }
    }

    async fn get_blob(&self, sha: Digest) -> SourceResult<Vec<u8>> {
        let state = self.state.read().expect("lock poisoned");
        state
            .blobs
            .get(&sha)
            .cloned()
            .ok_or(SourceError::BlobMissing(sha))
    }

    async fn apply_changes(&self, batch: &ChangesBatch) -> SourceResult<Digest> {
        let mut state = self.state.write().expect("lock poisoned");
        let actual = state.tree.sha();
        if batch.from_sha != actual {
            return Err(SourceError::ShaMismatch {
                expected: batch.from_sha,
                actual,
            });
        }
        Self::apply_locked(&mut state, batch)
    }
}

#[async_trait]
impl CommitAuthority for MemorySource {
    async fn submit(&self, request: &CommitRequest) -> SourceResult<Digest> {
        let mut state = self.state.write().expect("lock poisoned");
        check_commit(&state.tree, request)?;
        // Rebase onto the current tree: check_commit has established the
        // request is compatible with it.
        let batch = ChangesBatch::new(state.tree.sha(), request.changes.clone());
        Self::apply_locked(&mut state, &batch)
    }
}
