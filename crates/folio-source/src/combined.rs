//! Namespaced composition of several sources into one tree.
//!
//! Each member source is mounted under a top-level path prefix
//! (`name/...`). Routing is strictly by first path segment: the namespace
//! table always wins, so a member source never sees its mount name as a
//! file, even if it happens to contain a top-level entry of the same name.
//!
//! `get_tree()` only rebuilds the namespaces whose digest actually changed
//! since the last call (cached per-member digest), then recomposes the top
//! tree — one changed member does not cost O(total size) work.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use folio_object::{Change, ChangesBatch, Tree};
use folio_types::Digest;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::traits::Source;

struct MemberCache {
    sha: Digest,
    tree: Tree,
}

/// A [`Source`] that presents N independent sources as one tree, each under
/// a top-level namespace.
pub struct CombinedSource {
    members: Vec<(String, Arc<dyn Source>)>,
    cache: tokio::sync::RwLock<HashMap<String, MemberCache>>,
}

impl CombinedSource {
    /// Compose member sources. Namespace names must be non-empty and must
    /// not contain a path separator.
    pub fn new(members: Vec<(String, Arc<dyn Source>)>) -> SourceResult<Self> {
        for (name, _) in &members {
            if name.is_empty() || name.contains('/') {
                return Err(SourceError::InvalidPath(format!(
                    "invalid namespace name: {name:?}"
                )));
            }
        }
        Ok(Self {
            members,
            cache: tokio::sync::RwLock::new(HashMap::new()),
        })
    }

    /// The mounted namespace names, in mount order.
    pub fn namespaces(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Current tree of one member, refreshing the cache only when the
    /// member's digest moved.
    async fn member_tree(&self, name: &str, source: &Arc<dyn Source>) -> SourceResult<Tree> {
        // Digest and tree are captured under one lock acquisition, so an
        // "unchanged" answer always returns the tree that digest belongs to,
        // even when `apply_changes` evicts the entry mid-poll.
        let cached = {
            let cache = self.cache.read().await;
            cache.get(name).map(|c| (c.sha, c.tree.clone()))
        };
        match cached {
            Some((sha, tree)) => match source.get_tree_if_different(sha).await? {
                None => Ok(tree),
                Some(fresh) => {
                    debug!(namespace = name, sha = %fresh.sha().short_hex(), "namespace refreshed");
                    self.store_member(name, &fresh).await;
                    Ok(fresh)
                }
            },
            None => {
                let fresh = source.get_tree().await?;
                self.store_member(name, &fresh).await;
                Ok(fresh)
            }
        }
    }

    async fn store_member(&self, name: &str, tree: &Tree) {
        let mut cache = self.cache.write().await;
        cache.insert(
            name.to_string(),
            MemberCache {
                sha: tree.sha(),
                tree: tree.clone(),
            },
        );
    }

    /// Split a batch's changes per namespace, stripping the prefix.
    ///
    /// A change whose path has no separator targets a namespace root
    /// directly and is rejected as invalid.
    fn route(&self, changes: &[Change]) -> SourceResult<Vec<(usize, Vec<Change>)>> {
        let mut routed: Vec<(usize, Vec<Change>)> = Vec::new();
        for change in changes {
            let path = change.path();
            let (namespace, rest) = path.split_once('/').ok_or_else(|| {
                SourceError::InvalidPath(format!("change targets a namespace root: {path}"))
            })?;
            let index = self
                .members
                .iter()
                .position(|(name, _)| name == namespace)
                .ok_or_else(|| SourceError::UnknownNamespace(namespace.to_string()))?;

            let stripped = match change {
                Change::Add {
                    digest, contents, ..
                } => Change::Add {
                    path: rest.to_string(),
                    digest: *digest,
                    contents: contents.clone(),
                },
                Change::Delete { digest, .. } => Change::Delete {
                    path: rest.to_string(),
                    digest: *digest,
                },
            };
            match routed.iter_mut().find(|(i, _)| *i == index) {
                Some((_, member_changes)) => member_changes.push(stripped),
                None => routed.push((index, vec![stripped])),
            }
        }
        Ok(routed)
    }
}

#[async_trait]
impl Source for CombinedSource {
    async fn get_tree(&self) -> SourceResult<Tree> {
        let mut top = Tree::empty();
        for (name, source) in &self.members {
            let tree = self.member_tree(name, source).await?;
            top.mount(name.clone(), tree);
        }
        Ok(top)
    }

    async fn get_tree_if_different(&self, sha: Digest) -> SourceResult<Option<Tree>> {
        let tree = self.get_tree().await?;
        if tree.sha() == sha {
            Ok(None)
        } else {
            Ok(Some(tree))
        }
    }

    async fn get_blob(&self, sha: Digest) -> SourceResult<Vec<u8>> {
        for (_, source) in &self.members {
            match source.get_blob(sha).await {
                Ok(contents) => return Ok(contents),
                Err(SourceError::BlobMissing(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(SourceError::BlobMissing(sha))
    }

    async fn apply_changes(&self, batch: &ChangesBatch) -> SourceResult<Digest> {
        let current = self.get_tree().await?;
        let actual = current.sha();
        if batch.from_sha != actual {
            return Err(SourceError::ShaMismatch {
                expected: batch.from_sha,
                actual,
            });
        }

        let routed = self.route(&batch.changes)?;
        for (index, changes) in routed {
            let (name, source) = &self.members[index];
            let member_sha = {
                let cache = self.cache.read().await;
                cache
                    .get(name)
                    .map(|c| c.sha)
                    .unwrap_or_else(|| Tree::empty().sha())
            };
            let member_batch = ChangesBatch::new(member_sha, changes);
            source.apply_changes(&member_batch).await?;
            // Invalidate this member only; untouched namespaces keep their
            // cached digest.
            self.cache.write().await.remove(name.as_str());
        }

        Ok(self.get_tree().await?.sha())
    }
}
