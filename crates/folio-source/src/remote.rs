//! Remote API-backed source.
//!
//! Fetches tree and blob state lazily over a transport, caching the
//! last-seen tree (and fetched blobs) so unchanged state is never
//! re-materialized. A transport-reported truncated tree listing is a fatal
//! [`SourceError::Unsupported`]: this source never operates on partial
//! data.

use std::collections::HashMap;

use async_trait::async_trait;
use folio_object::{ChangesBatch, Tree};
use folio_types::Digest;
use tracing::debug;

use crate::commit::CommitRequest;
use crate::error::{SourceError, SourceResult};
use crate::traits::{CommitAuthority, Source};

/// A flat tree listing as reported by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeListing {
    /// `(path, blob digest)` rows.
    pub rows: Vec<(String, Digest)>,
    /// Set when the server elided part of the listing. Folio treats this
    /// as unsupported rather than operating on partial data.
    pub truncated: bool,
}

/// Transport boundary for a remote content authority.
///
/// Any concrete transport (HTTP API, filesystem, database) implements
/// exactly this surface.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch the current tree listing.
    ///
    /// When `if_different_from` is given and the remote tree digest still
    /// equals it, the transport returns `Ok(None)` instead of re-sending
    /// the listing.
    async fn fetch_tree(
        &self,
        if_different_from: Option<Digest>,
    ) -> SourceResult<Option<TreeListing>>;

    /// Fetch blob contents by digest.
    async fn fetch_blobs(&self, shas: &[Digest]) -> SourceResult<Vec<(Digest, Vec<u8>)>>;

    /// Submit a commit request to the remote authority, returning the
    /// resulting tree digest.
    async fn commit(&self, request: &CommitRequest) -> SourceResult<Digest>;
}

#[derive(Default)]
struct RemoteCache {
    sha: Option<Digest>,
    tree: Option<Tree>,
    blobs: HashMap<Digest, Vec<u8>>,
}

/// A [`Source`] backed by a remote authority reached through a
/// [`RemoteApi`] transport.
pub struct RemoteSource<T> {
    api: T,
    cache: tokio::sync::RwLock<RemoteCache>,
}

impl<T: RemoteApi> RemoteSource<T> {
    /// Wrap a transport.
    pub fn new(api: T) -> Self {
        Self {
            api,
            cache: tokio::sync::RwLock::new(RemoteCache::default()),
        }
    }

    /// The last-seen remote tree digest, if any fetch has happened yet.
    pub async fn cached_sha(&self) -> Option<Digest> {
        self.cache.read().await.sha
    }
}

#[async_trait]
impl<T: RemoteApi> Source for RemoteSource<T> {
    async fn get_tree(&self) -> SourceResult<Tree> {
        let cached_sha = self.cache.read().await.sha;
        match self.api.fetch_tree(cached_sha).await? {
            Some(listing) => {
                if listing.truncated {
                    return Err(SourceError::Unsupported(
                        "remote returned a truncated tree listing".into(),
                    ));
                }
                let tree = Tree::from_index(listing.rows)?;
                let mut cache = self.cache.write().await;
                cache.sha = Some(tree.sha());
                cache.tree = Some(tree.clone());
                debug!(sha = %tree.sha().short_hex(), "remote tree refreshed");
                Ok(tree)
            }
            None => {
                let cache = self.cache.read().await;
                cache.tree.clone().ok_or_else(|| {
                    SourceError::Unsupported("remote omitted an uncached tree listing".into())
                })
            }
        }
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
        if let Some(contents) = self.cache.read().await.blobs.get(&sha) {
            return Ok(contents.clone());
        }
        let fetched = self.api.fetch_blobs(&[sha]).await?;
        let mut cache = self.cache.write().await;
        for (digest, contents) in fetched {
            cache.blobs.insert(digest, contents);
        }
        cache
            .blobs
            .get(&sha)
            .cloned()
            .ok_or(SourceError::BlobMissing(sha))
    }

    async fn get_blobs(&self, shas: &[Digest]) -> SourceResult<Vec<Vec<u8>>> {
        // Serve what we can from the cache, fetch the rest in one call.
        let missing: Vec<Digest> = {
            let cache = self.cache.read().await;
            shas.iter()
                .copied()
                .filter(|sha| !cache.blobs.contains_key(sha))
                .collect()
        };
        if !missing.is_empty() {
            let fetched = self.api.fetch_blobs(&missing).await?;
            let mut cache = self.cache.write().await;
            for (digest, contents) in fetched {
                cache.blobs.insert(digest, contents);
            }
        }
        let cache = self.cache.read().await;
        shas.iter()
            .map(|sha| {
                cache
                    .blobs
                    .get(sha)
                    .cloned()
                    .ok_or(SourceError::BlobMissing(*sha))
            })
            .collect()
    }

    async fn apply_changes(&self, batch: &ChangesBatch) -> SourceResult<Digest> {
        let request = CommitRequest {
            description: String::new(),
            from_sha: batch.from_sha,
            into_sha: Digest::null(),
            checks: Vec::new(),
            changes: batch.changes.clone(),
        };
        self.submit(&request).await
    }
}

#[async_trait]
impl<T: RemoteApi> CommitAuthority for RemoteSource<T> {
    async fn submit(&self, request: &CommitRequest) -> SourceResult<Digest> {
        let sha = self.api.commit(request).await?;
        // The remote moved; drop the cached tree so the next read refetches.
        let mut cache = self.cache.write().await;
        cache.sha = None;
        cache.tree = None;
        debug!(sha = %sha.short_hex(), "remote commit accepted");
        Ok(sha)
    }
}
