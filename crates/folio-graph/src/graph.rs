//! The writeable graph: a local snapshot of a remote authority plus the
//! commit driver that pushes operations through the optimistic-concurrency
//! protocol.
//!
//! A [`Graph`] owns a local speculative source, the current tree, and the
//! entry index derived from it. Operations compile against the snapshot;
//! [`Graph::commit`] flattens them into one commit request and drives it
//! through [`attempt_commit`], so the local snapshot always matches the
//! remote authority when a commit call returns, whatever its outcome.

use folio_index::{EntryIndex, EntryQuery, QueryPlan};
use folio_object::{ChangesBatch, Tree};
use folio_source::{
    attempt_commit, resync, CommitAuthority, CommitOutcome, CommitRequest, MemorySource, Source,
};
use folio_types::{Digest, EntryRow, EntryStatus};
use tracing::debug;

use crate::error::GraphResult;
use crate::mutation::{Mutation, Task};
use crate::op::Op;
use crate::schema::Schema;

/// A writeable view over a remote content authority.
pub struct Graph<R: Source + CommitAuthority> {
    schema: Schema,
    local: MemorySource,
    remote: R,
    tree: Tree,
    index: EntryIndex,
}

impl<R: Source + CommitAuthority> Graph<R> {
    /// Open a graph over a remote authority, syncing its current state.
    pub async fn open(schema: Schema, remote: R) -> GraphResult<Self> {
        let local = MemorySource::new();
        resync(&local, &remote).await?;
        let tree = local.get_tree().await?;
        let rows = load_rows(&local, &tree).await?;
        Ok(Self {
            schema,
            local,
            remote,
            tree,
            index: EntryIndex::build(rows),
        })
    }

    /// The schema this graph validates against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The entry index over the current snapshot.
    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    /// The current tree digest.
    pub fn sha(&self) -> Digest {
        self.tree.sha()
    }

    /// The current content tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Resolve a query into a plan over the current snapshot.
    pub fn plan(&self, query: EntryQuery) -> QueryPlan {
        query.plan(&self.index)
    }

    /// All rows of a node, in snapshot order.
    pub fn rows_of(&self, id: &str) -> Vec<&EntryRow> {
        self.index
            .get(id)
            .iter()
            .map(|row| self.index.row(*row))
            .collect()
    }

    /// The row of a node at a specific locale and status, if present.
    pub fn row_of(&self, id: &str, locale: Option<&str>, status: EntryStatus) -> Option<&EntryRow> {
        self.index
            .get(id)
            .iter()
            .map(|row| self.index.row(*row))
            .find(|row| row.locale.as_deref() == locale && row.status == status)
    }

    /// Any row of a node, preferring snapshot order.
    pub(crate) fn head_row(&self, id: &str) -> GraphResult<&EntryRow> {
        self.index
            .get(id)
            .first()
            .map(|row| self.index.row(*row))
            .ok_or_else(|| crate::error::GraphError::UnknownEntry(id.to_string()))
    }

    /// Rows of every descendant of a node, in snapshot order.
    pub(crate) fn descendant_rows(&self, id: &str) -> Vec<&EntryRow> {
        self.index
            .rows()
            .iter()
            .filter(|row| row.parent_chain.iter().any(|a| a == id))
            .collect()
    }

    /// Pin a row's current file at its current digest.
    pub(crate) fn pin(&self, row: &EntryRow) -> Option<(String, Digest)> {
        self.tree
            .blob_digest(&row.file_path)
            .map(|digest| (row.file_path.clone(), digest))
    }

    /// A removal mutation for a row's current file, when it exists.
    pub(crate) fn removal(&self, row: &EntryRow) -> Option<Mutation> {
        self.tree.blob_digest(&row.file_path).map(|digest| Mutation::Remove {
            path: row.file_path.clone(),
            digest,
        })
    }

    /// Distinct order keys of the siblings at a position, sorted ascending.
    /// Rows of `exclude` are left out, for reordering an existing node.
    pub(crate) fn sibling_keys(
        &self,
        workspace: &str,
        root: &str,
        parent: Option<&str>,
        exclude: Option<&str>,
    ) -> Vec<String> {
        let rows: Vec<&EntryRow> = match parent {
            Some(parent) => self
                .index
                .children_of(parent)
                .iter()
                .map(|row| self.index.row(*row))
                .collect(),
            None => self
                .index
                .rows()
                .iter()
                .filter(|row| {
                    row.parent.is_none() && row.workspace == workspace && row.root == root
                })
                .collect(),
        };
        let mut keys: Vec<String> = rows
            .into_iter()
            .filter(|row| Some(row.id.as_str()) != exclude)
            .map(|row| row.index.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// The order key of a node.
    pub(crate) fn order_key_of(&self, id: &str) -> GraphResult<String> {
        Ok(self.head_row(id)?.index.clone())
    }

    /// The segment of a node, resolved from any of its rows.
    fn segment_of(&self, id: &str) -> GraphResult<String> {
        Ok(self.head_row(id)?.segment.clone())
    }

    /// Compute the file path of an entry row within the content tree.
    ///
    /// Layout: `{workspace}/{root}[/{locale}]/{ancestor segments}/{name}`,
    /// where the name carries a `.draft` or `.archived` infix for
    /// non-published rows.
    pub(crate) fn entry_file_path(
        &self,
        workspace: &str,
        root: &str,
        locale: Option<&str>,
        parent_chain: &[String],
        segment: &str,
        status: EntryStatus,
    ) -> GraphResult<String> {
        let mut parts = vec![workspace.to_string(), root.to_string()];
        if let Some(locale) = locale {
            parts.push(locale.to_string());
        }
        for ancestor in parent_chain {
            parts.push(self.segment_of(ancestor)?);
        }
        parts.push(match status {
            EntryStatus::Published => format!("{segment}.json"),
            EntryStatus::Draft => format!("{segment}.draft.json"),
            EntryStatus::Archived => format!("{segment}.archived.json"),
        });
        Ok(parts.join("/"))
    }

    /// Content-addressed path of an uploaded media file.
    pub(crate) fn media_path(&self, workspace: &str, filename: &str, digest: Digest) -> String {
        format!("{workspace}/media/{}/{filename}", digest.to_hex())
    }

    /// Compile the given operations and drive them through the commit
    /// protocol as one request.
    ///
    /// When this returns — committed, conflicted, or failed — the graph's
    /// snapshot matches the remote authority. A compile-time rejection
    /// (unknown entry, `contains` violation) returns before any state is
    /// touched.
    pub async fn commit(&mut self, description: &str, ops: &[Op]) -> GraphResult<CommitOutcome> {
        let mut task = Task::default();
        for op in ops {
            task.extend(op.task(self)?);
        }
        let changes = task.changes()?;
        let from_sha = self.tree.sha();
        let next = self
            .tree
            .with_changes(&ChangesBatch::new(from_sha, changes.clone()))?;
        let mut checks = task.checks;
        checks.sort();
        checks.dedup();

        let request = CommitRequest {
            description: description.to_string(),
            from_sha,
            into_sha: next.sha(),
            checks,
            changes,
        };
        debug!(
            description = %request.description,
            ops = ops.len(),
            changes = request.changes.len(),
            "committing graph operations"
        );
        let result = attempt_commit(&self.local, &self.remote, &request).await;
        self.reload().await?;
        Ok(result?)
    }

    /// Pull remote changes, if any, and rebuild the snapshot.
    pub async fn refresh(&mut self) -> GraphResult<()> {
        if self
            .remote
            .get_tree_if_different(self.tree.sha())
            .await?
            .is_some()
        {
            debug!(sha = %self.tree.sha().short_hex(), "remote moved, re-syncing");
            resync(&self.local, &self.remote).await?;
        }
        self.reload().await
    }

    /// Rebuild the tree and index from the local source.
    async fn reload(&mut self) -> GraphResult<()> {
        self.tree = self.local.get_tree().await?;
        let rows = load_rows(&self.local, &self.tree).await?;
        self.index = EntryIndex::build(rows);
        Ok(())
    }
}

/// Returns `true` for tree paths that hold serialized entry rows.
fn is_entry_file(path: &str) -> bool {
    path.ends_with(".json") && path.split('/').nth(1) != Some("media")
}

/// Load and decode every entry row reachable from a tree.
async fn load_rows(source: &MemorySource, tree: &Tree) -> GraphResult<Vec<EntryRow>> {
    let mut rows = Vec::new();
    for (path, digest) in tree.index() {
        if !is_entry_file(&path) {
            continue;
        }
        let bytes = source.get_blob(digest).await?;
        rows.push(serde_json::from_slice(&bytes)?);
    }
    Ok(rows)
}
