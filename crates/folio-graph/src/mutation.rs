//! Content mutations: the compiled form of graph operations.
//!
//! An operation compiles into a [`Task`]: a list of mutations plus the
//! per-path preconditions derived from the rows the operation read. Tasks
//! from several operations are flattened into one commit request.

use folio_object::{hash_object, Change, ObjectKind};
use folio_types::{Digest, EntryRow};

use crate::error::GraphResult;

/// One content mutation against the store.
#[derive(Clone, Debug)]
pub enum Mutation {
    /// Write (or overwrite) an entry row file.
    Put { row: EntryRow },
    /// Delete a file at a known digest.
    Remove { path: String, digest: Digest },
    /// Add a raw blob, used for media uploads.
    Upload { path: String, contents: Vec<u8> },
}

impl Mutation {
    /// Lower this mutation to a tree change.
    pub fn to_change(&self) -> GraphResult<Change> {
        match self {
            Mutation::Put { row } => {
                let contents = row_bytes(row)?;
                Ok(Change::Add {
                    path: row.file_path.clone(),
                    digest: hash_object(ObjectKind::Blob, &contents),
                    contents,
                })
            }
            Mutation::Remove { path, digest } => Ok(Change::Delete {
                path: path.clone(),
                digest: *digest,
            }),
            Mutation::Upload { path, contents } => Ok(Change::Add {
                path: path.clone(),
                digest: hash_object(ObjectKind::Blob, contents),
                contents: contents.clone(),
            }),
        }
    }
}

/// Serialized form of a row as stored in the content tree.
pub fn row_bytes(row: &EntryRow) -> GraphResult<Vec<u8>> {
    let mut stored = row.clone();
    stored.content_hash = stored.compute_content_hash();
    Ok(serde_json::to_vec_pretty(&stored)?)
}

/// The compiled form of one operation.
#[derive(Debug, Default)]
pub struct Task {
    /// Mutations, in application order.
    pub mutations: Vec<Mutation>,
    /// Per-path preconditions: the rows this operation read, pinned at the
    /// digest they had when read.
    pub checks: Vec<(String, Digest)>,
}

impl Task {
    /// Append another task's mutations and checks.
    pub fn extend(&mut self, other: Task) {
        self.mutations.extend(other.mutations);
        self.checks.extend(other.checks);
    }

    /// Lower all mutations to tree changes, in order.
    pub fn changes(&self) -> GraphResult<Vec<Change>> {
        self.mutations.iter().map(Mutation::to_change).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::EntryStatus;

    fn sample_row() -> EntryRow {
        EntryRow {
            id: "e1".to_string(),
            type_name: "Page".to_string(),
            workspace: "main".to_string(),
            root: "pages".to_string(),
            locale: None,
            status: EntryStatus::Draft,
            index: "a0".to_string(),
            parent: None,
            parent_chain: Vec::new(),
            segment: "e1".to_string(),
            file_path: "main/pages/e1.draft.json".to_string(),
            content_hash: Digest::null(),
            data: serde_json::json!({"title": "One"}),
        }
    }

    #[test]
    fn put_lowers_to_add_at_row_path() {
        let row = sample_row();
        let change = Mutation::Put { row: row.clone() }.to_change().unwrap();
        match change {
            Change::Add {
                path,
                digest,
                contents,
            } => {
                assert_eq!(path, row.file_path);
                assert_eq!(digest, hash_object(ObjectKind::Blob, &contents));
                let stored: EntryRow = serde_json::from_slice(&contents).unwrap();
                assert_eq!(stored.content_hash, stored.compute_content_hash());
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn stored_bytes_round_trip() {
        let row = sample_row();
        let bytes = row_bytes(&row).unwrap();
        let back: EntryRow = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.id, row.id);
        assert_eq!(back.data, row.data);
    }
}
