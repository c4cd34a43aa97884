//! In-memory nested tree with structural content addressing.
//!
//! A [`Tree`] maps names to blob digests or subtrees. Its digest is computed
//! over the canonical serialized form, so two trees with identical subtrees
//! share the subtree digest (structural sharing). Trees are value types:
//! applying changes produces a new tree, the original is never mutated.

use std::collections::BTreeMap;

use folio_types::Digest;

use crate::changes::{validate_path, Change, ChangesBatch};
use crate::codec::{serialize_tree, FileMode, TreeRecord};
use crate::error::{ObjectError, ObjectResult};
use crate::hash::{hash_object, ObjectKind};

/// A node in a tree: either a blob reference or a subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// A blob, referenced by content digest.
    Blob(Digest),
    /// A nested subtree.
    Tree(Tree),
}

/// An immutable directory tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, Node>,
}

impl Tree {
    /// Create an empty tree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, blob digest)` pairs.
    pub fn from_index<I>(index: I) -> ObjectResult<Self>
    where
        I: IntoIterator<Item = (String, Digest)>,
    {
        let mut tree = Self::empty();
        for (path, digest) in index {
            tree.insert_blob(&path, digest)?;
        }
        Ok(tree)
    }

    /// Number of direct entries in this tree level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if this tree level has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct entries of this tree level, in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Look up a node by slash-separated path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split('/');
        let mut node = self.entries.get(segments.next()?)?;
        for segment in segments {
            match node {
                Node::Tree(subtree) => node = subtree.entries.get(segment)?,
                // A blob can only be the last segment; a longer path
                // through it does not resolve.
                Node::Blob(_) => return None,
            }
        }
        Some(node)
    }

    /// Look up the blob digest at a path, if the path resolves to a blob.
    pub fn blob_digest(&self, path: &str) -> Option<Digest> {
        match self.get(path) {
            Some(Node::Blob(digest)) => Some(*digest),
            _ => None,
        }
    }

    /// The digest of the subtree or blob at `path`, if present.
    pub fn digest_at(&self, path: &str) -> Option<Digest> {
        match self.get(path)? {
            Node::Blob(digest) => Some(*digest),
            Node::Tree(subtree) => Some(subtree.sha()),
        }
    }

    /// Returns `true` if a node exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Mount a subtree at a top-level name, replacing any existing node.
    pub fn mount(&mut self, name: impl Into<String>, subtree: Tree) {
        self.entries.insert(name.into(), Node::Tree(subtree));
    }

    /// Remove a top-level mount. Returns `true` if it existed.
    pub fn unmount(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// The canonical serialized form of this tree level.
    pub fn to_bytes(&self) -> Vec<u8> {
        serialize_tree(&self.records())
    }

    /// The content digest of this tree.
    ///
    /// Computed bottom-up over the canonical serialization. Identical
    /// subtrees always yield identical digests.
    pub fn sha(&self) -> Digest {
        hash_object(ObjectKind::Tree, &self.to_bytes())
    }

    /// The tree records for this level, with subtree digests computed.
    pub fn records(&self) -> Vec<TreeRecord> {
        self.entries
            .iter()
            .map(|(name, node)| match node {
                Node::Blob(digest) => TreeRecord::new(FileMode::Blob, name.clone(), *digest),
                Node::Tree(subtree) => {
                    TreeRecord::new(FileMode::Tree, name.clone(), subtree.sha())
                }
            })
            .collect()
    }

    /// Flatten to `(path, blob digest)` rows, in path order.
    pub fn index(&self) -> Vec<(String, Digest)> {
        let mut rows = Vec::new();
        self.collect_index("", &mut rows);
        rows
    }

    fn collect_index(&self, prefix: &str, rows: &mut Vec<(String, Digest)>) {
        for (name, node) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match node {
                Node::Blob(digest) => rows.push((path, *digest)),
                Node::Tree(subtree) => subtree.collect_index(&path, rows),
            }
        }
    }

    /// Insert a blob at a slash-separated path, creating intermediate
    /// subtrees as needed. Replaces any existing node at the path.
    pub fn insert_blob(&mut self, path: &str, digest: Digest) -> ObjectResult<()> {
        validate_path(path)?;
        let segments: Vec<&str> = path.split('/').collect();
        let mut current = self;
        for segment in &segments[..segments.len() - 1] {
            let node = current
                .entries
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Tree(Tree::empty()));
            // A blob in the middle of the path is replaced by a subtree:
            // the add declared the full path, so the add wins.
            if matches!(node, Node::Blob(_)) {
                *node = Node::Tree(Tree::empty());
            }
            match node {
                Node::Tree(subtree) => current = subtree,
                Node::Blob(_) => unreachable!("blob replaced above"),
            }
        }
        current
            .entries
            .insert(segments[segments.len() - 1].to_string(), Node::Blob(digest));
        Ok(())
    }

    /// Remove the node at a path, pruning subtrees left empty.
    ///
    /// Returns `true` if a node was removed. Removing a missing path is a
    /// no-op (the batch-level compare-and-swap already guards staleness).
    pub fn remove(&mut self, path: &str) -> ObjectResult<bool> {
        validate_path(path)?;
        let segments: Vec<&str> = path.split('/').collect();
        Ok(Self::remove_segments(&mut self.entries, &segments))
    }

    fn remove_segments(entries: &mut BTreeMap<String, Node>, segments: &[&str]) -> bool {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => return false,
        };
        if rest.is_empty() {
            return entries.remove(*head).is_some();
        }
        let removed = match entries.get_mut(*head) {
            Some(Node::Tree(subtree)) => Self::remove_segments(&mut subtree.entries, rest),
            _ => false,
        };
        if removed {
            // Prune: the serialized format cannot represent empty directories.
            if let Some(Node::Tree(subtree)) = entries.get(*head) {
                if subtree.is_empty() {
                    entries.remove(*head);
                }
            }
        }
        removed
    }

    /// Apply a batch of changes, producing a new tree.
    ///
    /// Changes apply in order. The `from_sha` guard is the caller's concern
    /// (sources check it before calling here).
    pub fn with_changes(&self, batch: &ChangesBatch) -> ObjectResult<Tree> {
        let mut next = self.clone();
        for change in &batch.changes {
            match change {
                Change::Add { path, digest, .. } => next.insert_blob(path, *digest)?,
                Change::Delete { path, .. } => {
                    next.remove(path)?;
                }
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(data: &[u8]) -> Digest {
        hash_object(ObjectKind::Blob, data)
    }

    fn sample_tree() -> Tree {
        Tree::from_index(vec![
            ("docs/readme.md".to_string(), blob(b"readme")),
            ("docs/guide/intro.md".to_string(), blob(b"intro")),
            ("index.json".to_string(), blob(b"{}")),
        ])
        .unwrap()
    }

    #[test]
    fn from_index_builds_nested_structure() {
        let tree = sample_tree();
        assert!(matches!(tree.get("docs"), Some(Node::Tree(_))));
        assert!(matches!(tree.get("docs/readme.md"), Some(Node::Blob(_))));
        assert!(matches!(
            tree.get("docs/guide/intro.md"),
            Some(Node::Blob(_))
        ));
        assert!(tree.get("missing").is_none());
        assert!(tree.get("index.json/through-blob").is_none());
    }

    #[test]
    fn index_roundtrips() {
        let tree = sample_tree();
        let index = tree.index();
        let rebuilt = Tree::from_index(index.clone()).unwrap();
        assert_eq!(tree.sha(), rebuilt.sha());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn identical_subtrees_share_digest() {
        let a = Tree::from_index(vec![("sub/file.txt".to_string(), blob(b"shared"))]).unwrap();
        let b = Tree::from_index(vec![
            ("sub/file.txt".to_string(), blob(b"shared")),
            ("other.txt".to_string(), blob(b"extra")),
        ])
        .unwrap();
        assert_eq!(a.digest_at("sub"), b.digest_at("sub"));
        assert_ne!(a.sha(), b.sha());
    }

    #[test]
    fn insertion_order_does_not_affect_sha() {
        let a = Tree::from_index(vec![
            ("x.txt".to_string(), blob(b"x")),
            ("a/b.txt".to_string(), blob(b"b")),
        ])
        .unwrap();
        let b = Tree::from_index(vec![
            ("a/b.txt".to_string(), blob(b"b")),
            ("x.txt".to_string(), blob(b"x")),
        ])
        .unwrap();
        assert_eq!(a.sha(), b.sha());
    }

    #[test]
    fn with_changes_applies_in_order() {
        let tree = sample_tree();
        let replacement = blob(b"v2");
        let batch = ChangesBatch::new(
            tree.sha(),
            vec![
                Change::Delete {
                    path: "docs/readme.md".into(),
                    digest: blob(b"readme"),
                },
                Change::Add {
                    path: "docs/readme.md".into(),
                    digest: replacement,
                    contents: b"v2".to_vec(),
                },
            ],
        );
        let next = tree.with_changes(&batch).unwrap();
        // Delete-then-add to the same path: the add wins.
        assert_eq!(next.blob_digest("docs/readme.md"), Some(replacement));
    }

    #[test]
    fn with_changes_does_not_mutate_original() {
        let tree = sample_tree();
        let before = tree.sha();
        let batch = ChangesBatch::new(
            before,
            vec![Change::Delete {
                path: "index.json".into(),
                digest: blob(b"{}"),
            }],
        );
        let next = tree.with_changes(&batch).unwrap();
        assert_eq!(tree.sha(), before);
        assert_ne!(next.sha(), before);
        assert!(!next.contains("index.json"));
    }

    #[test]
    fn remove_prunes_empty_directories() {
        let mut tree = Tree::from_index(vec![(
            "deep/nested/only.txt".to_string(),
            blob(b"only"),
        )])
        .unwrap();
        assert!(tree.remove("deep/nested/only.txt").unwrap());
        assert!(!tree.contains("deep"));
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut tree = sample_tree();
        let before = tree.sha();
        assert!(!tree.remove("no/such/path.txt").unwrap());
        assert_eq!(tree.sha(), before);
    }

    #[test]
    fn mount_and_unmount() {
        let mut top = Tree::empty();
        let member = Tree::from_index(vec![("x.txt".to_string(), blob(b"x"))]).unwrap();
        top.mount("data", member.clone());
        assert_eq!(top.digest_at("data"), Some(member.sha()));
        assert!(top.unmount("data"));
        assert!(top.is_empty());
    }

    #[test]
    fn empty_tree_sha_is_stable() {
        // The empty-tree digest well known from standard tooling.
        assert_eq!(
            Tree::empty().sha().to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }
}
