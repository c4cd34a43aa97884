//! The binary tree-object codec.
//!
//! Wire format, per entry: `mode SP name NUL digest20`, entries sorted by
//! name with directory names compared as `name + "/"`. Serialization always
//! sorts before digesting, so two logically-identical trees hash identically
//! regardless of insertion order. Parsing is the exact inverse; any
//! malformed record is a fatal format error.

use folio_types::Digest;

use crate::error::{ObjectError, ObjectResult};

/// Mode of a tree record: what kind of object the digest references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// A blob entry (wire mode `100644`).
    Blob,
    /// A subtree entry (wire mode `40000`; the leading zero of `040000`
    /// is stripped on the wire).
    Tree,
}

impl FileMode {
    /// The ascii wire form of this mode.
    pub fn wire(&self) -> &'static str {
        match self {
            Self::Blob => "100644",
            Self::Tree => "40000",
        }
    }

    /// Parse a wire mode string.
    pub fn from_wire(s: &str) -> ObjectResult<Self> {
        match s {
            "100644" => Ok(Self::Blob),
            "40000" => Ok(Self::Tree),
            other => Err(ObjectError::UnknownMode(other.to_string())),
        }
    }

    /// Returns `true` for subtree records.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

/// A single record in a serialized tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRecord {
    /// Whether the referenced object is a blob or a subtree.
    pub mode: FileMode,
    /// Entry name within the directory.
    pub name: String,
    /// Digest of the referenced object.
    pub digest: Digest,
}

impl TreeRecord {
    /// Create a new tree record.
    pub fn new(mode: FileMode, name: impl Into<String>, digest: Digest) -> Self {
        Self {
            mode,
            name: name.into(),
            digest,
        }
    }

    /// The canonical sort key: directories compare as `name + "/"`.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// Serialize tree records to the binary tree-object form.
///
/// Records are sorted canonically first; callers may pass them in any order.
pub fn serialize_tree(records: &[TreeRecord]) -> Vec<u8> {
    let mut sorted: Vec<&TreeRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.sort_key());

    let mut out = Vec::new();
    for record in sorted {
        out.extend_from_slice(record.mode.wire().as_bytes());
        out.push(b' ');
        out.extend_from_slice(record.name.as_bytes());
        out.push(0);
        out.extend_from_slice(record.digest.as_bytes());
    }
    out
}

/// Parse binary tree-object bytes back into records.
///
/// The exact inverse of [`serialize_tree`]. A record with a missing space,
/// missing NUL, truncated digest, non-utf8 name, or unknown mode is a fatal
/// [`ObjectError::MalformedTree`] / [`ObjectError::UnknownMode`].
pub fn parse_tree(bytes: &[u8]) -> ObjectResult<Vec<TreeRecord>> {
    let mut records = Vec::new();
    let mut rest = bytes;

    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| ObjectError::MalformedTree("record without mode separator".into()))?;
        let mode_str = std::str::from_utf8(&rest[..space])
            .map_err(|_| ObjectError::MalformedTree("non-ascii mode".into()))?;
        let mode = FileMode::from_wire(mode_str)?;
        rest = &rest[space + 1..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ObjectError::MalformedTree("record without name terminator".into()))?;
        let name = std::str::from_utf8(&rest[..nul])
            .map_err(|_| ObjectError::MalformedTree("non-utf8 entry name".into()))?
            .to_string();
        if name.is_empty() {
            return Err(ObjectError::MalformedTree("empty entry name".into()));
        }
        rest = &rest[nul + 1..];

        if rest.len() < Digest::LEN {
            return Err(ObjectError::MalformedTree(format!(
                "truncated digest for entry {name}: {} of {} bytes",
                rest.len(),
                Digest::LEN
            )));
        }
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&rest[..Digest::LEN]);
        rest = &rest[Digest::LEN..];

        records.push(TreeRecord::new(mode, name, Digest::from_raw(raw)));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(mode: FileMode, name: &str, seed: u8) -> TreeRecord {
        TreeRecord::new(mode, name, Digest::from_raw([seed; 20]))
    }

    #[test]
    fn roundtrip_preserves_records() {
        let records = vec![
            record(FileMode::Blob, "readme.md", 1),
            record(FileMode::Tree, "pages", 2),
            record(FileMode::Blob, "index.json", 3),
        ];
        let bytes = serialize_tree(&records);
        let parsed = parse_tree(&bytes).unwrap();
        assert_eq!(parsed.len(), 3);
        for r in &records {
            assert!(parsed.contains(r));
        }
    }

    #[test]
    fn serialization_is_order_independent() {
        let a = vec![
            record(FileMode::Blob, "b.txt", 1),
            record(FileMode::Blob, "a.txt", 2),
        ];
        let b = vec![
            record(FileMode::Blob, "a.txt", 2),
            record(FileMode::Blob, "b.txt", 1),
        ];
        assert_eq!(serialize_tree(&a), serialize_tree(&b));
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        // "foo.txt" < "foo/" in byte order, so the blob sorts first even
        // though "foo" < "foo.txt" as plain strings.
        let records = vec![
            record(FileMode::Tree, "foo", 1),
            record(FileMode::Blob, "foo.txt", 2),
        ];
        let parsed = parse_tree(&serialize_tree(&records)).unwrap();
        assert_eq!(parsed[0].name, "foo.txt");
        assert_eq!(parsed[1].name, "foo");
    }

    #[test]
    fn parse_rejects_truncated_digest() {
        let mut bytes = serialize_tree(&[record(FileMode::Blob, "a", 1)]);
        bytes.truncate(bytes.len() - 1);
        let err = parse_tree(&bytes).unwrap_err();
        assert!(matches!(err, ObjectError::MalformedTree(_)));
    }

    #[test]
    fn parse_rejects_unknown_mode() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"120000 link\0");
        bytes.extend_from_slice(&[0u8; 20]);
        let err = parse_tree(&bytes).unwrap_err();
        assert_eq!(err, ObjectError::UnknownMode("120000".to_string()));
    }

    #[test]
    fn parse_rejects_missing_separators() {
        assert!(matches!(
            parse_tree(b"100644-no-space"),
            Err(ObjectError::MalformedTree(_))
        ));
        assert!(matches!(
            parse_tree(b"100644 name-without-nul"),
            Err(ObjectError::MalformedTree(_))
        ));
    }

    #[test]
    fn empty_tree_serializes_to_empty_bytes() {
        assert!(serialize_tree(&[]).is_empty());
        assert!(parse_tree(b"").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_records(
            names in proptest::collection::btree_set("[a-zA-Z0-9._-]{1,12}", 1..8),
            seeds in proptest::collection::vec(any::<u8>(), 8),
        ) {
            let records: Vec<TreeRecord> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let mode = if i % 2 == 0 { FileMode::Blob } else { FileMode::Tree };
                    record(mode, name, seeds[i % seeds.len()])
                })
                .collect();
            let parsed = parse_tree(&serialize_tree(&records)).unwrap();
            prop_assert_eq!(parsed.len(), records.len());
            for r in &records {
                prop_assert!(parsed.contains(r));
            }
        }

        #[test]
        fn shuffled_input_hashes_identically(
            names in proptest::collection::btree_set("[a-z]{1,8}", 2..6),
        ) {
            let records: Vec<TreeRecord> = names
                .iter()
                .enumerate()
                .map(|(i, name)| record(FileMode::Blob, name, i as u8))
                .collect();
            let mut reversed = records.clone();
            reversed.reverse();
            prop_assert_eq!(serialize_tree(&records), serialize_tree(&reversed));
        }
    }
}
