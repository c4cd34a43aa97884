//! The entry model: one row per (identifier, locale, status) document version.
//!
//! An entry is a structured document positioned in a tree of workspaces and
//! roots. The same logical document (one node id) may exist as several rows:
//! at most one draft, one published, and one archived row per locale.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Lifecycle state of an entry row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Unpublished working version.
    Draft,
    /// The live version.
    Published,
    /// Removed from the live set but retained.
    Archived,
}

impl EntryStatus {
    /// All states, in lifecycle order.
    pub const ALL: [EntryStatus; 3] = [Self::Draft, Self::Published, Self::Archived];

    /// The lowercase wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One versioned document row.
///
/// The tuple (id, locale, status) is unique across a row set. `id` is the
/// node id: the identity shared by all locale/status variants of the same
/// logical document. Ordering among siblings is given by `index`, a
/// fractional order key that sorts lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    /// Node id: stable identifier shared across locale/status variants.
    pub id: String,
    /// Name of the entry's type in the schema.
    pub type_name: String,
    /// Workspace this entry belongs to.
    pub workspace: String,
    /// Root within the workspace.
    pub root: String,
    /// Locale variant, if the root is localized.
    pub locale: Option<String>,
    /// Lifecycle state of this row.
    pub status: EntryStatus,
    /// Fractional order key among siblings (lexicographically sortable).
    pub index: String,
    /// Node id of the parent entry, if any.
    pub parent: Option<String>,
    /// Materialized ancestor chain, outermost first. Used for ancestor
    /// queries without recursive walks.
    pub parent_chain: Vec<String>,
    /// URL-safe path segment of this entry.
    pub segment: String,
    /// Path of the serialized row within the content tree.
    pub file_path: String,
    /// Hash of the serialized form of this row.
    pub content_hash: Digest,
    /// Opaque document payload, decoded per `type_name` by the schema.
    pub data: serde_json::Value,
}

impl EntryRow {
    /// Unique key of this row within a row set.
    ///
    /// Combines the node id with the locale and status discriminators.
    pub fn row_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.id,
            self.locale.as_deref().unwrap_or("-"),
            self.status
        )
    }

    /// Returns `true` if this row is the published variant.
    pub fn is_published(&self) -> bool {
        self.status == EntryStatus::Published
    }

    /// Serialize the row payload to canonical bytes and hash it.
    ///
    /// The hash covers the durable fields only (not `content_hash` itself),
    /// so it is stable across rebuilds of derived state.
    pub fn compute_content_hash(&self) -> Digest {
        let durable = serde_json::json!({
            "id": self.id,
            "type": self.type_name,
            "index": self.index,
            "parent": self.parent,
            "data": self.data,
        });
        let bytes = canonical_json_bytes(&durable);
        Digest::of(&bytes)
    }
}

/// Serialize a JSON value with object keys sorted, for stable hashing.
fn canonical_json_bytes(value: &serde_json::Value) -> Vec<u8> {
    fn write(value: &serde_json::Value, out: &mut Vec<u8>) {
        match value {
            serde_json::Value::Object(map) => {
                out.push(b'{');
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    out.extend_from_slice(
                        serde_json::to_string(key).expect("string serializes").as_bytes(),
                    );
                    out.push(b':');
                    write(&map[*key], out);
                }
                out.push(b'}');
            }
            serde_json::Value::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    write(item, out);
                }
                out.push(b']');
            }
            other => {
                out.extend_from_slice(
                    serde_json::to_string(other).expect("scalar serializes").as_bytes(),
                );
            }
        }
    }
    let mut out = Vec::new();
    write(value, &mut out);
    out
}
