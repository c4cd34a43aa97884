//! Content-addressed object storage primitives for Folio.
//!
//! Provides git-compatible object hashing, the binary tree-object codec, and
//! an in-memory nested tree that supports applying batched content changes.
//! Stored data round-trips byte-for-byte with standard version-control
//! tooling that uses the same tree-object convention.

pub mod changes;
pub mod codec;
pub mod error;
pub mod hash;
pub mod tree;

pub use changes::{Change, ChangesBatch};
pub use codec::{parse_tree, serialize_tree, FileMode, TreeRecord};
pub use error::{ObjectError, ObjectResult};
pub use hash::{hash_object, ObjectKind};
pub use tree::{Node, Tree};
