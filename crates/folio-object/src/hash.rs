//! Git-compatible object hashing.
//!
//! An object's identity is the SHA-1 of `"<kind> <length>\0" + bytes`. This
//! matches the loose-object convention, so digests computed here agree with
//! standard tooling over the same content.

use folio_types::Digest;

/// The kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw content (file contents, arbitrary data).
    Blob,
    /// Directory listing: sorted entries mapping names to object digests.
    Tree,
}

impl ObjectKind {
    /// The header tag used when hashing objects of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Compute the content-addressed digest of an object.
///
/// The digest covers the kind tag and byte length, so a blob and a tree with
/// identical payload bytes never collide.
pub fn hash_object(kind: ObjectKind, data: &[u8]) -> Digest {
    let mut buf = Vec::with_capacity(data.len() + 16);
    buf.extend_from_slice(kind.tag().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.push(0);
    buf.extend_from_slice(data);
    Digest::of(&buf)
}
