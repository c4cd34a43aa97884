use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest as _, Sha1};

use crate::error::TypeError;

/// Content-addressed identifier for any stored object.
///
/// A `Digest` is a 160-bit SHA-1 value, rendered as a 40-character lowercase
/// hex string. Identical content always produces the same `Digest`, making
/// objects deduplicatable and verifiable. The width is fixed by the on-disk
/// tree-object format, which must interoperate with standard git tooling.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 20]);

impl Digest {
    /// Number of raw bytes in a digest.
    pub const LEN: usize = 20;

    /// Compute a `Digest` directly from raw bytes.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create a `Digest` from a pre-computed hash.
    pub const fn from_raw(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// The null digest (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; 20])
    }

    /// Returns `true` if this is the null digest.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The raw 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Hex-encoded string representation (40 lowercase characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != Self::LEN {
            return Err(TypeError::InvalidLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for Digest {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; 20] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

// Serialized as the 40-character hex form, matching the wire rendering.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_is_deterministic() {
        let data = b"hello world";
        let d1 = Digest::of(data);
        let d2 = Digest::of(data);
        assert_eq!(d1, d2);
    }

    #[test]
    fn different_data_produces_different_digests() {
        assert_ne!(Digest::of(b"hello"), Digest::of(b"world"));
    }

    #[test]
    fn matches_reference_sha1() {
        // sha1("hello") from standard tooling.
        assert_eq!(
            Digest::of(b"hello").to_hex(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn null_is_all_zeros() {
        let null = Digest::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 20]);
    }

    #[test]
    fn hex_roundtrip() {
        let d = Digest::of(b"test");
        let parsed = Digest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_bad_chars() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn display_is_full_hex() {
        let d = Digest::of(b"test");
        let display = format!("{d}");
        assert_eq!(display.len(), 40);
        assert_eq!(display, d.to_hex());
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Digest::of(b"test").short_hex().len(), 8);
    }

    #[test]
    fn serde_roundtrip_as_hex_string() {
        let d = Digest::of(b"serde test");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        let d1 = Digest::from_raw([0; 20]);
        let d2 = Digest::from_raw([1; 20]);
        assert!(d1 < d2);
    }
}
