//! The patch envelope: `digest(base) ‖ delta ‖ digest(result)`.
//!
//! Digests use blob object addressing, so the digests embedded in a patch
//! agree with the digests the content tree stores for the same blobs.

use folio_object::{hash_object, ObjectKind};
use folio_types::Digest;

use crate::delta::{apply_delta, create_delta};
use crate::error::{PatchError, PatchResult};

/// Minimum size of a patch: two digest frames around an empty delta.
const MIN_PATCH: usize = 2 * Digest::LEN;

/// Create a self-describing patch that transforms `base` into `updated`.
pub fn create_patch(base: &[u8], updated: &[u8]) -> Vec<u8> {
    let delta = create_delta(base, updated);
    let mut patch = Vec::with_capacity(MIN_PATCH + delta.len());
    patch.extend_from_slice(hash_object(ObjectKind::Blob, base).as_bytes());
    patch.extend_from_slice(&delta);
    patch.extend_from_slice(hash_object(ObjectKind::Blob, updated).as_bytes());
    patch
}

/// Apply a patch to `base`, verifying both digest frames.
///
/// Verification order:
/// 1. the leading digest must match `base` ([`PatchError::BaseMismatch`]),
/// 2. the delta is decoded and applied,
/// 3. the trailing digest must match the result
///    ([`PatchError::CorruptPatch`]).
pub fn apply_patch(base: &[u8], patch: &[u8]) -> PatchResult<Vec<u8>> {
    if patch.len() < MIN_PATCH {
        return Err(PatchError::Truncated {
            len: patch.len(),
            min: MIN_PATCH,
        });
    }

    let declared_base = digest_frame(&patch[..Digest::LEN]);
    let actual_base = hash_object(ObjectKind::Blob, base);
    if declared_base != actual_base {
        return Err(PatchError::BaseMismatch {
            expected: declared_base,
            actual: actual_base,
        });
    }

    let delta = &patch[Digest::LEN..patch.len() - Digest::LEN];
    let result = apply_delta(base, delta)?;

    let declared_result = digest_frame(&patch[patch.len() - Digest::LEN..]);
    let actual_result = hash_object(ObjectKind::Blob, &result);
    if declared_result != actual_result {
        return Err(PatchError::CorruptPatch {
            expected: declared_result,
            actual: actual_result,
        });
    }

    Ok(result)
}

fn digest_frame(bytes: &[u8]) -> Digest {
    let mut raw = [0u8; 20];
    raw.copy_from_slice(bytes);
    Digest::from_raw(raw)
}
