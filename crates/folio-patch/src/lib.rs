//! Compact binary deltas between two blobs, with hash-verified pre/post
//! conditions.
//!
//! A patch is `digest(base) ‖ delta ‖ digest(result)`. Application verifies
//! the leading digest against the supplied base before decoding and the
//! trailing digest against the decoded result after applying, so a corrupt
//! or misapplied patch is detected deterministically rather than silently
//! producing wrong content. The delta is a copy/insert instruction stream
//! over byte ranges of the base (a general binary-diff scheme, not
//! line-based).

pub mod delta;
pub mod error;
pub mod patch;

pub use delta::{apply_delta, create_delta};
pub use error::{PatchError, PatchResult};
pub use patch::{apply_patch, create_patch};
