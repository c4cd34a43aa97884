//! Foundation types for the Folio content store.
//!
//! This crate provides the digest and entry types used throughout the Folio
//! system. Every other Folio crate depends on `folio-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — Content-addressed identifier (20-byte SHA-1, git-compatible)
//! - [`EntryRow`] — One versioned document row (identifier + locale + status unique)
//! - [`EntryStatus`] — The draft / published / archived lifecycle states

pub mod digest;
pub mod entry;
pub mod error;

pub use digest::Digest;
pub use entry::{EntryRow, EntryStatus};
pub use error::TypeError;
