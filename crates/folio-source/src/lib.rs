//! Content sources for the Folio store.
//!
//! A [`Source`] is a place entries are stored: in-memory, remote
//! API-backed, or a namespaced composition of several sources. All mutation
//! goes through [`Source::apply_changes`], which enforces a compare-and-swap
//! guard against the declared base tree. The commit protocol
//! ([`attempt_commit`]) coordinates a local speculative source with a remote
//! authority and guarantees the local state is re-synced with the remote
//! regardless of outcome.

pub mod combined;
pub mod commit;
pub mod error;
pub mod memory;
pub mod remote;
pub mod traits;

pub use combined::CombinedSource;
pub use commit::{attempt_commit, check_commit, resync, CommitOutcome, CommitRequest};
pub use error::{SourceError, SourceResult};
pub use memory::MemorySource;
pub use remote::{RemoteApi, RemoteSource, TreeListing};
pub use traits::{CommitAuthority, Source};
