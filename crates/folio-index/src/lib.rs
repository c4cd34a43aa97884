//! Indexed queries over a materialized entry snapshot.
//!
//! [`EntryIndex`] derives lookup maps (by id, type, workspace, root, locale,
//! status, parent) from a flat row store. It is a pure function of the row
//! snapshot: given the same rows it always rebuilds identically, so it is
//! safe to treat as a cache keyed by the snapshot's identity. The
//! [`planner`] intersects index match sets to produce the minimal candidate
//! row set before any per-row predicate runs.

pub mod index;
pub mod planner;
pub mod query;

pub use index::{EntryIndex, RowId};
pub use planner::{plan, NodeCondition, PreFilter, Predicate, QueryInput, QueryPlan};
pub use query::EntryQuery;
