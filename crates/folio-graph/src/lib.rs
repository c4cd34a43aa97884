//! The writeable graph over the Folio content store.
//!
//! Mutations are expressed as [`Op`] values (create, update, move, publish,
//! archive, discard, remove, upload). Each op compiles against the graph's
//! current snapshot into content mutations plus per-path pins;
//! [`Graph::commit`] flattens them into one commit request and drives it
//! through the optimistic-concurrency protocol in `folio-source`. Sibling
//! order uses fractional keys ([`fractional::key_between`]), so inserting or
//! reordering never rewrites other siblings.

pub mod error;
pub mod fractional;
pub mod graph;
pub mod mutation;
pub mod op;
pub mod schema;

pub use error::{GraphError, GraphResult};
pub use fractional::{key_between, validate_order_key};
pub use graph::Graph;
pub use mutation::{Mutation, Task};
pub use op::{CreateOp, Insertion, Op};
pub use schema::{PayloadCodec, Schema, TypeDef};
