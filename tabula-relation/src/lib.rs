//! # tabula-relation
//!
//! Pooled, bidirectional object-relation graph used by the Tabula schema core
//! to trace renames and reference chains across migration steps.
//!
//! This crate provides:
//! - [`RelationPool`]: a chunked node allocator with an O(1) free list
//! - [`Relation`]: an object-ordered adjacency structure whose chains live in
//!   a shared pool
//!
//! ```text
//! Relation (sorted heads)          RelationPool (chunks)
//! ┌────────┐                       ┌───┬───┬───┬───┐
//! │ posts  │──▶ users ──▶ tags     │ n │ n │ n │ n │ ◀─ free list
//! │ users  │──▶ posts              └───┴───┴───┴───┘
//! └────────┘
//! ```
//!
//! Graphs never own the pool: every operation borrows it, so one pool can
//! serve any number of graphs and is dropped only after they are done.

pub mod pool;
pub mod relation;

pub use pool::{Chain, ChainMatch, DEFAULT_CHUNK_SIZE, NodeId, RelationNode, RelationPool};
pub use relation::{EraseMode, Relation};
