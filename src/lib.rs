//! # Tabula
//!
//! Schema versioning core for database backends.
//!
//! Tabula provides:
//! - A table/column model whose migrations are recorded as add, alter, drop
//!   and rename entries
//! - Accumulation of migration deltas into a base schema
//! - Foreign key tracing across renames and drops
//! - Dependency ordering of tables with cycle detection
//!
//! ## Quick Start
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut session = MigrationSession::new("app", TabulaConfig::default())?;
//!
//! let mut delta = session.delta("app");
//! delta
//!     .create_table("posts")
//!     .add_column(Column::new("user_id", ColumnType::Int).reference("users", "id"))?;
//! delta
//!     .create_table("users")
//!     .add_column(Column::new("id", ColumnType::Int).primary())?;
//! session.apply(delta)?;
//! session.commit();
//!
//! let order: Vec<_> = session.arrange().into_iter().filter_map(Entry::name).collect();
//! assert_eq!(order, ["users", "posts"]);
//! # Ok::<(), tabula::SchemaError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Pooled relation graphs.
pub mod relation {
    pub use tabula_relation::*;
}

/// Schema model, migration and ordering.
pub mod schema {
    pub use tabula_schema::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::relation::{EraseMode, Relation, RelationPool};
    pub use crate::schema::{
        Column, ColumnType, Entry, EntryFlags, MigrationSession, Schema, SchemaError,
        SchemaResult, Table, TabulaConfig,
    };
}

// Re-export key types at the crate root
pub use schema::{Schema, SchemaError, logging};
