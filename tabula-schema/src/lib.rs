//! # tabula-schema
//!
//! Schema model and migration core for Tabula.
//!
//! This crate provides:
//! - [`Column`], [`Table`] and [`Schema`] descriptors sharing one [`Entry`] contract
//! - Migration accumulation: deltas of add, alter, drop and rename reentries
//!   folded into a base schema
//! - Foreign key tracing across pending renames and drops
//! - Commit of the change log and dependency ordering for DDL emitters
//! - Configuration parser for `tabula.toml` files
//!
//! ## Example
//!
//! ```rust
//! use tabula_schema::{Column, ColumnType, EntryFlags, Schema};
//!
//! let mut schema = Schema::new("app", 1);
//! schema
//!     .create_table("users")
//!     .add_column(Column::new("id", ColumnType::Int).primary())?;
//!
//! let mut delta = Schema::new("app", 2);
//! delta.rename_table("users", "accounts");
//!
//! schema.accumulate(delta)?;
//! schema.trace_foreign()?;
//! schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);
//! assert!(schema.find("accounts").is_some());
//! # Ok::<(), tabula_schema::SchemaError>(())
//! ```

pub mod arrange;
pub mod column;
pub mod config;
pub mod entry;
pub mod error;
pub mod flags;
pub mod logging;
pub mod reentry;
pub mod schema;
pub mod session;
pub mod table;

pub use column::{Column, ColumnType, ForeignKey};
pub use config::{DebugConfig, MigrationConfig, RelationConfig, TabulaConfig};
pub use entry::{Entry, Record, Reentry, TypeRecord};
pub use error::{ErrorCode, SchemaError, SchemaResult};
pub use flags::EntryFlags;
pub use reentry::{DEFAULT_GRAPH_CAPACITY, ReentryKey, rename_graph, trace_reentry};
pub use schema::Schema;
pub use session::{ApplyResult, MigrationSession, VersionCounter};
pub use table::Table;
