//! Migration session: drives a sequence of deltas against one schema.
//!
//! ```rust
//! use tabula_schema::{Column, ColumnType, MigrationSession, TabulaConfig};
//!
//! let mut session = MigrationSession::new("app", TabulaConfig::default()).unwrap();
//!
//! let mut delta = session.delta("app");
//! delta
//!     .create_table("users")
//!     .add_column(Column::new("id", ColumnType::Int).primary())
//!     .unwrap();
//! session.apply(delta).unwrap();
//! session.commit();
//!
//! assert_eq!(session.schema().version(), 1);
//! ```

use smol_str::SmolStr;
use tabula_relation::RelationPool;
use tracing::{info, warn};

use crate::config::TabulaConfig;
use crate::error::SchemaResult;
use crate::flags::EntryFlags;
use crate::reentry::ReentryKey;
use crate::schema::Schema;
use crate::table::Table;

/// Monotonically increasing source of schema versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCounter {
    next: u64,
}

impl VersionCounter {
    /// Create a counter whose first version is `start`.
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// Version the next call to [`next`](Self::next) returns.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Hand out a version.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        let version = self.next;
        self.next += 1;
        version
    }
}

/// Outcome of [`MigrationSession::apply`].
#[derive(Debug)]
pub struct ApplyResult {
    /// Version adopted by the schema.
    pub version: u64,
    /// Foreign key trace failures that were tolerated.
    pub warnings: Vec<String>,
}

impl ApplyResult {
    /// Check whether every foreign key was traced.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A schema together with the state needed to migrate it.
///
/// The session owns one node pool that every foreign key trace borrows, so
/// repeated migrations reuse the same allocations.
pub struct MigrationSession {
    config: TabulaConfig,
    schema: Schema,
    versions: VersionCounter,
    pool: RelationPool<ReentryKey>,
    clear_mask: EntryFlags,
    set_mask: EntryFlags,
}

impl MigrationSession {
    /// Start a session on an empty schema.
    pub fn new(name: impl Into<SmolStr>, config: TabulaConfig) -> SchemaResult<Self> {
        let versions = VersionCounter::new(config.migration.initial_version);
        let base = Schema::new(name, versions.peek().saturating_sub(1));
        Self::with_schema(base, versions, config)
    }

    /// Start a session on an existing schema with an injected version source.
    ///
    /// Logging is set up from the `[debug]` section on the way in.
    pub fn with_schema(
        schema: Schema,
        versions: VersionCounter,
        config: TabulaConfig,
    ) -> SchemaResult<Self> {
        config.validate()?;
        crate::logging::init_with_config(&config.debug);
        let clear_mask = config.migration.clear_mask()?;
        let set_mask = config.migration.set_mask()?;
        let pool = RelationPool::new(config.relation.chunk_size);

        Ok(Self {
            config,
            schema,
            versions,
            pool,
            clear_mask,
            set_mask,
        })
    }

    /// The migrated schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mutable access to the migrated schema.
    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Session configuration.
    pub fn config(&self) -> &TabulaConfig {
        &self.config
    }

    /// Version the next delta will carry.
    pub fn next_version(&self) -> u64 {
        self.versions.peek()
    }

    /// End the session and return the schema.
    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Create an empty delta stamped with the next version.
    pub fn delta(&mut self, name: impl Into<SmolStr>) -> Schema {
        Schema::new(name, self.versions.next())
    }

    /// Accumulate `delta`, then re-resolve foreign keys.
    ///
    /// Trace failures are returned as warnings unless
    /// `migration.strict_foreign` is set.
    pub fn apply(&mut self, delta: Schema) -> SchemaResult<ApplyResult> {
        crate::tabula_debug!(
            schema = self.schema.name(),
            version = delta.version(),
            reentries = delta.tables().len(),
            "Applying delta"
        );
        self.schema.accumulate(delta)?;

        let traced = self
            .schema
            .trace_foreign_with(&mut self.pool, self.config.relation.capacity);
        crate::tabula_trace!(nodes = self.pool.len(), chunks = self.pool.chunk_count(), "Trace pool");

        let warnings = match traced {
            Ok(()) => Vec::new(),
            Err(err) if self.config.migration.strict_foreign => return Err(err),
            Err(err) => {
                warn!(schema = self.schema.name(), error = %err, "Continuing with untraced foreign keys");
                err.errors().iter().map(ToString::to_string).collect()
            }
        };

        Ok(ApplyResult {
            version: self.schema.version(),
            warnings,
        })
    }

    /// Commit pending changes with the configured flag masks.
    pub fn commit(&mut self) {
        self.schema.clear_changes(self.clear_mask, self.set_mask);
        info!(
            schema = self.schema.name(),
            next_version = self.versions.peek(),
            "Migration session committed"
        );
    }

    /// Tables in creation order for a DDL emitter.
    pub fn arrange(&mut self) -> Vec<&Table> {
        self.schema.arrange()
    }
}
