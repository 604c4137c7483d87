//! Schema definitions: table-level accumulation, foreign key tracing and
//! commit.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tabula_relation::{DEFAULT_CHUNK_SIZE, Relation, RelationPool};
use tracing::{debug, info, warn};

use crate::entry::{Entry, Record, Reentry, TypeRecord};
use crate::error::{SchemaError, SchemaResult};
use crate::flags::EntryFlags;
use crate::reentry::{DEFAULT_GRAPH_CAPACITY, ReentryKey, rename_graph, trace_reentry};
use crate::table::Table;

/// A named, versioned collection of tables.
///
/// A schema is either a base snapshot or a delta describing one migration
/// step. Deltas are folded into the base with [`Schema::accumulate`].
#[derive(Debug, Clone)]
pub struct Schema {
    name: SmolStr,
    version: u64,
    pub(crate) offset: usize,
    flags: EntryFlags,
    pub(crate) tables: TypeRecord<Table>,
    table_types: Vec<(SmolStr, SmolStr)>,
    table_types_sorted: bool,
    accumulated: bool,
}

/// A foreign key rewrite resolved by [`Schema::trace_foreign`].
struct ForeignUpdate {
    table: usize,
    column: SmolStr,
    target_table: Option<SmolStr>,
    target_column: Option<SmolStr>,
}

impl Schema {
    /// Create an empty schema stamped with `version`.
    pub fn new(name: impl Into<SmolStr>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
            offset: 0,
            flags: EntryFlags::EMPTY,
            tables: TypeRecord::new("schema"),
            table_types: Vec::new(),
            table_types_sorted: false,
            accumulated: false,
        }
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version of the last accumulated delta, or the creation version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of committed tables; entries past it are the pending change log.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Schema flags.
    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Check whether [`accumulate`](Self::accumulate) ran at least once.
    pub fn is_accumulated(&self) -> bool {
        self.accumulated
    }

    /// The table list, placeholders included.
    pub fn tables(&self) -> &TypeRecord<Table> {
        &self.tables
    }

    /// Create a table.
    pub fn create_table(&mut self, name: impl Into<SmolStr>) -> &mut Table {
        self.push_table(Table::new(name))
    }

    /// Create a table describing the type `type_name`.
    pub fn create_table_with_type(
        &mut self,
        name: impl Into<SmolStr>,
        type_name: impl Into<SmolStr>,
        size: usize,
    ) -> &mut Table {
        self.push_table(Table::with_type(name, type_name, size))
    }

    /// Insert a predefined, shared table.
    pub fn insert_static(&mut self, table: Arc<Table>) {
        self.register_type(&table);
        self.tables.insert(table);
        self.flags.insert(EntryFlags::CHANGE);
    }

    /// Record an ALTER of table `name` and return it for column changes.
    pub fn alter_table(&mut self, name: impl Into<SmolStr>) -> &mut Table {
        self.flags.insert(EntryFlags::CHANGE);
        self.tables
            .push(Table::new(name).with_flags(EntryFlags::CHANGE))
    }

    /// Record a DROP of table `name`.
    pub fn drop_table(&mut self, name: impl Into<SmolStr>) {
        self.flags.insert(EntryFlags::CHANGE);
        self.tables.insert(Table::drop_placeholder(name));
    }

    /// Record a RENAME of table `from` to `to`.
    pub fn rename_table(&mut self, from: impl Into<SmolStr>, to: impl Into<SmolStr>) {
        self.flags.insert(EntryFlags::CHANGE);
        self.tables.insert(Table::rename_placeholder(from, to));
    }

    /// Find the live table called `name`.
    pub fn find(&self, name: &str) -> Option<&Table> {
        self.tables
            .find_live(name)
            .and_then(|index| self.tables.get(index))
    }

    /// Find the live table describing the type `type_name`.
    pub fn find_type(&mut self, type_name: &str) -> Option<&Table> {
        if !self.table_types_sorted {
            self.table_types.sort();
            self.table_types_sorted = true;
        }
        let start = self
            .table_types
            .partition_point(|(name, _)| name.as_str() < type_name);
        let (_, table) = self
            .table_types
            .get(start)
            .filter(|(name, _)| name == type_name)?;
        self.find(table)
    }

    /// Fold the reentries of `delta` into this schema.
    ///
    /// ALTER targets with static columns are rejected before anything is
    /// touched, so a failed call leaves the schema unchanged.
    pub fn accumulate(&mut self, delta: Schema) -> SchemaResult<()> {
        self.check_static_targets(&delta)?;

        if !self.accumulated {
            for index in 0..self.tables.len() {
                if let Some(table) = self.tables.to_mut(index) {
                    table.collect_foreigns();
                }
            }
        }

        for record in delta.tables.into_records() {
            let Some(kind) = record.reentry() else {
                warn!(schema = %self.name, "Ignoring table reentry without name");
                continue;
            };
            debug!(schema = %self.name, table = record.display_name(), ?kind, "Accumulating table");

            match kind {
                Reentry::Alter => {
                    let found = record.name().and_then(|name| self.tables.find_live(name));
                    if let Some(mut existing) = found.and_then(|index| self.take_table(index)) {
                        let result = existing.to_mut().accumulate(record.into_owned());
                        self.tables.insert(existing);
                        result?;
                        continue;
                    }
                    self.adopt_table(record);
                }
                Reentry::Drop => {
                    let found = record.old_name().and_then(|old| self.tables.find_live(old));
                    if let Some(dropped) = found.and_then(|index| self.take_table(index)) {
                        if let Some(name) = dropped.name() {
                            self.table_types.retain(|(_, table)| table != name);
                        }
                    }
                    self.tables.insert(record);
                }
                Reentry::Rename => {
                    if let (Some(from), Some(to)) = (record.old_name(), record.name()) {
                        match self.tables.find_live(from) {
                            Some(index) => {
                                if let Some(table) = self.tables.to_mut(index) {
                                    table.set_name(Some(to.into()));
                                }
                                for (_, table) in &mut self.table_types {
                                    if table == from {
                                        *table = to.into();
                                    }
                                }
                            }
                            None => debug!(from, to, "Rename target not found"),
                        }
                    }
                    self.tables.insert(record);
                }
                Reentry::Add => self.adopt_table(record),
            }
        }

        self.version = delta.version;
        self.accumulated = true;
        Ok(())
    }

    /// Re-resolve every foreign key across pending renames and drops, using
    /// a throwaway node pool.
    pub fn trace_foreign(&mut self) -> SchemaResult<()> {
        let mut pool = RelationPool::new(DEFAULT_CHUNK_SIZE);
        self.trace_foreign_with(&mut pool, DEFAULT_GRAPH_CAPACITY)
    }

    /// Re-resolve every foreign key across pending renames and drops.
    ///
    /// Table names are traced through the schema's pending window, column
    /// names through the target table's pending window. Renamed targets are
    /// rewritten in place. Every column is processed; failures are collected
    /// into a single [`SchemaError::TraceFailed`].
    pub fn trace_foreign_with(
        &mut self,
        pool: &mut RelationPool<ReentryKey>,
        capacity: usize,
    ) -> SchemaResult<()> {
        let mut errors = Vec::new();
        let mut updates = Vec::new();
        let mut table_graph = rename_graph(&self.tables, self.offset, pool, capacity);
        let mut column_graphs: IndexMap<SmolStr, Relation<ReentryKey>> = IndexMap::new();

        for (index, table) in self.tables.iter().enumerate() {
            if table.is_placeholder() {
                continue;
            }
            for column in table.foreign_columns() {
                let (Some(column_name), Some(foreign)) = (&column.name, &column.foreign) else {
                    continue;
                };
                let mut update = ForeignUpdate {
                    table: index,
                    column: column_name.clone(),
                    target_table: None,
                    target_column: None,
                };

                let target_name = match trace_reentry(&mut table_graph, pool, &foreign.table, false) {
                    Some(ReentryKey::Dropped) => {
                        errors.push(SchemaError::reentry_dropped(foreign.table.as_str()));
                        continue;
                    }
                    Some(ReentryKey::Name(name)) if name != foreign.table => {
                        update.target_table = Some(name.clone());
                        name
                    }
                    _ => foreign.table.clone(),
                };

                match self.find(&target_name) {
                    None => errors.push(SchemaError::entry_not_found(target_name.as_str())),
                    Some(target) => {
                        let graph = column_graphs.entry(target_name.clone()).or_insert_with(|| {
                            rename_graph(target.columns(), target.offset(), pool, capacity)
                        });
                        match trace_reentry(graph, pool, &foreign.column, false) {
                            Some(ReentryKey::Dropped) => errors.push(SchemaError::reentry_dropped(
                                format!("{}.{}", target_name, foreign.column),
                            )),
                            Some(ReentryKey::Name(name)) if name != foreign.column => {
                                update.target_column = Some(name);
                            }
                            _ => {}
                        }
                    }
                }

                if update.target_table.is_some() || update.target_column.is_some() {
                    updates.push(update);
                }
            }
        }

        for graph in column_graphs.values_mut() {
            graph.clear(pool);
        }
        table_graph.clear(pool);

        for update in updates {
            if let Err(err) = self.apply_foreign_update(update) {
                errors.push(err);
            }
        }

        for err in &errors {
            warn!(schema = %self.name, error = %err, "Foreign key trace failed");
        }
        match SchemaError::trace_failed(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Commit the accumulated change log.
    ///
    /// Removes drop and rename placeholders from the schema and from every
    /// table with owned columns, clears `CHANGE`, moves every committed
    /// window to the end of its container, then clears and sets `clear` and
    /// `set` on each table.
    pub fn clear_changes(&mut self, clear: EntryFlags, set: EntryFlags) {
        let removed = self.tables.remove_reentries();
        self.offset = self.tables.len();
        self.flags.remove(EntryFlags::CHANGE);

        for index in 0..self.tables.len() {
            if let Some(table) = self.tables.to_mut(index) {
                table.commit(clear, set);
            }
        }

        info!(
            schema = %self.name,
            version = self.version,
            tables = self.offset,
            removed,
            "Schema changes committed"
        );
    }

    fn apply_foreign_update(&mut self, update: ForeignUpdate) -> SchemaResult<()> {
        let table = self
            .tables
            .get(update.table)
            .ok_or_else(|| SchemaError::entry_not_found(update.column.as_str()))?;
        if table.is_static() {
            return Err(SchemaError::static_data(table.display_name()));
        }

        let columns = self
            .tables
            .to_mut(update.table)
            .and_then(Table::columns_mut)
            .ok_or_else(|| SchemaError::entry_not_found(update.column.as_str()))?;
        let index = columns
            .find_live(&update.column)
            .ok_or_else(|| SchemaError::entry_not_found(update.column.as_str()))?;
        let Some(foreign) = columns.to_mut(index).and_then(|column| column.foreign.as_mut()) else {
            return Ok(());
        };

        if let Some(target) = update.target_table {
            debug!(column = %update.column, from = %foreign.table, to = %target, "Foreign table renamed");
            foreign.table = target;
        }
        if let Some(target) = update.target_column {
            debug!(column = %update.column, from = %foreign.column, to = %target, "Foreign column renamed");
            foreign.column = target;
        }
        Ok(())
    }

    fn push_table(&mut self, table: Table) -> &mut Table {
        self.register_type(&table);
        self.flags.insert(EntryFlags::CHANGE);
        self.tables.push(table)
    }

    /// Replay the table names of `delta` and reject any ALTER that would
    /// land on a static table.
    fn check_static_targets(&self, delta: &Schema) -> SchemaResult<()> {
        let mut projected: IndexMap<SmolStr, bool> = self
            .tables
            .iter()
            .filter(|table| !table.is_placeholder())
            .filter_map(|table| Some((SmolStr::new(table.name()?), table.is_static())))
            .collect();

        for table in delta.tables.iter() {
            match table.reentry() {
                Some(Reentry::Add) => {
                    if let Some(name) = table.name() {
                        projected.insert(name.into(), table.is_static());
                    }
                }
                Some(Reentry::Alter) => {
                    let Some(name) = table.name() else { continue };
                    match projected.get(name) {
                        Some(true) => return Err(SchemaError::static_data(name)),
                        Some(false) => {}
                        None => {
                            projected.insert(name.into(), table.is_static());
                        }
                    }
                }
                Some(Reentry::Drop) => {
                    if let Some(old) = table.old_name() {
                        projected.shift_remove(old);
                    }
                }
                Some(Reentry::Rename) => {
                    if let (Some(from), Some(to)) = (table.old_name(), table.name()) {
                        if let Some(is_static) = projected.shift_remove(from) {
                            projected.insert(to.into(), is_static);
                        }
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    fn adopt_table(&mut self, record: Record<Table>) {
        let mut table = record.into_owned();
        table.collect_foreigns();
        self.register_type(&table);
        self.tables.insert(table);
    }

    fn register_type(&mut self, table: &Table) {
        if let Some(name) = table.name().filter(|_| !table.type_name().is_empty()) {
            self.table_types
                .push((table.type_name().into(), name.into()));
            self.table_types_sorted = false;
        }
    }

    /// Remove a live table, keeping the committed window in step.
    fn take_table(&mut self, index: usize) -> Option<Record<Table>> {
        let taken = self.tables.steal(index, 1).pop()?;
        if index < self.offset {
            self.offset -= 1;
        }
        Some(taken)
    }
}
