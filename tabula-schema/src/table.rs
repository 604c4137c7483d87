//! Table definitions and column-level migration accumulation.

use std::sync::Arc;

use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::column::Column;
use crate::entry::{Entry, Record, Reentry, TypeRecord};
use crate::error::{SchemaError, SchemaResult};
use crate::flags::EntryFlags;

/// A table: an ordered collection of columns plus migration state.
///
/// The column collection is a [`Record`]: tables built from predefined,
/// shared column lists are static and refuse column-level migrations.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: Option<SmolStr>,
    old_name: Option<SmolStr>,
    flags: EntryFlags,
    offset: usize,
    rank: usize,
    columns: Record<TypeRecord<Column>>,
    foreigns: Vec<SmolStr>,
}

impl Table {
    /// Create a table with an empty, owned column list.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self::from_parts(Some(name.into()), None, Record::owned(TypeRecord::default()))
    }

    /// Create a table describing `type_name`, with instances of `size` bytes.
    pub fn with_type(name: impl Into<SmolStr>, type_name: impl Into<SmolStr>, size: usize) -> Self {
        Self::from_parts(
            Some(name.into()),
            None,
            Record::owned(TypeRecord::new(type_name).with_size(size)),
        )
    }

    /// Create a table over a shared, read-only column list.
    pub fn with_columns(name: impl Into<SmolStr>, columns: Arc<TypeRecord<Column>>) -> Self {
        Self::from_parts(Some(name.into()), None, Record::Shared(columns))
    }

    /// Placeholder recording that table `old_name` is dropped.
    pub fn drop_placeholder(old_name: impl Into<SmolStr>) -> Self {
        Self::from_parts(None, Some(old_name.into()), Record::owned(TypeRecord::default()))
    }

    /// Placeholder recording that table `from` is renamed to `to`.
    pub fn rename_placeholder(from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        Self::from_parts(
            Some(to.into()),
            Some(from.into()),
            Record::owned(TypeRecord::default()),
        )
    }

    fn from_parts(
        name: Option<SmolStr>,
        old_name: Option<SmolStr>,
        columns: Record<TypeRecord<Column>>,
    ) -> Self {
        Self {
            name,
            old_name,
            flags: EntryFlags::POINTER,
            offset: 0,
            rank: 0,
            columns,
            foreigns: Vec::new(),
        }
    }

    /// Builder form of setting flags.
    pub fn with_flags(mut self, flags: EntryFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    /// Name of the described type, empty when none was given.
    pub fn type_name(&self) -> &str {
        self.columns.type_name()
    }

    /// Instance size of the described type.
    pub fn size(&self) -> usize {
        self.columns.size()
    }

    /// The column list, placeholders included.
    pub fn columns(&self) -> &TypeRecord<Column> {
        &self.columns
    }

    /// Check whether the column list is shared static data.
    pub fn is_static(&self) -> bool {
        !self.columns.is_dynamic()
    }

    /// Rank computed by the last [`Schema::arrange`](crate::Schema::arrange).
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Names of the live columns that carry a foreign key.
    ///
    /// After [`Schema::arrange`](crate::Schema::arrange) only the columns
    /// taking part in a reference cycle remain.
    pub fn foreigns(&self) -> &[SmolStr] {
        &self.foreigns
    }

    /// Live columns that carry a foreign key, in column order.
    pub fn foreign_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|column| !column.is_placeholder() && column.has_foreign())
    }

    /// Check whether a live column called `name` exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.find_live(name).is_some()
    }

    /// Get the live column called `name`.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .find_live(name)
            .and_then(|index| self.columns.get(index))
    }

    /// First integer primary key column.
    pub fn primary(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| !column.is_placeholder() && column.is_integer_primary())
    }

    /// Add a column.
    ///
    /// Outside of `CHANGE` a foreign key column is also tracked in
    /// [`foreigns`](Self::foreigns).
    pub fn add_column(&mut self, column: Column) -> SchemaResult<&mut Self> {
        let tracked = column
            .name
            .clone()
            .filter(|_| column.has_foreign() && !self.flags.is_change());
        self.owned_columns()?.insert(column);
        if let Some(name) = tracked {
            self.foreigns.retain(|foreign| *foreign != name);
            self.foreigns.push(name);
        }
        Ok(self)
    }

    /// Replace the definition of a column.
    ///
    /// On a table carrying `CHANGE` this records an ALTER reentry; otherwise
    /// the existing column of the same name is replaced in place.
    pub fn alter_column(&mut self, column: Column) -> SchemaResult<&mut Self> {
        if self.flags.is_change() {
            self.owned_columns()?.insert(column.alter());
            return Ok(self);
        }

        let Some(name) = column.name.clone() else {
            return Err(SchemaError::entry_not_found(column.display_name()));
        };
        let has_foreign = column.has_foreign();
        let columns = self.owned_columns()?;
        let found = columns.find_live(&name);
        if let Some(index) = found {
            columns.steal(index, 1);
        }
        columns.insert(column);
        if found.is_some_and(|index| index < self.offset) {
            self.offset -= 1;
        }
        self.foreigns.retain(|foreign| *foreign != name);
        if has_foreign {
            self.foreigns.push(name);
        }
        Ok(self)
    }

    /// Drop a column.
    ///
    /// On a table carrying `CHANGE` this records a DROP reentry.
    pub fn drop_column(&mut self, name: &str) -> SchemaResult<&mut Self> {
        if self.flags.is_change() {
            self.owned_columns()?.insert(Column::drop_placeholder(name));
            return Ok(self);
        }

        let columns = self.owned_columns()?;
        if let Some(index) = columns.find_live(name) {
            columns.steal(index, 1);
            if index < self.offset {
                self.offset -= 1;
            }
        }
        self.foreigns.retain(|foreign| foreign != name);
        Ok(self)
    }

    /// Rename a column.
    ///
    /// On a table carrying `CHANGE` this records a RENAME reentry.
    pub fn rename_column(&mut self, from: &str, to: &str) -> SchemaResult<&mut Self> {
        if self.flags.is_change() {
            self.owned_columns()?
                .insert(Column::rename_placeholder(from, to));
            return Ok(self);
        }

        let columns = self.owned_columns()?;
        let index = columns
            .find_live(from)
            .ok_or_else(|| SchemaError::entry_not_found(from))?;
        if let Some(column) = columns.to_mut(index) {
            column.set_name(Some(to.into()));
        }
        rename_foreign(&mut self.foreigns, from, to);
        Ok(self)
    }

    /// Recompute [`foreigns`](Self::foreigns) from the live columns.
    pub fn collect_foreigns(&mut self) {
        self.foreigns = self
            .foreign_columns()
            .filter_map(|column| column.name.clone())
            .collect();
    }

    /// Merge the column reentries of `delta` into this table.
    ///
    /// Fails with [`SchemaError::StaticData`] without touching anything when
    /// this table's columns are static. Shared columns of `delta` stay shared;
    /// a shared column that gets renamed is copied first.
    pub fn accumulate(&mut self, delta: Table) -> SchemaResult<()> {
        let name = SmolStr::new(self.display_name());
        let Self {
            flags,
            offset,
            columns,
            foreigns,
            ..
        } = self;
        let Some(columns) = columns.get_mut() else {
            return Err(SchemaError::static_data(name));
        };

        if columns.is_empty() && delta.flags.is_change() {
            flags.insert(EntryFlags::CHANGE);
        }

        for record in delta.columns.into_owned().into_records() {
            let Some(kind) = record.reentry() else {
                warn!(table = %name, "Ignoring column reentry without name");
                continue;
            };
            debug!(table = %name, column = record.display_name(), ?kind, "Accumulating column");

            match kind {
                Reentry::Alter => {
                    if let Some(index) = record.name().and_then(|name| columns.find_live(name)) {
                        take_column(columns, offset, foreigns, index);
                    }
                }
                Reentry::Drop => {
                    if let Some(index) = record.old_name().and_then(|old| columns.find_live(old)) {
                        take_column(columns, offset, foreigns, index);
                    }
                    columns.insert(record);
                    continue;
                }
                Reentry::Rename => {
                    if let (Some(from), Some(to)) = (record.old_name(), record.name()) {
                        if let Some(column) = columns.find_live(from).and_then(|i| columns.to_mut(i)) {
                            column.set_name(Some(to.into()));
                            rename_foreign(foreigns, from, to);
                        }
                    }
                    columns.insert(record);
                    continue;
                }
                Reentry::Add => {}
            }

            if let Some(column_name) = record.name.clone().filter(|_| record.has_foreign()) {
                foreigns.push(column_name);
            }
            columns.insert(record);
        }

        Ok(())
    }

    /// Commit pending column reentries.
    pub(crate) fn commit(&mut self, clear: EntryFlags, set: EntryFlags) {
        if let Some(columns) = self.columns.get_mut() {
            columns.remove_reentries();
            for index in 0..columns.len() {
                if let Some(column) = columns.get_mut(index) {
                    column.flags.remove(EntryFlags::CHANGE);
                }
            }
        }
        self.offset = self.columns.len();
        self.flags.remove(EntryFlags::CHANGE);
        self.flags.remove(clear);
        self.flags.insert(set);
        self.collect_foreigns();
    }

    pub(crate) fn columns_mut(&mut self) -> Option<&mut TypeRecord<Column>> {
        self.columns.get_mut()
    }

    pub(crate) fn set_rank(&mut self, rank: usize) {
        self.rank = rank;
    }

    pub(crate) fn set_foreigns(&mut self, foreigns: Vec<SmolStr>) {
        self.foreigns = foreigns;
    }

    fn owned_columns(&mut self) -> SchemaResult<&mut TypeRecord<Column>> {
        let name = SmolStr::new(self.display_name());
        self.columns
            .get_mut()
            .ok_or_else(|| SchemaError::static_data(name))
    }
}

/// Remove a live column, keeping the committed window and `foreigns` in step.
fn take_column(
    columns: &mut TypeRecord<Column>,
    offset: &mut usize,
    foreigns: &mut Vec<SmolStr>,
    index: usize,
) {
    for record in columns.steal(index, 1) {
        if let Some(name) = record.name() {
            foreigns.retain(|foreign| foreign != name);
        }
    }
    if index < *offset {
        *offset -= 1;
    }
}

fn rename_foreign(foreigns: &mut [SmolStr], from: &str, to: &str) {
    for foreign in foreigns.iter_mut().filter(|foreign| *foreign == from) {
        *foreign = to.into();
    }
}

impl Entry for Table {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn old_name(&self) -> Option<&str> {
        self.old_name.as_deref()
    }

    fn set_name(&mut self, name: Option<SmolStr>) {
        self.name = name;
    }

    fn flags(&self) -> EntryFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut EntryFlags {
        &mut self.flags
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
}
