//! Column definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::entry::Entry;
use crate::flags::EntryFlags;

/// Storage type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Uint,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit unsigned integer.
    Uint64,
    /// Double precision float.
    Double,
    /// Date and time.
    Timestamp,
    /// Character data, bounded by the column size.
    String,
    /// A backend-defined type, referenced by name.
    Custom(SmolStr),
}

impl ColumnType {
    /// Check whether this is one of the integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Int64 | Self::Uint64)
    }

    /// Get the type name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
            Self::String => "string",
            Self::Custom(name) => name.as_str(),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: SmolStr,
    /// Referenced column.
    pub column: SmolStr,
    /// `ON DELETE` action.
    pub on_delete: Option<SmolStr>,
    /// `ON UPDATE` action.
    pub on_update: Option<SmolStr>,
}

impl ForeignKey {
    /// Create a reference to `table.column` with no actions.
    pub fn new(table: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
            on_update: None,
        }
    }
}

/// A table column, or a column-level migration placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Current name. `None` on a drop placeholder.
    pub name: Option<SmolStr>,
    /// Previous name on drop/rename placeholders.
    pub old_name: Option<SmolStr>,
    /// Storage type. Placeholders have none.
    pub column_type: Option<ColumnType>,
    /// Field offset inside the described struct.
    pub offset: usize,
    /// Column flags.
    pub flags: EntryFlags,
    /// Length (strings) or precision (numbers).
    pub size: u32,
    /// Digits after the decimal point.
    pub digits: u32,
    /// Default value expression.
    pub default_value: Option<String>,
    /// Check constraint expression.
    pub check: Option<String>,
    /// Foreign key target.
    pub foreign: Option<ForeignKey>,
    /// Names of constraints this column takes part in.
    pub constraints: Vec<SmolStr>,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<SmolStr>, column_type: ColumnType) -> Self {
        Self {
            name: Some(name.into()),
            old_name: None,
            column_type: Some(column_type),
            offset: 0,
            flags: EntryFlags::EMPTY,
            size: 0,
            digits: 0,
            default_value: None,
            check: None,
            foreign: None,
            constraints: Vec::new(),
        }
    }

    /// Placeholder recording that `old_name` is dropped.
    pub fn drop_placeholder(old_name: impl Into<SmolStr>) -> Self {
        Self {
            name: None,
            old_name: Some(old_name.into()),
            column_type: None,
            ..Self::new("", ColumnType::Int)
        }
    }

    /// Placeholder recording that `from` is renamed to `to`.
    pub fn rename_placeholder(from: impl Into<SmolStr>, to: impl Into<SmolStr>) -> Self {
        Self {
            name: Some(to.into()),
            old_name: Some(from.into()),
            column_type: None,
            ..Self::new("", ColumnType::Int)
        }
    }

    /// Mark this column as the replacement body of an existing column.
    pub fn alter(mut self) -> Self {
        self.flags.insert(EntryFlags::CHANGE);
        self
    }

    /// Reference `table.column`. Existing actions are kept.
    pub fn reference(mut self, table: impl Into<SmolStr>, column: impl Into<SmolStr>) -> Self {
        match &mut self.foreign {
            Some(foreign) => {
                foreign.table = table.into();
                foreign.column = column.into();
            }
            None => self.foreign = Some(ForeignKey::new(table, column)),
        }
        self
    }

    /// Drop the foreign key.
    pub fn remove_reference(&mut self) {
        self.foreign = None;
    }

    /// Set the `ON DELETE` action. Ignored without a foreign key.
    pub fn on_delete(mut self, action: impl Into<SmolStr>) -> Self {
        if let Some(foreign) = &mut self.foreign {
            foreign.on_delete = Some(action.into());
        }
        self
    }

    /// Set the `ON UPDATE` action. Ignored without a foreign key.
    pub fn on_update(mut self, action: impl Into<SmolStr>) -> Self {
        if let Some(foreign) = &mut self.foreign {
            foreign.on_update = Some(action.into());
        }
        self
    }

    /// Replace the constraint list.
    pub fn set_constraints<I, S>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.constraints = constraints.into_iter().map(Into::into).collect();
    }

    /// Builder form of [`set_constraints`](Self::set_constraints).
    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.set_constraints(constraints);
        self
    }

    /// Set the size.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Set the digits.
    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    /// Set the default value expression.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set the check expression.
    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }

    /// Set the field offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.flags.insert(EntryFlags::PRIMARY);
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.flags.insert(EntryFlags::UNIQUE);
        self
    }

    /// Mark as nullable.
    pub fn nullable(mut self) -> Self {
        self.flags.insert(EntryFlags::NULLABLE);
        self
    }

    /// Check whether this column carries a foreign key.
    pub fn has_foreign(&self) -> bool {
        self.foreign.is_some()
    }

    /// Check whether this column takes part in a named constraint.
    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Check whether this is an integer primary key column.
    pub fn is_integer_primary(&self) -> bool {
        self.flags.is_primary() && self.column_type.as_ref().is_some_and(ColumnType::is_integer)
    }
}

impl Entry for Column {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Reentry;

    #[test]
    fn test_column_builder() {
        let column = Column::new("email", ColumnType::String)
            .with_size(191)
            .with_default("''")
            .unique();

        assert_eq!(column.name(), Some("email"));
        assert_eq!(column.size, 191);
        assert!(column.flags.contains(EntryFlags::UNIQUE));
        assert_eq!(column.reentry(), Some(Reentry::Add));
    }

    #[test]
    fn test_placeholders() {
        let dropped = Column::drop_placeholder("user_id");
        assert_eq!(dropped.name(), None);
        assert_eq!(dropped.old_name(), Some("user_id"));
        assert_eq!(dropped.reentry(), Some(Reentry::Drop));
        assert!(dropped.column_type.is_none());

        let renamed = Column::rename_placeholder("a", "b");
        assert_eq!(renamed.reentry(), Some(Reentry::Rename));
        assert!(renamed.is_placeholder());

        let altered = Column::new("a", ColumnType::Int64).alter();
        assert_eq!(altered.reentry(), Some(Reentry::Alter));
    }

    #[test]
    fn test_reference_and_actions() {
        let column = Column::new("user_id", ColumnType::Int)
            .on_delete("CASCADE")
            .reference("users", "id")
            .on_delete("CASCADE")
            .on_update("NO ACTION");

        let foreign = column.foreign.as_ref().unwrap();
        assert_eq!(foreign.table, "users");
        assert_eq!(foreign.column, "id");
        assert_eq!(foreign.on_delete.as_deref(), Some("CASCADE"));
        assert_eq!(foreign.on_update.as_deref(), Some("NO ACTION"));

        let moved = column.reference("accounts", "uid");
        let foreign = moved.foreign.as_ref().unwrap();
        assert_eq!(foreign.table, "accounts");
        assert_eq!(foreign.on_delete.as_deref(), Some("CASCADE"));
    }

    #[test]
    fn test_remove_reference_and_constraints() {
        let mut column = Column::new("owner", ColumnType::Int).reference("users", "id");
        column.set_constraints(["fk_owner", "ck_owner"]);
        assert!(column.is_constrained());
        assert_eq!(column.constraints.len(), 2);

        column.remove_reference();
        assert!(!column.has_foreign());
    }

    #[test]
    fn test_integer_primary() {
        assert!(Column::new("id", ColumnType::Int).primary().is_integer_primary());
        assert!(!Column::new("id", ColumnType::String).primary().is_integer_primary());
        assert!(!Column::new("id", ColumnType::Int).is_integer_primary());
    }
}
