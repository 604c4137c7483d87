//! The entry contract shared by tables (inside a schema) and columns (inside a
//! table).
//!
//! An [`Entry`] is a named descriptor that can also act as a migration
//! placeholder, a *reentry*. A [`TypeRecord`] is an ordered collection of
//! entries. Each slot is a [`Record`], which is either shared static data or an
//! owned runtime value.

use std::cmp::Ordering;
use std::ops::Deref;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::flags::EntryFlags;

/// Migration role of an entry, derived from its name, old name and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reentry {
    /// New entry: name present, no old name, no `CHANGE`.
    Add,
    /// Replacement body for an existing entry of the same name.
    Alter,
    /// Pending drop: no name, old name present.
    Drop,
    /// Pending rename: name and old name both present.
    Rename,
}

/// Common behavior of schema entries.
pub trait Entry {
    /// Current name. `None` for a pending drop.
    fn name(&self) -> Option<&str>;

    /// Previous name, only set on drop/rename placeholders.
    fn old_name(&self) -> Option<&str>;

    /// Replace the current name.
    fn set_name(&mut self, name: Option<SmolStr>);

    /// Entry flags.
    fn flags(&self) -> EntryFlags;

    /// Mutable entry flags.
    fn flags_mut(&mut self) -> &mut EntryFlags;

    /// Layout offset (columns) or committed entry count (tables).
    fn offset(&self) -> usize;

    /// Set the offset.
    fn set_offset(&mut self, offset: usize);

    /// Classify this entry as a migration record.
    ///
    /// Returns `None` for a malformed entry that has neither a name nor an
    /// old name.
    fn reentry(&self) -> Option<Reentry> {
        match (self.name(), self.old_name()) {
            (Some(_), _) if self.flags().is_change() => Some(Reentry::Alter),
            (None, Some(_)) => Some(Reentry::Drop),
            (Some(_), Some(_)) => Some(Reentry::Rename),
            (Some(_), None) => Some(Reentry::Add),
            (None, None) => None,
        }
    }

    /// Check whether this entry is a drop or rename placeholder.
    fn is_placeholder(&self) -> bool {
        self.old_name().is_some()
    }

    /// Name for diagnostics: the current name, else the old one.
    fn display_name(&self) -> &str {
        self.name().or(self.old_name()).unwrap_or_default()
    }
}

/// A slot holding either shared static data or an owned runtime value.
///
/// Shared records are read-only: [`Record::get_mut`] refuses them and
/// [`Record::to_mut`] replaces them with an owned copy first.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<E> {
    /// Predefined, read-only data.
    Shared(Arc<E>),
    /// Data created at runtime and owned by its container.
    Owned(Box<E>),
}

impl<E> Record<E> {
    /// Wrap an owned value.
    pub fn owned(value: E) -> Self {
        Self::Owned(Box::new(value))
    }

    /// Wrap shared static data.
    pub fn shared(value: Arc<E>) -> Self {
        Self::Shared(value)
    }

    /// Check whether the record is owned and mutable.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Mutable access, refused for shared data.
    pub fn get_mut(&mut self) -> Option<&mut E> {
        match self {
            Self::Owned(value) => Some(value),
            Self::Shared(_) => None,
        }
    }
}

impl<E: Clone> Record<E> {
    /// Mutable access, turning shared data into an owned copy first.
    pub fn to_mut(&mut self) -> &mut E {
        if let Self::Shared(shared) = self {
            *self = Self::Owned(Box::new(E::clone(shared)));
        }
        match self {
            Self::Owned(value) => value,
            Self::Shared(_) => unreachable!("shared record was just replaced"),
        }
    }

    /// Take the value out, cloning shared data that is still referenced elsewhere.
    pub fn into_owned(self) -> E {
        match self {
            Self::Owned(value) => *value,
            Self::Shared(shared) => Arc::unwrap_or_clone(shared),
        }
    }
}

impl<E> Deref for Record<E> {
    type Target = E;

    fn deref(&self) -> &E {
        match self {
            Self::Shared(value) => value,
            Self::Owned(value) => value,
        }
    }
}

impl<E> From<E> for Record<E> {
    fn from(value: E) -> Self {
        Self::owned(value)
    }
}

impl<E> From<Arc<E>> for Record<E> {
    fn from(value: Arc<E>) -> Self {
        Self::Shared(value)
    }
}

/// Ordered collection of entries with a lazily maintained sort flag.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRecord<E> {
    type_name: SmolStr,
    size: usize,
    records: Vec<Record<E>>,
    sorted: bool,
}

impl<E> Default for TypeRecord<E> {
    fn default() -> Self {
        Self::new("")
    }
}

impl<E> TypeRecord<E> {
    /// Create an empty record named after the type it describes.
    pub fn new(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: type_name.into(),
            size: 0,
            records: Vec::new(),
            sorted: false,
        }
    }

    /// Set the instance size of the described type.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Name of the described type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Instance size of the described type.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of entries, placeholders included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check whether the entries are currently sorted by name.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Raw ordered view of the records.
    pub fn records(&self) -> &[Record<E>] {
        &self.records
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.records.iter().map(|record| &**record)
    }

    /// Get an entry by position.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.records.get(index).map(|record| &**record)
    }

    /// Get an owned entry by position for mutation.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut E> {
        let entry = self.records.get_mut(index)?.get_mut()?;
        self.sorted = false;
        Some(entry)
    }

    /// Append a record. Clears the sorted flag.
    pub fn insert(&mut self, record: impl Into<Record<E>>) {
        self.records.push(record.into());
        self.sorted = false;
    }

    /// Append an owned entry and return it for further changes.
    pub fn push(&mut self, entry: E) -> &mut E {
        self.sorted = false;
        self.records.push(Record::owned(entry));
        match self.records.last_mut() {
            Some(Record::Owned(entry)) => entry,
            _ => unreachable!("an owned record was just pushed"),
        }
    }

    /// Remove `count` records starting at `index` and hand them back.
    ///
    /// Out of range requests are clamped.
    pub fn steal(&mut self, index: usize, count: usize) -> Vec<Record<E>> {
        let start = index.min(self.records.len());
        let end = index.saturating_add(count).min(self.records.len());
        self.records.drain(start..end).collect()
    }

    /// Consume the collection, yielding its records in order.
    pub fn into_records(self) -> Vec<Record<E>> {
        self.records
    }
}

impl<E: Clone> TypeRecord<E> {
    /// Get an entry by position for mutation, copying shared data first.
    pub fn to_mut(&mut self, index: usize) -> Option<&mut E> {
        let entry = self.records.get_mut(index)?.to_mut();
        self.sorted = false;
        Some(entry)
    }
}

impl<E: Entry> TypeRecord<E> {
    /// Sort entries by name. Drop placeholders sort first.
    pub fn sort(&mut self) {
        self.records.sort_by(|a, b| a.name().cmp(&b.name()));
        self.sorted = true;
    }

    /// Position of the first entry whose current name is `name`.
    ///
    /// Uses a binary search when the collection is sorted.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.position(name, |_| true)
    }

    /// Position of the live entry called `name`, skipping placeholders.
    pub fn find_live(&self, name: &str) -> Option<usize> {
        self.position(name, |entry| !entry.is_placeholder())
    }

    /// Remove drop and rename placeholders.
    pub fn remove_reentries(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !record.is_placeholder());
        before - self.records.len()
    }

    fn position(&self, name: &str, accept: impl Fn(&E) -> bool) -> Option<usize> {
        if self.sorted {
            let start = self
                .records
                .partition_point(|record| record.name().cmp(&Some(name)) == Ordering::Less);
            return self.records[start..]
                .iter()
                .take_while(|record| record.name() == Some(name))
                .position(|record| accept(record))
                .map(|offset| start + offset);
        }
        self.records
            .iter()
            .position(|record| record.name() == Some(name) && accept(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: Option<SmolStr>,
        old_name: Option<SmolStr>,
        flags: EntryFlags,
        offset: usize,
    }

    impl Item {
        fn named(name: &str) -> Self {
            Self {
                name: Some(name.into()),
                old_name: None,
                flags: EntryFlags::EMPTY,
                offset: 0,
            }
        }

        fn renamed(from: &str, to: &str) -> Self {
            Self {
                old_name: Some(from.into()),
                ..Self::named(to)
            }
        }
    }

    impl Entry for Item {
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

    #[test]
    fn test_reentry_classification() {
        let add = Item::named("a");
        assert_eq!(add.reentry(), Some(Reentry::Add));

        let mut alter = Item::named("a");
        alter.flags.insert(EntryFlags::CHANGE);
        assert_eq!(alter.reentry(), Some(Reentry::Alter));

        let drop = Item {
            name: None,
            ..Item::renamed("a", "unused")
        };
        assert_eq!(drop.reentry(), Some(Reentry::Drop));
        assert_eq!(Item::renamed("a", "b").reentry(), Some(Reentry::Rename));

        let empty = Item {
            name: None,
            ..Item::named("x")
        };
        assert_eq!(empty.reentry(), None);
    }

    #[test]
    fn test_record_static_is_read_only() {
        let mut record = Record::shared(Arc::new(Item::named("a")));
        assert!(!record.is_dynamic());
        assert!(record.get_mut().is_none());

        record.to_mut().set_name(Some("b".into()));
        assert!(record.is_dynamic());
        assert_eq!(record.name(), Some("b"));
    }

    #[test]
    fn test_to_mut_leaves_shared_original_untouched() {
        let original = Arc::new(Item::named("a"));
        let mut record = Record::shared(Arc::clone(&original));
        record.to_mut().set_name(Some("b".into()));
        assert_eq!(original.name(), Some("a"));
    }

    #[test]
    fn test_find_linear_and_sorted() {
        let mut records: TypeRecord<Item> = TypeRecord::new("items");
        for name in ["c", "a", "b"] {
            records.insert(Item::named(name));
        }
        assert_eq!(records.find("a"), Some(1));

        records.sort();
        assert!(records.is_sorted());
        assert_eq!(records.find("a"), Some(0));
        assert_eq!(records.find("c"), Some(2));
        assert_eq!(records.find("z"), None);

        records.insert(Item::named("d"));
        assert!(!records.is_sorted());
    }

    #[test]
    fn test_find_live_skips_placeholders() {
        let mut records: TypeRecord<Item> = TypeRecord::new("items");
        records.insert(Item::renamed("a", "b"));
        records.insert(Item::named("b"));

        assert_eq!(records.find("b"), Some(0));
        assert_eq!(records.find_live("b"), Some(1));

        records.sort();
        let live = records.find_live("b").unwrap();
        assert!(!records.get(live).unwrap().is_placeholder());
    }

    #[test]
    fn test_steal_and_remove_reentries() {
        let mut records: TypeRecord<Item> = TypeRecord::new("items");
        records.insert(Item::named("a"));
        records.insert(Item::renamed("a", "b"));
        records.insert(Item::named("c"));

        let stolen = records.steal(0, 1);
        assert_eq!(stolen.len(), 1);
        assert_eq!(stolen[0].name(), Some("a"));

        assert_eq!(records.remove_reentries(), 1);
        let names: Vec<_> = records.iter().filter_map(Entry::name).collect();
        assert_eq!(names, vec!["c"]);
        assert!(records.steal(10, 2).is_empty());
    }
}
