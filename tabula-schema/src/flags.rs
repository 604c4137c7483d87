//! Entry flags shared by tables and columns.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Set of named bits attached to a schema entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// No flag set.
    pub const EMPTY: Self = Self(0);
    /// Entry belongs to an uncommitted migration delta.
    pub const CHANGE: Self = Self(1 << 0);
    /// Instances are stored behind a pointer (conversion pipeline hint).
    pub const POINTER: Self = Self(1 << 1);
    /// Column is (part of) the primary key.
    pub const PRIMARY: Self = Self(1 << 2);
    /// Column carries a unique constraint.
    pub const UNIQUE: Self = Self(1 << 3);
    /// Column accepts NULL.
    pub const NULLABLE: Self = Self(1 << 4);
    /// Entry is a foreign key constraint rather than a plain column.
    pub const FOREIGN: Self = Self(1 << 5);
    /// Table is on the stack of the dependency ranking.
    pub const CHECKING: Self = Self(1 << 6);
    /// Table keeps a constrained foreign key that is part of a cycle.
    pub const CONSTRAINT_CYCLE: Self = Self(1 << 7);
    /// Table keeps at least one foreign key that is part of a cycle.
    pub const REFERENCE_CYCLE: Self = Self(1 << 8);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::CHANGE, "change"),
        (Self::POINTER, "pointer"),
        (Self::PRIMARY, "primary"),
        (Self::UNIQUE, "unique"),
        (Self::NULLABLE, "nullable"),
        (Self::FOREIGN, "foreign"),
        (Self::CHECKING, "checking"),
        (Self::CONSTRAINT_CYCLE, "constraint_cycle"),
        (Self::REFERENCE_CYCLE, "reference_cycle"),
    ];

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Set or clear the bits of `other`.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    /// Check for [`CHANGE`](Self::CHANGE).
    pub fn is_change(self) -> bool {
        self.contains(Self::CHANGE)
    }

    /// Check for [`PRIMARY`](Self::PRIMARY).
    pub fn is_primary(self) -> bool {
        self.contains(Self::PRIMARY)
    }

    /// Check for [`CHECKING`](Self::CHECKING).
    pub fn is_checking(self) -> bool {
        self.contains(Self::CHECKING)
    }

    /// Check for [`REFERENCE_CYCLE`](Self::REFERENCE_CYCLE).
    pub fn is_reference_cycle(self) -> bool {
        self.contains(Self::REFERENCE_CYCLE)
    }

    /// Check for [`CONSTRAINT_CYCLE`](Self::CONSTRAINT_CYCLE).
    pub fn is_constraint_cycle(self) -> bool {
        self.contains(Self::CONSTRAINT_CYCLE)
    }

    /// Look up a flag by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(flag, _)| *flag)
    }
}

impl BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "EntryFlags({})", names.join(" | "))
    }
}
