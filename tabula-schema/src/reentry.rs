//! Rename and drop history tracing.
//!
//! Pending placeholders of a container are turned into a directed
//! [`Relation`]: a rename adds `old -> new`, a drop adds `old -> Dropped`.
//! [`trace_reentry`] walks that graph to find what an old name is called now.

use std::collections::HashSet;

use smol_str::SmolStr;
use tabula_relation::{EraseMode, NodeId, Relation, RelationPool};
use tracing::trace;

use crate::entry::{Entry, Reentry, TypeRecord};

/// Initial head capacity of a rename graph.
pub const DEFAULT_GRAPH_CAPACITY: usize = 16;

/// Object stored in a rename graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReentryKey {
    /// An entry name.
    Name(SmolStr),
    /// Terminal marker of a drop.
    Dropped,
}

impl ReentryKey {
    /// Key for `name`.
    pub fn name(name: impl Into<SmolStr>) -> Self {
        Self::Name(name.into())
    }

    /// Get the name, `None` for a drop.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Dropped => None,
        }
    }
}

/// Build the rename graph of the pending window `records[offset..]`.
///
/// Edges are recorded in log order without reverse edges.
pub fn rename_graph<E: Entry>(
    records: &TypeRecord<E>,
    offset: usize,
    pool: &mut RelationPool<ReentryKey>,
    capacity: usize,
) -> Relation<ReentryKey> {
    let mut relation = Relation::with_capacity(capacity);
    let window = records.records().get(offset..).unwrap_or_default();

    for entry in window {
        let Some(old_name) = entry.old_name() else {
            continue;
        };
        let target = match entry.reentry() {
            Some(Reentry::Rename) => entry.name().map(ReentryKey::name),
            Some(Reentry::Drop) => Some(ReentryKey::Dropped),
            _ => None,
        };
        if let Some(target) = target {
            relation.add(pool, ReentryKey::name(old_name), Some(target), true);
        }
    }

    trace!(offset, heads = relation.len(), "rename_graph()");
    relation
}

/// Resolve the current name of `old_name`.
///
/// Returns `None` when the graph holds no history for `old_name`,
/// `Some(ReentryKey::Dropped)` when the history ends in a drop, and the final
/// name otherwise. At every step the oldest edge not followed yet is taken,
/// so a history that renames back and forth still terminates.
///
/// With `erase_traced` every followed edge is erased and emptied heads are
/// removed, so tracing the same name again yields `None`.
pub fn trace_reentry(
    relation: &mut Relation<ReentryKey>,
    pool: &mut RelationPool<ReentryKey>,
    old_name: &str,
    erase_traced: bool,
) -> Option<ReentryKey> {
    let mut current = ReentryKey::name(old_name);
    relation.first_edge(&current)?;

    let mut followed: HashSet<NodeId> = HashSet::new();
    let mut traversed = Vec::new();

    loop {
        let next = pool
            .chain(relation.first_edge(&current))
            .filter(|(id, _)| !followed.contains(id))
            .last()
            .map(|(id, object)| (id, object.clone()));
        let Some((id, next)) = next else {
            break;
        };
        followed.insert(id);
        traversed.push((current.clone(), next.clone()));
        current = next;
        if current == ReentryKey::Dropped {
            break;
        }
    }

    if erase_traced {
        for (from, to) in &traversed {
            relation.erase(pool, from, Some(to), EraseMode::Keep, None);
        }
        relation.remove_empty();
    }

    trace!(old_name, steps = traversed.len(), result = ?current, "trace_reentry()");
    Some(current)
}
