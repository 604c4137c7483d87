//! Foreign key dependency ordering.
//!
//! [`Schema::arrange`] ranks every table by the tables its foreign keys point
//! at, so a DDL emitter can create them without forward references. Tables
//! that reference each other, directly or through a longer loop, are flagged
//! instead of failing.

use smol_str::SmolStr;
use tracing::debug;

use crate::entry::Entry;
use crate::flags::EntryFlags;
use crate::schema::Schema;
use crate::table::Table;

/// One foreign key of a table, resolved against the sorted table list.
#[derive(Debug)]
struct ForeignEdge {
    target_name: SmolStr,
    target: Option<usize>,
    column: SmolStr,
    constrained: bool,
}

/// Per-table ranking state, kept apart from the tables themselves.
#[derive(Debug, Default)]
struct RankState {
    rank: usize,
    checking: bool,
    cycle: bool,
    constraint_cycle: bool,
    retained: Vec<SmolStr>,
}

struct Ranking {
    edges: Vec<Vec<ForeignEdge>>,
    states: Vec<RankState>,
}

impl Ranking {
    fn new(schema: &Schema) -> Self {
        let tables = &schema.tables;
        let edges = tables
            .iter()
            .map(|table| {
                let mut edges: Vec<ForeignEdge> = table
                    .foreigns()
                    .iter()
                    .filter_map(|name| table.column(name))
                    .filter_map(|column| {
                        let foreign = column.foreign.as_ref()?;
                        Some(ForeignEdge {
                            target_name: foreign.table.clone(),
                            target: tables.find_live(&foreign.table),
                            column: column.name.clone()?,
                            constrained: column.is_constrained(),
                        })
                    })
                    .collect();
                edges.sort_by(|a, b| a.target_name.cmp(&b.target_name));
                edges
            })
            .collect();
        let states = (0..tables.len()).map(|_| RankState::default()).collect();
        Self { edges, states }
    }

    /// Rank `index`: one plus the ranks of the distinct tables it references.
    ///
    /// Reaching a table that is still being ranked means the tables reference
    /// each other; the edge is kept and `each_other` is raised for the caller.
    fn count_order(&mut self, index: usize, mut each_other: Option<&mut bool>) -> usize {
        if self.states[index].rank > 0 {
            return self.states[index].rank;
        }
        self.states[index].rank = 1;
        self.states[index].checking = true;

        let mut retained = Vec::new();
        let mut prev = None;
        for edge_index in 0..self.edges[index].len() {
            let edge = &self.edges[index][edge_index];
            let (column, constrained) = (edge.column.clone(), edge.constrained);
            let Some(target) = edge.target else {
                retained.push(column);
                continue;
            };

            if self.states[target].checking {
                self.mark_cycle(index, constrained, each_other.as_deref_mut());
                retained.push(column);
                continue;
            }
            if prev != Some(target) {
                let mut reo = false;
                let rank = self.count_order(target, Some(&mut reo));
                let state = &mut self.states[index];
                state.rank = state.rank.saturating_add(rank);
                if reo {
                    self.mark_cycle(index, constrained, each_other.as_deref_mut());
                    retained.push(column);
                    continue;
                }
            }
            prev = Some(target);
        }

        let state = &mut self.states[index];
        state.retained = retained;
        state.checking = false;
        state.rank
    }

    fn mark_cycle(&mut self, index: usize, constrained: bool, each_other: Option<&mut bool>) {
        if let Some(each_other) = each_other {
            *each_other = true;
        }
        let state = &mut self.states[index];
        state.cycle = true;
        state.constraint_cycle |= constrained;
    }
}

impl Schema {
    /// Order live tables so that every table comes after the tables it
    /// references.
    ///
    /// Sorts the table list by name, ranks every table and stores the rank on
    /// it. Foreign keys that do not take part in a cycle are removed from each
    /// table's [`foreigns`](Table::foreigns); tables keeping a cyclic one get
    /// [`EntryFlags::REFERENCE_CYCLE`], plus
    /// [`EntryFlags::CONSTRAINT_CYCLE`] when that column is constrained.
    /// Placeholders are left out. Tables of equal rank keep name order.
    pub fn arrange(&mut self) -> Vec<&Table> {
        self.tables.sort();
        let mut ranking = Ranking::new(self);

        for index in 0..self.tables.len() {
            let live = self
                .tables
                .get(index)
                .is_some_and(|table| !table.is_placeholder());
            if live {
                ranking.count_order(index, None);
            }
        }

        for (index, state) in ranking.states.into_iter().enumerate() {
            let live = self
                .tables
                .get(index)
                .is_some_and(|table| !table.is_placeholder());
            if !live {
                continue;
            }
            if let Some(table) = self.tables.to_mut(index) {
                table.set_rank(state.rank);
                table.set_foreigns(state.retained);
                let flags = table.flags_mut();
                if state.cycle {
                    flags.insert(EntryFlags::REFERENCE_CYCLE);
                }
                if state.constraint_cycle {
                    flags.insert(EntryFlags::CONSTRAINT_CYCLE);
                }
                flags.remove(EntryFlags::CHECKING);
            }
        }
        self.tables.sort();

        let mut ordered: Vec<&Table> = self
            .tables
            .iter()
            .filter(|table| !table.is_placeholder())
            .collect();
        ordered.sort_by_key(|table| table.rank());
        debug!(
            schema = self.name(),
            tables = ordered.len(),
            "Schema arranged"
        );
        ordered
    }
}
