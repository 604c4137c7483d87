//! Bidirectional "object references object" graph.
//!
//! A [`Relation`] keeps one head per *from* object, sorted by object so
//! lookups are a binary search. Each head owns a chain of *to* objects
//! allocated from a [`RelationPool`]. Chains are most-recent-first and are
//! not deduplicated.
//!
//! # Examples
//!
//! ```rust
//! use tabula_relation::{EraseMode, Relation, RelationPool};
//!
//! let mut pool = RelationPool::new(16);
//! let mut relation = Relation::new();
//!
//! relation.add(&mut pool, "posts", Some("users"), false);
//! assert!(relation.find(&pool, &"posts", Some(&"users")).is_some());
//! assert!(relation.find(&pool, &"users", Some(&"posts")).is_some());
//!
//! relation.erase(&mut pool, &"posts", Some(&"users"), EraseMode::Mirror, None);
//! assert!(relation.find(&pool, &"posts", Some(&"users")).is_none());
//! assert!(relation.find(&pool, &"users", Some(&"posts")).is_none());
//! ```

use tracing::trace;

use crate::pool::{NodeId, RelationNode, RelationPool};

/// How [`Relation::erase`] treats reverse edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseMode {
    /// Also erase the mirrored `to → from` edge.
    #[default]
    Mirror,
    /// Leave reverse edges untouched.
    Keep,
    /// Erase every edge pointing back at `from` from the objects `from`
    /// relates to, then report `from` as fully unlinked.
    Unlink,
}

impl EraseMode {
    /// Map the numeric mode used by migration scripts (`0`, `1`, `-1`).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Mirror),
            1 => Some(Self::Keep),
            -1 => Some(Self::Unlink),
            _ => None,
        }
    }
}

/// Relations between objects, backed by a shared [`RelationPool`].
#[derive(Debug)]
pub struct Relation<T> {
    heads: Vec<RelationNode<T>>,
}

impl<T> Default for Relation<T> {
    fn default() -> Self {
        Self { heads: Vec::new() }
    }
}

impl<T: Ord + Clone> Relation<T> {
    /// Create an empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty relation with room for `capacity` heads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heads: Vec::with_capacity(capacity),
        }
    }

    /// Number of *from* objects that have a head.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    /// Check whether the relation has no heads.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Iterate over the heads, in object order.
    pub fn heads(&self) -> impl Iterator<Item = &RelationNode<T>> {
        self.heads.iter()
    }

    /// Record that `from` relates to `to`.
    ///
    /// `to` is prepended to the chain of `from`; duplicates are kept. Unless
    /// `no_reverse` is set the mirrored `to → from` edge is recorded as well.
    /// A `to` of `None` only registers a head for `from`.
    pub fn add(&mut self, pool: &mut RelationPool<T>, from: T, to: Option<T>, no_reverse: bool) {
        let index = self.head_index_or_insert(from.clone());
        let Some(to) = to else {
            return;
        };

        let head = &mut self.heads[index];
        head.next = Some(pool.alloc(to.clone(), head.next));
        trace!(heads = self.heads.len(), "Relation::add()");

        if !no_reverse {
            let index = self.head_index_or_insert(to);
            let head = &mut self.heads[index];
            head.next = Some(pool.alloc(from, head.next));
        }
    }

    /// Erase relations of `from`.
    ///
    /// With `to` set only the first `from → to` edge is removed, otherwise the
    /// whole chain of `from` is released. `mode` decides what happens to
    /// reverse edges; see [`EraseMode`]. In [`EraseMode::Unlink`] mode `free`
    /// is called with `from` once no related object points back at it.
    ///
    /// Heads left without edges stay in place until
    /// [`remove_empty`](Self::remove_empty) runs.
    pub fn erase(
        &mut self,
        pool: &mut RelationPool<T>,
        from: &T,
        to: Option<&T>,
        mode: EraseMode,
        free: Option<&mut dyn FnMut(&T)>,
    ) {
        if mode == EraseMode::Unlink {
            let related: Vec<T> = self.related(pool, from).cloned().collect();
            for object in &related {
                while self.unlink_edge(pool, object, from) {}
            }
        }

        match to {
            Some(to) => {
                if self.unlink_edge(pool, from, to) && mode == EraseMode::Mirror {
                    self.unlink_edge(pool, to, from);
                }
            }
            None => {
                let Ok(index) = self.search(from) else {
                    return;
                };
                let start = self.heads[index].next.take();
                let released = pool.free_chain(start);
                if mode == EraseMode::Mirror {
                    for object in &released {
                        self.unlink_edge(pool, object, from);
                    }
                }
            }
        }

        if let (EraseMode::Unlink, Some(free)) = (mode, free) {
            free(from);
        }
    }

    /// Replace every reference to `old` with `new`.
    ///
    /// Unless `no_reverse` is set, the edges originating at `old` are moved
    /// to the head of `new` as well.
    pub fn replace(&mut self, pool: &mut RelationPool<T>, old: &T, new: T, no_reverse: bool) {
        for head in &self.heads {
            let mut cursor = head.next;
            while let Some(id) = cursor {
                let Some(node) = pool.get_mut(id) else {
                    break;
                };
                if node.object == *old {
                    node.object = new.clone();
                }
                cursor = node.next;
            }
        }

        if no_reverse {
            return;
        }
        let Ok(index) = self.search(old) else {
            return;
        };
        let moved = self.heads.remove(index).next;
        let index = self.head_index_or_insert(new);
        match self.heads[index].next {
            None => self.heads[index].next = moved,
            Some(first) => {
                let tail = pool
                    .chain(Some(first))
                    .last()
                    .map(|(id, _)| id)
                    .unwrap_or(first);
                if let Some(node) = pool.get_mut(tail) {
                    node.next = moved;
                }
            }
        }
    }

    /// Drop heads whose chain became empty.
    pub fn remove_empty(&mut self) {
        let before = self.heads.len();
        self.heads.retain(|head| head.next.is_some());
        trace!(removed = before - self.heads.len(), "Relation::remove_empty()");
    }

    /// Find a relation.
    ///
    /// With `to` set, returns the first node of the chain of `from` holding
    /// `to`; otherwise returns the head of `from`. The node is borrowed from
    /// the relation or the pool.
    pub fn find<'a>(
        &'a self,
        pool: &'a RelationPool<T>,
        from: &T,
        to: Option<&T>,
    ) -> Option<&'a RelationNode<T>> {
        let head = &self.heads[self.search(from).ok()?];
        match to {
            None => Some(head),
            Some(to) => {
                let found = head.find(pool, to)?;
                pool.get(found.node)
            }
        }
    }

    /// Iterate over the objects `from` relates to, most recent first.
    pub fn related<'a>(
        &'a self,
        pool: &'a RelationPool<T>,
        from: &T,
    ) -> impl Iterator<Item = &'a T> + 'a {
        let start = self
            .search(from)
            .ok()
            .and_then(|index| self.heads[index].next);
        pool.chain(start).map(|(_, object)| object)
    }

    /// Release every chain back to `pool` and drop all heads.
    pub fn clear(&mut self, pool: &mut RelationPool<T>) {
        for head in self.heads.drain(..) {
            pool.free_chain(head.next);
        }
    }

    fn search(&self, object: &T) -> Result<usize, usize> {
        self.heads.binary_search_by(|head| head.object.cmp(object))
    }

    fn head_index_or_insert(&mut self, object: T) -> usize {
        match self.search(&object) {
            Ok(index) => index,
            Err(index) => {
                self.heads.insert(index, RelationNode::new(object, None));
                index
            }
        }
    }

    /// Remove the first `from → to` edge. Returns `true` if one was found.
    fn unlink_edge(&mut self, pool: &mut RelationPool<T>, from: &T, to: &T) -> bool {
        let Ok(index) = self.search(from) else {
            return false;
        };
        let Some(found) = self.heads[index].find(pool, to) else {
            return false;
        };
        let next = pool.get(found.node).and_then(|node| node.next);
        match found.prev {
            None => self.heads[index].next = next,
            Some(prev) => {
                if let Some(node) = pool.get_mut(prev) {
                    node.next = next;
                }
            }
        }
        pool.free(found.node);
        true
    }

    /// Get the node handle of the first edge in the chain of `from`.
    pub fn first_edge(&self, from: &T) -> Option<NodeId> {
        self.search(from)
            .ok()
            .and_then(|index| self.heads[index].next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn related(relation: &Relation<u32>, pool: &RelationPool<u32>, from: u32) -> Vec<u32> {
        relation.related(pool, &from).copied().collect()
    }

    #[test]
    fn test_add_records_reverse() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);

        assert!(relation.find(&pool, &1, Some(&2)).is_some());
        assert!(relation.find(&pool, &2, Some(&1)).is_some());
        assert_eq!(relation.len(), 2);
    }

    #[test]
    fn test_add_without_reverse() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), true);

        assert!(relation.find(&pool, &1, Some(&2)).is_some());
        assert!(relation.find(&pool, &2, None).is_none());
    }

    #[test]
    fn test_add_none_registers_head() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 5, None, false);

        let head = relation.find(&pool, &5, None).unwrap();
        assert_eq!(*head.object(), 5);
        assert!(head.is_last());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_heads_stay_sorted() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        for from in [9, 3, 7, 1] {
            relation.add(&mut pool, from, Some(100), true);
        }
        let objects: Vec<u32> = relation.heads().map(|h| *h.object()).collect();
        assert_eq!(objects, vec![1, 3, 7, 9]);
    }

    #[test]
    fn test_chain_is_most_recent_first_and_not_deduplicated() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), true);
        relation.add(&mut pool, 1, Some(3), true);
        relation.add(&mut pool, 1, Some(2), true);

        assert_eq!(related(&relation, &pool, 1), vec![2, 3, 2]);
    }

    #[test]
    fn test_erase_mirror() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.erase(&mut pool, &1, Some(&2), EraseMode::Mirror, None);

        assert!(relation.find(&pool, &1, Some(&2)).is_none());
        assert!(relation.find(&pool, &2, Some(&1)).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_erase_keep_leaves_reverse() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.erase(&mut pool, &1, Some(&2), EraseMode::Keep, None);

        assert!(relation.find(&pool, &1, Some(&2)).is_none());
        assert!(relation.find(&pool, &2, Some(&1)).is_some());
    }

    #[test]
    fn test_erase_whole_chain_mirror() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.add(&mut pool, 1, Some(3), false);
        relation.erase(&mut pool, &1, None, EraseMode::Mirror, None);

        assert!(related(&relation, &pool, 1).is_empty());
        assert!(related(&relation, &pool, 2).is_empty());
        assert!(related(&relation, &pool, 3).is_empty());
        assert!(pool.is_empty());

        relation.remove_empty();
        assert!(relation.is_empty());
    }

    #[test]
    fn test_erase_unlink_scrubs_back_references() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.add(&mut pool, 1, Some(3), false);
        relation.add(&mut pool, 3, Some(1), true);

        let mut freed = Vec::new();
        let mut on_free = |object: &u32| freed.push(*object);
        relation.erase(&mut pool, &1, None, EraseMode::Unlink, Some(&mut on_free));

        assert_eq!(freed, vec![1]);
        assert!(related(&relation, &pool, 1).is_empty());
        assert!(related(&relation, &pool, 2).is_empty());
        assert!(related(&relation, &pool, 3).is_empty());
    }

    #[test]
    fn test_erase_unlink_single_edge_keeps_other_outgoing() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.add(&mut pool, 1, Some(3), false);

        relation.erase(&mut pool, &1, Some(&2), EraseMode::Unlink, None);

        assert_eq!(related(&relation, &pool, 1), vec![3]);
        assert!(related(&relation, &pool, 2).is_empty());
        assert!(related(&relation, &pool, 3).is_empty());
    }

    #[test]
    fn test_replace_rewrites_references_and_moves_head() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(2), false);
        relation.add(&mut pool, 4, Some(2), true);

        relation.replace(&mut pool, &2, 20, false);

        assert_eq!(related(&relation, &pool, 1), vec![20]);
        assert_eq!(related(&relation, &pool, 4), vec![20]);
        assert_eq!(related(&relation, &pool, 20), vec![1]);
        assert!(relation.find(&pool, &2, None).is_none());
    }

    #[test]
    fn test_replace_merges_into_existing_head() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(5), true);
        relation.add(&mut pool, 2, Some(6), true);

        relation.replace(&mut pool, &1, 2, false);

        assert_eq!(related(&relation, &pool, 2), vec![6, 5]);
        assert!(relation.find(&pool, &1, None).is_none());
    }

    #[test]
    fn test_replace_no_reverse_keeps_old_head() {
        let mut pool = RelationPool::new(8);
        let mut relation = Relation::new();
        relation.add(&mut pool, 1, Some(5), true);

        relation.replace(&mut pool, &1, 2, true);
        assert_eq!(related(&relation, &pool, 1), vec![5]);
        assert!(relation.find(&pool, &2, None).is_none());
    }

    #[test]
    fn test_clear_returns_nodes() {
        let mut pool = RelationPool::new(4);
        let mut relation = Relation::new();
        for n in 0..10 {
            relation.add(&mut pool, n, Some(n + 1), false);
        }
        let chunks = pool.chunk_count();
        relation.clear(&mut pool);

        assert!(relation.is_empty());
        assert!(pool.is_empty());
        for n in 0..10 {
            relation.add(&mut pool, n, Some(n + 1), false);
        }
        assert_eq!(pool.chunk_count(), chunks);
    }

    #[test]
    fn test_erase_mode_codes() {
        assert_eq!(EraseMode::from_code(0), Some(EraseMode::Mirror));
        assert_eq!(EraseMode::from_code(1), Some(EraseMode::Keep));
        assert_eq!(EraseMode::from_code(-1), Some(EraseMode::Unlink));
        assert_eq!(EraseMode::from_code(2), None);
    }
}
