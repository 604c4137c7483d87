//! Chunked node pool backing every [`Relation`](crate::Relation).
//!
//! Nodes are carved out of fixed-size chunks and addressed by [`NodeId`]
//! handles. Freed nodes go onto an intrusive free list and are handed out
//! again before any new chunk is allocated, so node reuse is O(1) and a pool
//! never shrinks until it is dropped.
//!
//! # Examples
//!
//! ```rust
//! use tabula_relation::RelationPool;
//!
//! let mut pool = RelationPool::new(4);
//! let a = pool.alloc("users", None);
//! let b = pool.alloc("posts", Some(a));
//!
//! let chain: Vec<_> = pool.chain(Some(b)).map(|(_, object)| *object).collect();
//! assert_eq!(chain, ["posts", "users"]);
//!
//! pool.free(b);
//! pool.free(a);
//! assert_eq!(pool.len(), 0);
//! assert_eq!(pool.chunk_count(), 1);
//! ```

use tracing::trace;

/// Default number of nodes carved per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Handle of a node living in a [`RelationPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the raw index of this node inside its pool.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single link of a relation chain.
///
/// Heads of a [`Relation`](crate::Relation) are `RelationNode`s too: their
/// `object` is the *from* object and `next` points at the first related
/// object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationNode<T> {
    pub(crate) object: T,
    pub(crate) next: Option<NodeId>,
}

impl<T> RelationNode<T> {
    /// Create a detached node.
    pub fn new(object: T, next: Option<NodeId>) -> Self {
        Self { object, next }
    }

    /// The object this node refers to.
    pub fn object(&self) -> &T {
        &self.object
    }

    /// The next node of the chain, if any.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Check whether this node has no successor.
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

impl<T: PartialEq> RelationNode<T> {
    /// Find `object` in the chain that follows this node.
    ///
    /// The returned [`ChainMatch`] carries the predecessor of the match so the
    /// caller can unlink it in O(1). A predecessor of `None` means the match is
    /// the first node after `self`.
    pub fn find(&self, pool: &RelationPool<T>, object: &T) -> Option<ChainMatch> {
        pool.find_in_chain(self.next, object)
    }
}

/// Position of a node found by a chain scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainMatch {
    /// The matching node.
    pub node: NodeId,
    /// The node linking to `node`, or `None` when `node` starts the chain.
    pub prev: Option<NodeId>,
}

#[derive(Debug)]
enum Slot<T> {
    Used(RelationNode<T>),
    Free(Option<NodeId>),
}

/// Chunked allocator of [`RelationNode`]s.
///
/// A pool is shared by any number of graphs. Graphs never own it: every graph
/// operation borrows the pool, so it necessarily outlives the graphs using it.
/// Dropping a graph without calling [`Relation::clear`](crate::Relation::clear)
/// leaves its nodes allocated until the pool itself is dropped.
///
/// # Thread Safety
///
/// `RelationPool` is not synchronized. Each migration pipeline should own its
/// own pool.
#[derive(Debug)]
pub struct RelationPool<T> {
    chunks: Vec<Vec<Slot<T>>>,
    chunk_size: usize,
    free_head: Option<NodeId>,
    in_use: usize,
}

impl<T> RelationPool<T> {
    /// Create a pool carving `chunk_size` nodes per chunk.
    ///
    /// No chunk is allocated until the first [`alloc`](Self::alloc).
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size: chunk_size.max(1),
            free_head: None,
            in_use: 0,
        }
    }

    /// Number of nodes carved per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks allocated so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of nodes currently handed out.
    pub fn len(&self) -> usize {
        self.in_use
    }

    /// Check whether no node is currently handed out.
    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// Total number of nodes the allocated chunks can hold.
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    /// Allocate a node holding `object` and linking to `next`.
    pub fn alloc(&mut self, object: T, next: Option<NodeId>) -> NodeId {
        let node = RelationNode::new(object, next);
        self.in_use += 1;

        if let Some(id) = self.free_head {
            let (chunk, pos) = self.locate(id);
            let slot = &mut self.chunks[chunk][pos];
            if let Slot::Free(next_free) = slot {
                self.free_head = *next_free;
            }
            *slot = Slot::Used(node);
            return id;
        }

        let needs_chunk = self
            .chunks
            .last()
            .is_none_or(|chunk| chunk.len() == self.chunk_size);
        if needs_chunk {
            self.chunks.push(Vec::with_capacity(self.chunk_size));
            trace!(
                chunks = self.chunks.len(),
                chunk_size = self.chunk_size,
                "RelationPool grew"
            );
        }

        let chunk_index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_index];
        let id = NodeId(chunk_index * self.chunk_size + chunk.len());
        chunk.push(Slot::Used(node));
        id
    }

    /// Return a node to the free list, handing back the object it held.
    ///
    /// Freeing a node that is already free is a no-op returning `None`.
    pub fn free(&mut self, id: NodeId) -> Option<T> {
        let (chunk, pos) = self.locate(id);
        let slot = self.chunks.get_mut(chunk)?.get_mut(pos)?;
        if matches!(slot, Slot::Free(_)) {
            return None;
        }

        let old = std::mem::replace(slot, Slot::Free(self.free_head));
        self.free_head = Some(id);
        self.in_use -= 1;
        match old {
            Slot::Used(node) => Some(node.object),
            Slot::Free(_) => None,
        }
    }

    /// Get a node by handle.
    pub fn get(&self, id: NodeId) -> Option<&RelationNode<T>> {
        let (chunk, pos) = self.locate(id);
        match self.chunks.get(chunk)?.get(pos)? {
            Slot::Used(node) => Some(node),
            Slot::Free(_) => None,
        }
    }

    /// Get a mutable node by handle.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RelationNode<T>> {
        let (chunk, pos) = self.locate(id);
        match self.chunks.get_mut(chunk)?.get_mut(pos)? {
            Slot::Used(node) => Some(node),
            Slot::Free(_) => None,
        }
    }

    /// Iterate over the chain starting at `start`.
    pub fn chain(&self, start: Option<NodeId>) -> Chain<'_, T> {
        Chain {
            pool: self,
            cursor: start,
        }
    }

    /// Free every node of the chain starting at `start`.
    pub(crate) fn free_chain(&mut self, start: Option<NodeId>) -> Vec<T> {
        let mut objects = Vec::new();
        let mut cursor = start;
        while let Some(id) = cursor {
            cursor = self.get(id).and_then(|node| node.next);
            if let Some(object) = self.free(id) {
                objects.push(object);
            }
        }
        objects
    }

    fn locate(&self, id: NodeId) -> (usize, usize) {
        let index = id.index();
        (index / self.chunk_size, index % self.chunk_size)
    }
}

impl<T: PartialEq> RelationPool<T> {
    /// Linear scan of the chain starting at `start` for `object`.
    pub fn find_in_chain(&self, start: Option<NodeId>, object: &T) -> Option<ChainMatch> {
        let mut prev = None;
        for (id, candidate) in self.chain(start) {
            if candidate == object {
                return Some(ChainMatch { node: id, prev });
            }
            prev = Some(id);
        }
        None
    }
}

impl<T> Default for RelationPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// Iterator over a pooled chain, yielding each node handle and its object.
pub struct Chain<'a, T> {
    pool: &'a RelationPool<T>,
    cursor: Option<NodeId>,
}

impl<'a, T> Iterator for Chain<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.pool.get(id)?;
        self.cursor = node.next;
        Some((id, &node.object))
    }
}
