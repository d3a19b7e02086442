use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::{debug, trace};

use crate::{
    arena::Arena,
    key::Key,
    node::{Edges, Node, NodeRef, Removal},
    scratch::{ScratchPool, Table},
    Tree,
};

/// Capacity of the edge buffers kept in the edge arena
const EDGE_SLOTS: usize = 4;
/// Number of edge buffers added when the edge arena runs dry
const EDGE_REFILL: usize = 64;

/// Source of transaction generations. Generation 0 is never handed out.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A batch of changes to a tree.
///
/// Nodes created by a transaction belong to it and are changed in place by
/// later operations of the same transaction, as long as nothing else holds a
/// reference to them. All other nodes are copied on write. The tree the
/// transaction was started from, and any [Tree] obtained from it earlier, is
/// never modified.
pub struct Txn<V> {
    root: Option<NodeRef<V>>,
    generation: u64,
    nodes: Arena<NodeRef<V>>,
    edges: Arena<Edges<V>>,
    /// set once preallocation was requested, enables refilling of the edge arena
    refill_edges: bool,
    pool: Option<Arc<ScratchPool<V>>>,
}

/// Allocation counters of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnStats {
    /// Nodes taken from the node arena
    pub arena_nodes: usize,
    /// Nodes allocated on the heap because the node arena was empty
    pub heap_nodes: usize,
    /// Edge buffers taken from the edge arena
    pub arena_edges: usize,
    /// Node slots that were preallocated but not used so far
    pub unused_nodes: usize,
}

impl<V> Txn<V> {
    /// True if `node` was created by this transaction and is not shared
    #[cfg_attr(feature = "internals", visibility::make(pub))]
    pub(crate) fn is_mutable(&self, node: &NodeRef<V>) -> bool {
        node.generation == self.generation && Arc::strong_count(node) == 1
    }

    /// Mutable access to `node` if it may be changed in place
    pub(crate) fn mutable<'a>(&self, node: &'a mut NodeRef<V>) -> Option<&'a mut Node<V>> {
        if !self.is_mutable(node) {
            return None;
        }
        Arc::get_mut(node)
    }

    pub fn stats(&self) -> TxnStats {
        TxnStats {
            arena_nodes: self.nodes.handed_out(),
            heap_nodes: self.nodes.misses(),
            arena_edges: self.edges.handed_out(),
            unused_nodes: self.nodes.remaining(),
        }
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&V> {
        self.root.as_ref()?.get(key.as_ref())
    }

    /// The current state of the transaction as a tree.
    ///
    /// The transaction continues, but copies every node the snapshot can see
    /// before changing it.
    pub fn snapshot(&self) -> Tree<V> {
        Tree::from(self.root.clone())
    }
}

impl<V: Clone + PartialEq> Txn<V> {
    pub fn new(tree: Tree<V>) -> Self {
        Self {
            root: tree.into_root(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            nodes: Arena::default(),
            edges: Arena::default(),
            refill_edges: false,
            pool: None,
        }
    }

    /// A transaction that takes its merge scratch tables from `pool`
    pub fn with_pool(tree: Tree<V>, pool: Arc<ScratchPool<V>>) -> Self {
        let mut txn = Self::new(tree);
        txn.pool = Some(pool);
        txn
    }

    /// Preallocate nodes and edge buffers for about `expected_ops` changes.
    ///
    /// This only moves allocations ahead of the changes. Each node and edge
    /// buffer is still allocated on its own, they are not packed together.
    pub fn prealloc(&mut self, expected_ops: usize) {
        trace!("txn {}: prealloc {}", self.generation, expected_ops);
        let key = Key::empty();
        let generation = self.generation;
        self.nodes.reserve_with(expected_ops, || {
            Arc::new(Node::blank(key.clone(), generation))
        });
        self.edges.reserve_with(expected_ops.saturating_sub(1), || {
            Edges::with_capacity(EDGE_SLOTS)
        });
        self.refill_edges = true;
    }

    pub fn put(&mut self, key: impl AsRef<[u8]>, value: V) {
        let key = key.as_ref();
        match self.root.take() {
            Some(mut root) => {
                Node::put(&mut root, self, 0, key, value);
                self.root = Some(root);
            }
            None => {
                let leaf = self.new_node(Key::new(key), Some(value), Edges::default());
                self.root = Some(leaf);
            }
        }
    }

    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        if let Some(mut root) = self.root.take() {
            match Node::delete(&mut root, self, 0, key.as_ref()) {
                Removal::Removed => {}
                Removal::Missing | Removal::Updated => self.root = Some(root),
            }
        }
    }

    /// Merge `other` into this transaction. Where both trees have a value for
    /// the same key, the value of `other` wins.
    pub fn merge(&mut self, other: &Tree<V>) {
        self.merge0(other, false)
    }

    /// Merge `other` into this transaction, keeping the existing value where
    /// both trees have one for the same key.
    pub fn merge_reverse(&mut self, other: &Tree<V>) {
        self.merge0(other, true)
    }

    fn merge0(&mut self, other: &Tree<V>, reverse: bool) {
        let b = match other.root() {
            Some(b) => b.clone(),
            None => return,
        };
        match self.root.take() {
            Some(mut root) => {
                crate::node::merge::merge_nodes(&mut root, self, 0, b, reverse);
                self.root = Some(root);
            }
            None => self.root = Some(b),
        }
    }

    pub fn commit(mut self) -> Tree<V> {
        let unused = self.nodes.release();
        self.edges.release();
        let stats = self.stats();
        debug!(
            "txn {}: commit, {} arena nodes, {} heap nodes, {} arena edges, {} unused",
            self.generation, stats.arena_nodes, stats.heap_nodes, stats.arena_edges, unused
        );
        Tree::from(self.root.take())
    }

    /// A node owned by this transaction
    pub(crate) fn new_node(&mut self, key: Key, value: Option<V>, edges: Edges<V>) -> NodeRef<V> {
        match self.nodes.alloc() {
            Some(mut node) => {
                let slot = Arc::get_mut(&mut node).expect("arena nodes are never shared");
                slot.key = key;
                slot.value = value;
                slot.edges = edges;
                node
            }
            None => Arc::new(Node {
                key,
                value,
                edges,
                generation: self.generation,
            }),
        }
    }

    /// An empty edge buffer with room for at least `n` children
    pub(crate) fn new_edges(&mut self, n: usize) -> Edges<V> {
        if n <= EDGE_SLOTS {
            if self.refill_edges && self.edges.remaining() == 0 {
                self.edges
                    .reserve_with(EDGE_REFILL, || Edges::with_capacity(EDGE_SLOTS));
            }
            if let Some(edges) = self.edges.alloc() {
                return edges;
            }
        }
        Edges::with_capacity(n)
    }

    pub(crate) fn take_scratch(&mut self) -> Table<V> {
        self.pool.get_or_insert_with(Default::default).take()
    }

    pub(crate) fn give_scratch(&mut self, table: Table<V>) {
        if let Some(pool) = &self.pool {
            pool.give(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radixtree;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn generations_are_unique() {
        let a = Txn::<u8>::new(Tree::empty());
        let b = Txn::<u8>::new(Tree::empty());
        assert_ne!(a.generation, b.generation);
        assert_ne!(a.generation, crate::node::FROZEN);
    }

    #[test]
    fn own_nodes_are_mutable() {
        let mut txn = Txn::new(Tree::empty());
        let own = txn.new_node(Key::new(b"a"), Some(1), Edges::default());
        assert!(txn.is_mutable(&own));
        let shared = own.clone();
        assert!(!txn.is_mutable(&own));
        drop(shared);
        let other = Txn::new(Tree::empty());
        assert!(!other.is_mutable(&own));
        assert!(!txn.is_mutable(&Node::leaf(b"a", 1)));
    }

    #[test]
    fn put_in_place() {
        init_logger();
        let mut txn = Txn::new(Tree::empty());
        txn.put("foo", 1);
        let root = txn.root.as_ref().map(|r| Arc::as_ptr(r));
        txn.put("foo", 2);
        txn.put("foobar", 3);
        // the root was updated in place both times
        assert_eq!(txn.root.as_ref().map(|r| Arc::as_ptr(r)), root);
        assert_eq!(txn.get("foo"), Some(&2));
        assert_eq!(txn.get("foobar"), Some(&3));
        let tree = txn.commit();
        tree.validate().unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn inherited_tree_is_untouched() {
        let before = radixtree! { "food" => 1, "foot" => 2 };
        let mut txn = Txn::new(before.clone());
        txn.put("food", 3);
        txn.put("fool", 4);
        txn.delete("foot");
        let after = txn.commit();
        assert_eq!(before, radixtree! { "food" => 1, "foot" => 2 });
        assert_eq!(after, radixtree! { "food" => 3, "fool" => 4 });
    }

    #[test]
    fn snapshot_is_frozen() {
        let mut txn = Txn::new(Tree::empty());
        txn.put("a1", 1);
        txn.put("a2", 2);
        let snapshot = txn.snapshot();
        txn.put("a1", 3);
        txn.put("a3", 4);
        txn.delete("a2");
        assert_eq!(snapshot, radixtree! { "a1" => 1, "a2" => 2 });
        assert_eq!(txn.commit(), radixtree! { "a1" => 3, "a3" => 4 });
    }

    #[test]
    fn prealloc_feeds_new_nodes() {
        init_logger();
        let mut txn = Txn::new(Tree::empty());
        txn.prealloc(10);
        assert_eq!(txn.stats().unused_nodes, 10);
        for key in ["a", "ab", "ac", "b"] {
            txn.put(key, 0u32);
        }
        let stats = txn.stats();
        assert_eq!(stats.heap_nodes, 0);
        assert_eq!(stats.arena_nodes + stats.unused_nodes, 10);
        assert!(stats.arena_edges > 0);
        let tree = txn.commit();
        tree.validate().unwrap();
        assert_eq!(tree.iter().count(), 4);
    }

    #[test]
    fn heap_fallback_is_counted() {
        let mut txn = Txn::new(Tree::empty());
        txn.prealloc(1);
        txn.put("a", 0u32);
        txn.put("b", 1);
        let stats = txn.stats();
        assert_eq!(stats.arena_nodes, 1);
        assert!(stats.heap_nodes >= 1);
    }

    #[test]
    fn shared_scratch_pool() {
        let pool = Arc::new(ScratchPool::new(2));
        let a = radixtree! { "a1" => 1, "a2" => 2, "b" => 3 };
        let b = radixtree! { "a1" => 4, "a3" => 5, "c" => 6 };
        let mut txn = Txn::with_pool(a, pool.clone());
        txn.merge(&b);
        let merged = txn.commit();
        assert!(pool.idle() >= 1);
        assert_eq!(
            merged,
            radixtree! { "a1" => 4, "a2" => 2, "a3" => 5, "b" => 3, "c" => 6 }
        );
    }

    #[test]
    fn merge_into_empty_adopts() {
        let other = radixtree! { "x" => 1 };
        let mut txn = Txn::new(Tree::empty());
        txn.merge(&other);
        assert!(txn.commit().ptr_eq(&other));
        let mut txn = Txn::new(other.clone());
        txn.merge(&Tree::empty());
        assert!(txn.commit().ptr_eq(&other));
    }
}
