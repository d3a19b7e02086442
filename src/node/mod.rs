//! Tree nodes and the operations on them.
//!
//! Every node stores its full key from the root. The part of the key that
//! belongs to a node itself is what follows the key of its parent, and the
//! child for a byte `b` of a node with key `k` is the child whose key starts
//! with `k` followed by `b`. Since the key does not depend on the parent, a
//! node can move to a different parent on split or collapse without being
//! rebuilt.
use std::{fmt, sync::Arc};

use anyhow::ensure;

use crate::{key::Key, txn::Txn, util::Hex};

mod edges;
pub(crate) mod merge;

pub(crate) use edges::Edges;
#[cfg(feature = "internals")]
pub use merge::Side;

/// A shared reference to a node
pub type NodeRef<V> = Arc<Node<V>>;

/// Generation of nodes that no transaction may modify
pub(crate) const FROZEN: u64 = 0;

pub struct Node<V> {
    pub(crate) key: Key,
    pub(crate) value: Option<V>,
    pub(crate) edges: Edges<V>,
    /// The transaction that created this node, see [Txn::is_mutable]
    pub(crate) generation: u64,
}

/// Result of removing a key below a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The key was not there, the slot is unchanged
    Missing,
    /// The slot holds an updated node
    Updated,
    /// Nothing is left, the caller must drop the slot
    Removed,
}

impl<V> Node<V> {
    /// A frozen node with the given children, which must be valid children of
    /// the new node
    #[cfg_attr(feature = "internals", visibility::make(pub))]
    pub(crate) fn new(key: &[u8], value: Option<V>, children: Vec<NodeRef<V>>) -> NodeRef<V> {
        Arc::new(Self {
            key: Key::new(key),
            value,
            edges: children.into(),
            generation: FROZEN,
        })
    }

    /// A single frozen node without children
    pub fn leaf(key: &[u8], value: V) -> NodeRef<V> {
        Self::new(key, Some(value), Vec::new())
    }

    /// A placeholder to be filled in later by its owner
    pub(crate) fn blank(key: Key, generation: u64) -> Self {
        Self {
            key,
            value: None,
            edges: Edges::default(),
            generation,
        }
    }

    /// The full key of this node
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Children in key order
    pub fn children(&self) -> &[NodeRef<V>] {
        &self.edges
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let mut node = self;
        let mut depth = 0;
        loop {
            let end = node.key.len();
            if key.len() < end || node.key[depth..] != key[depth..end] {
                return None;
            }
            if key.len() == end {
                return node.value.as_ref();
            }
            depth = end;
            node = &**node.edges.get(key[depth], depth)?;
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Call `f` for every key with a value, in key order. When `f` returns
    /// false the keys below that key are skipped, and the walk goes on with
    /// the next sibling.
    pub fn walk(&self, mut f: impl FnMut(&[u8], &V) -> bool) {
        self.walk0(&mut f)
    }

    fn walk0(&self, f: &mut impl FnMut(&[u8], &V) -> bool) {
        if let Some(value) = &self.value {
            if !f(self.key.as_slice(), value) {
                return;
            }
        }
        for child in self.edges.iter() {
            child.walk0(f);
        }
    }

    /// Call `f` for every key with a value, in key order, until it returns
    /// false. Returns false if the walk was stopped.
    pub fn walk_until(&self, mut f: impl FnMut(&[u8], &V) -> bool) -> bool {
        self.walk_until0(&mut f)
    }

    fn walk_until0(&self, f: &mut impl FnMut(&[u8], &V) -> bool) -> bool {
        if let Some(value) = &self.value {
            if !f(self.key.as_slice(), value) {
                return false;
            }
        }
        self.edges.iter().all(|child| child.walk_until0(f))
    }

    /// Iterate over all keys with a value, in key order
    pub fn iter(&self) -> Iter<'_, V> {
        Iter { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including nodes without a value
    pub fn count(&self) -> usize {
        1 + self.edges.iter().map(|child| child.count()).sum::<usize>()
    }

    /// Check the structural invariants of this subtree
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate0(None)
    }

    fn validate0(&self, parent: Option<&[u8]>) -> anyhow::Result<()> {
        if let Some(parent) = parent {
            ensure!(
                self.key.len() > parent.len() && self.key.starts_with(parent),
                "key {} does not extend the key of its parent {}",
                Hex::key(&self.key),
                Hex::key(parent)
            );
        }
        ensure!(
            self.value.is_some() || self.edges.len() > 1,
            "node {} without value has {} children",
            Hex::key(&self.key),
            self.edges.len()
        );
        let depth = self.key.len();
        for child in self.edges.iter() {
            child.validate0(Some(self.key.as_slice()))?;
        }
        for pair in self.edges.windows(2) {
            ensure!(
                pair[0].key.at(depth) < pair[1].key.at(depth),
                "children of {} out of order",
                Hex::key(&self.key)
            );
        }
        Ok(())
    }
}

impl<V: Clone + PartialEq> Node<V> {
    /// Set `key` to `value` in the tree in `slot`
    pub(crate) fn put(slot: &mut NodeRef<V>, txn: &mut Txn<V>, depth: usize, key: &[u8], value: V) {
        let (d, is_prefix) = slot.key.common_prefix_len(key, depth);
        if !is_prefix {
            // the key ends or diverges within the key of this node
            let leaf = txn.new_node(Key::new(key), Some(value), Edges::default());
            merge::split(slot, txn, d, leaf, false);
            return;
        }
        if d == key.len() {
            Self::set(slot, txn, value);
            return;
        }
        let label = key[d];
        if let Some(node) = txn.mutable(slot) {
            match node.edges.find(label, d) {
                Ok(i) => Self::put(node.edges.get_mut(i), txn, d + 1, key, value),
                Err(i) => {
                    let leaf = txn.new_node(Key::new(key), Some(value), Edges::default());
                    node.edges.insert_in_place(i, leaf);
                }
            }
            return;
        }
        let edges = match slot.edges.find(label, d) {
            Ok(i) => {
                let mut child = slot.edges[i].clone();
                Self::put(&mut child, txn, d + 1, key, value);
                if Arc::ptr_eq(&child, &slot.edges[i]) {
                    return;
                }
                slot.edges.insert(txn, i, 1, child)
            }
            Err(i) => {
                let leaf = txn.new_node(Key::new(key), Some(value), Edges::default());
                slot.edges.insert(txn, i, 0, leaf)
            }
        };
        *slot = txn.new_node(slot.key.clone(), slot.value.clone(), edges);
    }

    fn set(slot: &mut NodeRef<V>, txn: &mut Txn<V>, value: V) {
        if slot.value.as_ref() == Some(&value) {
            return;
        }
        if let Some(node) = txn.mutable(slot) {
            node.value = Some(value);
            return;
        }
        *slot = txn.new_node(slot.key.clone(), Some(value), slot.edges.clone());
    }

    /// Remove `key` from the tree in `slot`
    pub(crate) fn delete(slot: &mut NodeRef<V>, txn: &mut Txn<V>, depth: usize, key: &[u8]) -> Removal {
        let (d, is_prefix) = slot.key.common_prefix_len(key, depth);
        if !is_prefix {
            return Removal::Missing;
        }
        if d == key.len() {
            return Self::delete_value(slot, txn);
        }
        let label = key[d];
        if let Some(node) = txn.mutable(slot) {
            let i = match node.edges.find(label, d) {
                Ok(i) => i,
                Err(_) => return Removal::Missing,
            };
            match Self::delete(node.edges.get_mut(i), txn, d + 1, key) {
                Removal::Removed => {
                    node.edges.remove_in_place(i);
                }
                other => return other,
            }
            if node.value.is_some() || node.edges.len() > 1 {
                return Removal::Updated;
            }
            return match node.edges.pop() {
                Some(only) => {
                    *slot = only;
                    Removal::Updated
                }
                None => Removal::Removed,
            };
        }
        let i = match slot.edges.find(label, d) {
            Ok(i) => i,
            Err(_) => return Removal::Missing,
        };
        let mut child = slot.edges[i].clone();
        let edges = match Self::delete(&mut child, txn, d + 1, key) {
            Removal::Missing => return Removal::Missing,
            Removal::Updated => slot.edges.insert(txn, i, 1, child),
            Removal::Removed => slot.edges.cut(txn, i, 1),
        };
        if slot.value.is_none() && edges.len() < 2 {
            // a node without value needs at least two children
            return match edges.into_single() {
                Some(only) => {
                    *slot = only;
                    Removal::Updated
                }
                None => Removal::Removed,
            };
        }
        *slot = txn.new_node(slot.key.clone(), slot.value.clone(), edges);
        Removal::Updated
    }

    fn delete_value(slot: &mut NodeRef<V>, txn: &mut Txn<V>) -> Removal {
        if slot.value.is_none() {
            return Removal::Missing;
        }
        match slot.edges.len() {
            0 => Removal::Removed,
            1 => {
                let only = slot.edges[0].clone();
                *slot = only;
                Removal::Updated
            }
            _ => {
                if let Some(node) = txn.mutable(slot) {
                    node.value = None;
                } else {
                    *slot = txn.new_node(slot.key.clone(), None, slot.edges.clone());
                }
                Removal::Updated
            }
        }
    }

    /// A copy of this tree that shares no nodes with it.
    ///
    /// All nodes are allocated up front, before the copy starts, and are used
    /// in depth first order. Every node is still a separate allocation.
    pub fn dense_copy(&self) -> NodeRef<V> {
        crate::dense::dense_copy(self)
    }
}

/// Structural equality. Shared subtrees are not descended into.
impl<V: PartialEq> PartialEq for Node<V> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.key == other.key
            && self.value == other.value
            && self.edges.len() == other.edges.len()
            && self
                .edges
                .iter()
                .zip(other.edges.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl<V: Eq> Eq for Node<V> {}

impl<V: fmt::Debug> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("key", &Hex::key(&self.key));
        if let Some(value) = &self.value {
            s.field("value", value);
        }
        if !self.edges.is_empty() {
            s.field("children", &&self.edges[..]);
        }
        s.finish()
    }
}

/// Iterator over the keys and values of a tree, in key order
pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iter<'a, V> {
    pub(crate) fn empty() -> Self {
        Self { stack: Vec::new() }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.edges.iter().rev().map(|child| &**child));
            if let Some(value) = &node.value {
                return Some((node.key.as_slice(), value));
            }
        }
        None
    }
}
