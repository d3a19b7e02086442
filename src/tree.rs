use std::{fmt, sync::Arc};

use crate::{
    node::{Iter, NodeRef},
    scratch::ScratchPool,
    txn::Txn,
    util::Hex,
};

/// A persistent map from byte strings to values.
///
/// A tree is a cheap handle to an immutable root node. Changing a tree
/// produces a new tree that shares all unchanged subtrees with the old one.
/// Use a [Txn] to apply many changes at once.
pub struct Tree<V> {
    root: Option<NodeRef<V>>,
}

impl<V> Tree<V> {
    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn new(root: NodeRef<V>) -> Self {
        Self { root: Some(root) }
    }

    pub fn root(&self) -> Option<&NodeRef<V>> {
        self.root.as_ref()
    }

    pub fn into_root(self) -> Option<NodeRef<V>> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of keys with a value
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&V> {
        self.root.as_ref()?.get(key.as_ref())
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Call `f` for every key with a value, in key order. When `f` returns
    /// false the keys below that key are skipped.
    pub fn walk(&self, f: impl FnMut(&[u8], &V) -> bool) {
        if let Some(root) = &self.root {
            root.walk(f)
        }
    }

    /// Call `f` for every key with a value, in key order, until it returns
    /// false. Returns false if the walk was stopped.
    pub fn walk_until(&self, f: impl FnMut(&[u8], &V) -> bool) -> bool {
        match &self.root {
            Some(root) => root.walk_until(f),
            None => true,
        }
    }

    pub fn iter(&self) -> Iter<'_, V> {
        match &self.root {
            Some(root) => root.iter(),
            None => Iter::empty(),
        }
    }

    /// True if both trees have the very same root
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Check the structural invariants of the tree
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.root {
            Some(root) => root.validate(),
            None => Ok(()),
        }
    }
}

impl<V: Clone + PartialEq> Tree<V> {
    /// Start a transaction on this tree
    pub fn txn(&self) -> Txn<V> {
        Txn::new(self.clone())
    }

    /// A tree with `key` set to `value`. Returns the same tree if `key`
    /// already has an equal value.
    pub fn put(&self, key: impl AsRef<[u8]>, value: V) -> Self {
        let mut txn = self.txn();
        txn.put(key, value);
        txn.commit()
    }

    /// A tree without `key`. Returns the same tree if `key` has no value.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Self {
        let mut txn = self.txn();
        txn.delete(key);
        txn.commit()
    }

    /// Union of two trees. Where both have a value for a key, the value in
    /// `other` wins.
    ///
    /// Every call uses fresh scratch tables. Use [Tree::merge_with_pool] to
    /// reuse them across many merges.
    pub fn merge(&self, other: &Self) -> Self {
        let mut txn = self.txn();
        txn.merge(other);
        txn.commit()
    }

    /// Union of two trees. Where both have a value for a key, the value in
    /// `self` wins.
    pub fn merge_reverse(&self, other: &Self) -> Self {
        let mut txn = self.txn();
        txn.merge_reverse(other);
        txn.commit()
    }

    /// [Tree::merge] taking its scratch tables from `pool`
    pub fn merge_with_pool(&self, other: &Self, pool: &Arc<ScratchPool<V>>) -> Self {
        let mut txn = Txn::with_pool(self.clone(), pool.clone());
        txn.merge(other);
        txn.commit()
    }

    /// [Tree::merge_reverse] taking its scratch tables from `pool`
    pub fn merge_reverse_with_pool(&self, other: &Self, pool: &Arc<ScratchPool<V>>) -> Self {
        let mut txn = Txn::with_pool(self.clone(), pool.clone());
        txn.merge_reverse(other);
        txn.commit()
    }

    /// An equal tree that shares no nodes with this one, see [Node::dense_copy](crate::Node::dense_copy)
    pub fn dense_copy(&self) -> Self {
        Self {
            root: self.root.as_ref().map(|root| root.dense_copy()),
        }
    }
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> From<Option<NodeRef<V>>> for Tree<V> {
    fn from(root: Option<NodeRef<V>>) -> Self {
        Self { root }
    }
}

impl<V> From<NodeRef<V>> for Tree<V> {
    fn from(root: NodeRef<V>) -> Self {
        Self::new(root)
    }
}

/// Structural equality, sharing is ignored
impl<V: PartialEq> PartialEq for Tree<V> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<V: Eq> Eq for Tree<V> {}

impl<V: fmt::Debug> fmt::Debug for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (Hex::key(k), v)))
            .finish()
    }
}

impl<'a, V> IntoIterator for &'a Tree<V> {
    type Item = (&'a [u8], &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: AsRef<[u8]>, V: Clone + PartialEq> FromIterator<(K, V)> for Tree<V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut txn = Txn::new(Tree::empty());
        txn.prealloc(iter.size_hint().0);
        for (key, value) in iter {
            txn.put(key, value);
        }
        txn.commit()
    }
}

impl<V: Clone + PartialEq> Extend<(Vec<u8>, V)> for Tree<V> {
    fn extend<T: IntoIterator<Item = (Vec<u8>, V)>>(&mut self, iter: T) {
        let mut txn = self.txn();
        for (key, value) in iter {
            txn.put(key, value);
        }
        *self = txn.commit();
    }
}
