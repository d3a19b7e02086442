use std::{ops::Deref, sync::Arc};

use super::{merge, merge::Side, NodeRef};
use crate::txn::Txn;

/// The children of a node, ordered by the byte each child key has at the
/// depth of the parent.
pub(crate) struct Edges<V>(Vec<NodeRef<V>>);

impl<V> Default for Edges<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Clone for Edges<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V> Deref for Edges<V> {
    type Target = [NodeRef<V>];

    fn deref(&self) -> &[NodeRef<V>] {
        &self.0
    }
}

impl<V> From<Vec<NodeRef<V>>> for Edges<V> {
    fn from(children: Vec<NodeRef<V>>) -> Self {
        Self(children)
    }
}

impl<V> Edges<V> {
    pub fn with_capacity(n: usize) -> Self {
        Self(Vec::with_capacity(n))
    }

    /// Index of the first child whose byte at `depth` is not less than `label`
    pub fn search(&self, label: u8, depth: usize) -> usize {
        self.0.partition_point(|child| child.key.at(depth) < label)
    }

    /// `Ok` with the index of the child for `label`, or `Err` with the index
    /// where such a child would be inserted
    pub fn find(&self, label: u8, depth: usize) -> Result<usize, usize> {
        let i = self.search(label, depth);
        match self.0.get(i) {
            Some(child) if child.key.at(depth) == label => Ok(i),
            _ => Err(i),
        }
    }

    pub fn get(&self, label: u8, depth: usize) -> Option<&NodeRef<V>> {
        self.find(label, depth).ok().map(|i| &self.0[i])
    }

    pub fn get_mut(&mut self, i: usize) -> &mut NodeRef<V> {
        &mut self.0[i]
    }

    pub fn push(&mut self, node: NodeRef<V>) {
        self.0.push(node)
    }

    pub fn pop(&mut self) -> Option<NodeRef<V>> {
        self.0.pop()
    }

    pub fn insert_in_place(&mut self, i: usize, node: NodeRef<V>) {
        self.0.insert(i, node)
    }

    pub fn remove_in_place(&mut self, i: usize) -> NodeRef<V> {
        self.0.remove(i)
    }

    pub fn into_single(mut self) -> Option<NodeRef<V>> {
        assert!(self.0.len() <= 1, "more than one child");
        self.0.pop()
    }
}

impl<V: Clone + PartialEq> Edges<V> {
    /// A new edge set where the `skip` children at `i` are replaced by `node`
    pub fn insert(&self, txn: &mut Txn<V>, i: usize, skip: usize, node: NodeRef<V>) -> Self {
        assert!(!node.key.is_empty(), "child with empty key");
        let mut edges = txn.new_edges(self.len() + 1 - skip);
        edges.0.extend_from_slice(&self[..i]);
        edges.0.push(node);
        edges.0.extend_from_slice(&self[i + skip..]);
        edges
    }

    /// A new edge set without the `n` children at `i`
    pub fn cut(&self, txn: &mut Txn<V>, i: usize, n: usize) -> Self {
        let mut edges = txn.new_edges(self.len() - n);
        edges.0.extend_from_slice(&self[..i]);
        edges.0.extend_from_slice(&self[i + n..]);
        edges
    }

    /// Adds `node` as a child, merging it into an existing child with the same
    /// byte at `depth`. Returns `None` if the edge set is unchanged.
    pub fn add(
        &self,
        txn: &mut Txn<V>,
        depth: usize,
        node: NodeRef<V>,
        reverse: bool,
    ) -> Option<Self> {
        match self.find(node.key.at(depth), depth) {
            Ok(i) => {
                let mut child = self[i].clone();
                merge::merge_nodes(&mut child, txn, depth + 1, node, reverse);
                if Arc::ptr_eq(&child, &self[i]) {
                    None
                } else {
                    Some(self.insert(txn, i, 1, child))
                }
            }
            Err(i) => Some(self.insert(txn, i, 0, node)),
        }
    }

    /// [Edges::add] for an edge set owned by the transaction
    pub fn add_in_place(&mut self, txn: &mut Txn<V>, depth: usize, node: NodeRef<V>, reverse: bool) {
        match self.find(node.key.at(depth), depth) {
            Ok(i) => {
                merge::merge_nodes(&mut self.0[i], txn, depth + 1, node, reverse);
            }
            Err(i) => self.0.insert(i, node),
        }
    }

    /// Merges every child of `b` into this edge set, which is owned by the
    /// transaction
    pub fn merge_in_place(&mut self, txn: &mut Txn<V>, depth: usize, b: &[NodeRef<V>], reverse: bool) {
        for node in b {
            self.add_in_place(txn, depth, node.clone(), reverse);
        }
    }

    /// Merges two edge sets that are not owned by the transaction.
    ///
    /// Children are collected in a 256 slot table indexed by their byte at
    /// `depth`, then compacted into a new edge set. The side tells which input,
    /// if any, the result is equal to.
    pub fn merge(
        txn: &mut Txn<V>,
        depth: usize,
        a: &[NodeRef<V>],
        b: &[NodeRef<V>],
        reverse: bool,
    ) -> (Self, Side) {
        let mut table = txn.take_scratch();
        let mut side = Side::KeepEither;
        let mut count = 0;
        let mut rest = b.iter().peekable();
        for m in a {
            let label = m.key.at(depth);
            while let Some(n) = rest.next_if(|n| n.key.at(depth) < label) {
                table[n.key.at(depth) as usize] = Some(n.clone());
                count += 1;
                side = side.meet(Side::KeepB);
            }
            let merged = match rest.next_if(|n| n.key.at(depth) == label) {
                Some(n) => {
                    let mut merged = m.clone();
                    let s = merge::merge_nodes(&mut merged, txn, depth + 1, n.clone(), reverse);
                    side = side.meet(s);
                    merged
                }
                None => {
                    side = side.meet(Side::KeepA);
                    m.clone()
                }
            };
            table[label as usize] = Some(merged);
            count += 1;
        }
        for n in rest {
            table[n.key.at(depth) as usize] = Some(n.clone());
            count += 1;
            side = side.meet(Side::KeepB);
        }
        let mut edges = txn.new_edges(count);
        edges.0.extend(table.iter_mut().filter_map(Option::take));
        txn.give_scratch(table);
        (edges, side)
    }
}
