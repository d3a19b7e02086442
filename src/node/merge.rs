//! Merging two trees.
//!
//! A merge walks both trees at once and reports for every subtree which input
//! the merged result is equal to, so that an unchanged subtree is reused by
//! reference instead of being rebuilt.
use std::{mem, sync::Arc};

use log::trace;

use super::{Edges, NodeRef};
use crate::txn::Txn;

/// Which input a merged subtree is equal to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "internals", visibility::make(pub))]
pub(crate) enum Side {
    /// Equal to neither input
    New,
    KeepA,
    KeepB,
    /// Both inputs are equal, either can be used
    KeepEither,
}

impl Side {
    /// Combine the sides of two parts of one subtree.
    ///
    /// Equal sides stay, `KeepEither` gives way to the other side, and any
    /// other pair means the subtree is new.
    pub fn meet(self, other: Side) -> Side {
        match (self, other) {
            (a, b) if a == b => a,
            (Side::KeepEither, x) | (x, Side::KeepEither) => x,
            _ => Side::New,
        }
    }

    /// `b` for [Side::KeepB], `a` otherwise
    pub fn pick<T>(self, a: T, b: T) -> T {
        if self == Side::KeepB {
            b
        } else {
            a
        }
    }
}

/// Decide between the values of two nodes with the same key.
///
/// A missing value always loses. Of two different values `b` wins, or `a`
/// if `reverse` is set.
pub(crate) fn merge_values<V: PartialEq>(a: Option<&V>, b: Option<&V>, reverse: bool) -> Side {
    match (a, b) {
        (None, None) => Side::KeepEither,
        (Some(_), None) => Side::KeepA,
        (None, Some(_)) => Side::KeepB,
        (Some(a), Some(b)) if a == b => Side::KeepEither,
        _ if reverse => Side::KeepA,
        _ => Side::KeepB,
    }
}

/// Merge `b` into the node in `slot`.
///
/// Both nodes must agree on the first `depth` bytes of their keys. On return
/// the slot holds the merged node; the result tells which of the inputs it is.
pub(crate) fn merge_nodes<V: Clone + PartialEq>(
    slot: &mut NodeRef<V>,
    txn: &mut Txn<V>,
    depth: usize,
    mut b: NodeRef<V>,
    reverse: bool,
) -> Side {
    if Arc::ptr_eq(slot, &b) {
        return Side::KeepEither;
    }
    let (d, is_prefix) = slot.key.common_prefix_len(&b.key, depth);
    if !is_prefix {
        return split(slot, txn, d, b, reverse);
    }
    if d < b.key.len() {
        // the key of a is a strict prefix of the key of b
        return if absorb(slot, txn, d, b, reverse) {
            Side::KeepA
        } else {
            Side::New
        };
    }
    let value_side = merge_values(slot.value.as_ref(), b.value.as_ref(), reverse);
    if let Some(node) = txn.mutable(slot) {
        trace!("merge: updating {:?} in place", node.key);
        if value_side == Side::KeepB {
            node.value = b.value.clone();
        }
        node.edges.merge_in_place(txn, d, &b.edges, reverse);
        return Side::KeepA;
    }
    let (edges, edge_side) = match (slot.edges.is_empty(), b.edges.is_empty()) {
        (true, true) => (None, Side::KeepEither),
        (false, true) => (None, Side::KeepA),
        (true, false) => (None, Side::KeepB),
        (false, false) => {
            let (edges, side) = Edges::merge(txn, d, &slot.edges, &b.edges, reverse);
            (Some(edges), side)
        }
    };
    match value_side.meet(edge_side) {
        Side::KeepA => Side::KeepA,
        Side::KeepB => {
            trace!("merge: reusing b at {:?}", b.key);
            *slot = b;
            Side::KeepB
        }
        Side::KeepEither => {
            if !reverse {
                *slot = b;
            }
            Side::KeepEither
        }
        Side::New => {
            let value = value_side.pick(&slot.value, &b.value).clone();
            let edges = edges.unwrap_or_else(|| edge_side.pick(&slot.edges, &b.edges).clone());
            if let Some(node) = txn.mutable(&mut b) {
                trace!("merge: updating {:?} in place", node.key);
                node.value = value;
                node.edges = edges;
                *slot = b;
                return Side::KeepB;
            }
            trace!("merge: new node at {:?}", slot.key);
            *slot = txn.new_node(slot.key.clone(), value, edges);
            Side::New
        }
    }
}

/// Combine two nodes whose keys agree on exactly `depth` bytes, where the key
/// of `b` is not longer than `depth` or the keys differ at `depth`.
///
/// The node with the shorter key becomes the parent. If neither key is the
/// shared prefix, a new branch node without a value holds both.
pub(crate) fn split<V: Clone + PartialEq>(
    slot: &mut NodeRef<V>,
    txn: &mut Txn<V>,
    depth: usize,
    b: NodeRef<V>,
    reverse: bool,
) -> Side {
    if b.key.len() == depth {
        let a = mem::replace(slot, b);
        // b is the parent now, so the roles are swapped
        return if absorb(slot, txn, depth, a, !reverse) {
            Side::KeepB
        } else {
            Side::New
        };
    }
    assert!(
        slot.key.len() > depth && b.key.len() > depth,
        "split of nested keys at {}",
        depth
    );
    let key = slot.key.prefix(depth);
    let a = slot.clone();
    let (first, second) = if b.key.at(depth) < a.key.at(depth) {
        (b, a)
    } else {
        (a, b)
    };
    let mut edges = txn.new_edges(2);
    edges.push(first);
    edges.push(second);
    *slot = txn.new_node(key, None, edges);
    Side::New
}

/// Add `node` below the node in `slot`, whose key is a strict prefix of the
/// key of `node` with length `depth`.
///
/// Returns true if the slot still holds the same node, either unchanged or
/// updated in place.
pub(crate) fn absorb<V: Clone + PartialEq>(
    slot: &mut NodeRef<V>,
    txn: &mut Txn<V>,
    depth: usize,
    node: NodeRef<V>,
    reverse: bool,
) -> bool {
    if let Some(owner) = txn.mutable(slot) {
        owner.edges.add_in_place(txn, depth, node, reverse);
        return true;
    }
    match slot.edges.add(txn, depth, node, reverse) {
        Some(edges) => {
            *slot = txn.new_node(slot.key.clone(), slot.value.clone(), edges);
            false
        }
        None => true,
    }
}
