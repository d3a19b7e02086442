use std::sync::Arc;

use log::debug;

use crate::{
    arena::Arena,
    key::Key,
    node::{Edges, Node, NodeRef, FROZEN},
};

/// Copies a tree into nodes that are all allocated before the copy starts.
///
/// Node slots are handed out in the order they were allocated, which is the
/// depth first order of the copy. The number of nodes and edges is known up
/// front, so running out of either means the tree changed under the copy,
/// which is a bug.
struct DenseCopy<V> {
    nodes: Arena<NodeRef<V>>,
    edges: usize,
}

pub(crate) fn dense_copy<V: Clone>(root: &Node<V>) -> NodeRef<V> {
    let count = root.count();
    debug!("dense copy of {} nodes", count);
    let mut copy = DenseCopy {
        nodes: Arena::default(),
        edges: count - 1,
    };
    let key = Key::empty();
    copy.nodes
        .reserve_with(count, || Arc::new(Node::blank(key.clone(), FROZEN)));
    let res = copy.node(root);
    debug_assert_eq!(copy.nodes.remaining(), 0);
    debug_assert_eq!(copy.edges, 0);
    res
}

impl<V: Clone> DenseCopy<V> {
    fn node(&mut self, node: &Node<V>) -> NodeRef<V> {
        let mut res = self
            .nodes
            .alloc()
            .expect("dense copy ran out of preallocated nodes");
        let edges = self.edges(&node.edges);
        let target = Arc::get_mut(&mut res).expect("preallocated node is shared");
        target.key = node.key.clone();
        target.value = node.value.clone();
        target.edges = edges;
        res
    }

    fn edges(&mut self, edges: &[NodeRef<V>]) -> Edges<V> {
        assert!(
            edges.len() <= self.edges,
            "dense copy ran out of preallocated edges"
        );
        self.edges -= edges.len();
        let mut res = Edges::with_capacity(edges.len());
        for child in edges {
            res.push(self.node(child));
        }
        res
    }
}
