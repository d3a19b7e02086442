use crate::{radixtree, Node, NodeRef, ScratchPool, Tree, Txn};
use hex_literal::hex;
use obey::{binary_element_test, TestSamples};
use proptest::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn arb_prefix() -> impl Strategy<Value = Vec<u8>> {
    proptest::strategy::Union::new_weighted(vec![
        (10, proptest::collection::vec(b'0'..b'9', 0..9)),
        (1, proptest::collection::vec(b'0'..b'9', 128..129)),
    ])
}

fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..3)
}

fn arb_tree_contents() -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    proptest::collection::btree_map(arb_prefix(), arb_value(), 0..10)
}

fn arb_tree() -> impl Strategy<Value = Tree<Vec<u8>>> {
    arb_tree_contents().prop_map(|x| mk_tree(&x))
}

fn mk_tree(v: &BTreeMap<Vec<u8>, Vec<u8>>) -> Tree<Vec<u8>> {
    v.clone().into_iter().collect()
}

fn to_btree_map(t: &Tree<Vec<u8>>) -> BTreeMap<Vec<u8>, Vec<u8>> {
    t.iter().map(|(k, v)| (k.to_vec(), v.clone())).collect()
}

fn node_ptrs<V>(tree: &Tree<V>) -> HashSet<*const Node<V>> {
    fn collect<V>(node: &NodeRef<V>, res: &mut HashSet<*const Node<V>>) {
        res.insert(Arc::as_ptr(node));
        for child in node.children() {
            collect(child, res);
        }
    }
    let mut res = HashSet::new();
    if let Some(root) = tree.root() {
        collect(root, &mut res);
    }
    res
}

impl TestSamples<Vec<u8>, Option<Vec<u8>>> for Tree<Vec<u8>> {
    fn samples(&self, res: &mut BTreeSet<Vec<u8>>) {
        res.insert(vec![]);
        for (k, _) in self.iter() {
            let a = k.to_vec();
            let mut b = a.clone();
            let mut c = a.clone();
            b.push(0);
            c.pop();
            res.insert(a);
            res.insert(b);
            res.insert(c);
        }
    }

    fn at(&self, elem: Vec<u8>) -> Option<Vec<u8>> {
        self.get(&elem).cloned()
    }
}

#[test]
fn literal_trees() {
    let tree = radixtree! { "a" => 1, "b" => 2, "c" => 3 };
    let expected = btreemap! { b"a".to_vec() => 1, b"b".to_vec() => 2, b"c".to_vec() => 3 };
    let actual: BTreeMap<Vec<u8>, i32> = tree.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
    assert_eq!(actual, expected);
    let empty: Tree<i32> = radixtree! {};
    assert!(empty.is_empty());
}

#[test]
fn binary_keys() {
    let tree = radixtree! {
        hex!("00") => 0,
        hex!("0000") => 1,
        hex!("00ff") => 2,
        hex!("ff00ff") => 3,
        [0u8; 0] => 4,
    };
    tree.validate().unwrap();
    assert_eq!(tree.get(hex!("00ff")), Some(&2));
    assert_eq!(tree.get(hex!("ff00")), None);
    let keys: Vec<_> = tree.iter().map(|(k, _)| k.to_vec()).collect();
    assert_eq!(
        keys,
        vec![vec![], hex!("00").to_vec(), hex!("0000").to_vec(), hex!("00ff").to_vec(), hex!("ff00ff").to_vec()]
    );
}

#[test]
fn long_keys() {
    let a = [b'a'; 300];
    let mut b = a;
    b[299] = b'b';
    let tree = radixtree! { a => 1, b => 2 };
    tree.validate().unwrap();
    assert_eq!(tree.root().unwrap().key().len(), 299);
    assert_eq!(tree.get(a), Some(&1));
    assert_eq!(tree.get(&b[..]), Some(&2));
}

#[test]
fn bulk_build_and_teardown() {
    init_logger();
    let keys: Vec<Vec<u8>> = (0u32..1000)
        .map(|i| i.wrapping_mul(2654435761).to_be_bytes().to_vec())
        .collect();
    let pool = Arc::new(ScratchPool::default());
    let mut txn = Txn::with_pool(Tree::empty(), pool);
    txn.prealloc(keys.len());
    for (i, key) in keys.iter().enumerate() {
        txn.put(key, i);
    }
    let stats = txn.stats();
    assert!(stats.arena_nodes > 0);
    let tree = txn.commit();
    tree.validate().unwrap();
    assert_eq!(tree.len(), keys.len());
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.get(key), Some(&i));
    }
    let mut txn = tree.txn();
    for key in &keys {
        txn.delete(key);
    }
    assert!(txn.commit().is_empty());
    // the committed tree is untouched
    assert_eq!(tree.len(), keys.len());
}

proptest! {

    #[test]
    fn btreemap_tree_roundtrip(x in arb_tree_contents()) {
        let reference = x;
        let tree = mk_tree(&reference);
        prop_assert!(tree.validate().is_ok());
        let actual = to_btree_map(&tree);
        prop_assert_eq!(reference, actual);
    }

    #[test]
    fn get_contains(x in arb_tree_contents()) {
        let reference = x;
        let tree = mk_tree(&reference);
        for (k, v) in reference {
            prop_assert!(tree.contains_key(&k));
            prop_assert_eq!(tree.get(&k), Some(&v));
        }
    }

    #[test]
    fn standalone_matches_txn(x in arb_tree_contents()) {
        let mut tree = Tree::empty();
        for (k, v) in &x {
            tree = tree.put(k, v.clone());
        }
        prop_assert!(tree.validate().is_ok());
        prop_assert_eq!(tree, mk_tree(&x));
    }

    #[test]
    fn delete_removes(x in arb_tree_contents(), extra in arb_prefix()) {
        let tree = mk_tree(&x);
        let mut reference = x.clone();
        let mut current = tree.clone();
        for k in x.keys() {
            current = current.delete(k);
            reference.remove(k);
            prop_assert!(current.validate().is_ok());
            prop_assert_eq!(current.get(k), None);
            prop_assert_eq!(to_btree_map(&current), reference.clone());
        }
        prop_assert!(current.is_empty());
        if !x.contains_key(&extra) {
            prop_assert!(tree.delete(&extra).ptr_eq(&tree));
        }
        // the tree the deletes started from is unchanged
        prop_assert_eq!(to_btree_map(&tree), x);
    }

    #[test]
    fn noop_put_keeps_identity(x in arb_tree_contents()) {
        let tree = mk_tree(&x);
        for (k, v) in &x {
            prop_assert!(tree.put(k, v.clone()).ptr_eq(&tree));
        }
    }

    #[test]
    fn put_shares_untouched_subtrees(x in arb_tree_contents(), k in arb_prefix(), v in arb_value()) {
        let tree = mk_tree(&x);
        let updated = tree.put(&k, v);
        let before = node_ptrs(&tree);
        let after = node_ptrs(&updated);
        // at most one node per level of the new key is not shared
        let fresh = after.difference(&before).count();
        prop_assert!(fresh <= k.len() + 3);
    }

    #[test]
    fn merge_union(a in arb_tree_contents(), b in arb_tree_contents()) {
        let at = mk_tree(&a);
        let bt = mk_tree(&b);
        // right biased
        let r = at.merge(&bt);
        prop_assert!(r.validate().is_ok());
        let mut reference = a.clone();
        reference.extend(b.clone());
        prop_assert_eq!(to_btree_map(&r), reference);
        // left biased
        let r = at.merge_reverse(&bt);
        prop_assert!(r.validate().is_ok());
        let mut reference = b.clone();
        reference.extend(a.clone());
        prop_assert_eq!(to_btree_map(&r), reference);
    }

    #[test]
    fn merge_sample(a in arb_tree(), b in arb_tree()) {
        let r = a.merge(&b);
        prop_assert!(binary_element_test(&a, &b, r, |a, b| b.or(a)));
        let r = a.merge_reverse(&b);
        prop_assert!(binary_element_test(&a, &b, r, |a, b| a.or(b)));
    }

    #[test]
    fn merge_with_self(a in arb_tree()) {
        prop_assert!(a.merge(&a).ptr_eq(&a));
        prop_assert!(a.merge(&a.dense_copy()) == a);
    }

    #[test]
    fn merge_leaves_inputs_alone(a in arb_tree_contents(), b in arb_tree_contents()) {
        let at = mk_tree(&a);
        let bt = mk_tree(&b);
        let mut txn = at.txn();
        txn.merge(&bt);
        txn.put(b"0", vec![]);
        txn.delete(b"1");
        let _ = txn.commit();
        prop_assert_eq!(to_btree_map(&at), a);
        prop_assert_eq!(to_btree_map(&bt), b);
    }

    #[test]
    fn dense_copy_fidelity(a in arb_tree()) {
        let copy = a.dense_copy();
        prop_assert!(copy.validate().is_ok());
        prop_assert!(copy == a);
        prop_assert!(node_ptrs(&copy).is_disjoint(&node_ptrs(&a)));
    }

    #[test]
    fn walk_until_matches_iter(a in arb_tree(), limit in 0usize..12) {
        let mut walked = Vec::new();
        let completed = a.walk_until(|k, v| {
            walked.push((k.to_vec(), v.clone()));
            walked.len() < limit
        });
        let expected: Vec<_> = a.iter().take(limit.max(1)).map(|(k, v)| (k.to_vec(), v.clone())).collect();
        prop_assert_eq!(completed, a.len() < limit || a.is_empty());
        prop_assert_eq!(walked, expected);
    }

    #[test]
    fn walk_skips_below_rejected_keys(a in arb_tree(), modulus in 1usize..4) {
        let keep = |k: &[u8]| k.len() % modulus != 0;
        let mut walked = Vec::new();
        a.walk(|k, _| {
            walked.push(k.to_vec());
            keep(k)
        });
        let mut rejected: Vec<Vec<u8>> = Vec::new();
        let mut expected = Vec::new();
        for (k, _) in a.iter() {
            if rejected.iter().any(|p| k.len() > p.len() && k.starts_with(p)) {
                continue;
            }
            expected.push(k.to_vec());
            if !keep(k) {
                rejected.push(k.to_vec());
            }
        }
        prop_assert_eq!(walked, expected);
    }
}
