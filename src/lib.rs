//! A persistent radix tree.
//!
//! A [Tree] maps byte strings to values. Trees are immutable: every change
//! produces a new tree that shares all untouched subtrees with the tree it was
//! derived from, so keeping old versions around is cheap.
//!
//! Changes are batched with a [Txn]. Nodes created within a transaction are
//! updated in place by later operations of the same transaction, everything
//! else is copied on write.
//!
//! ```
//! use radixcow::radixtree;
//!
//! let a = radixtree! { "food" => 1, "foot" => 2 };
//! let b = a.put("foodie", 3);
//! assert_eq!(a.get("foodie"), None);
//! assert_eq!(b.get("foodie"), Some(&3));
//!
//! let mut txn = b.txn();
//! txn.delete("foot");
//! txn.merge(&radixtree! { "food" => 4 });
//! let c = txn.commit();
//! assert_eq!(c, radixtree! { "food" => 4, "foodie" => 3 });
//! ```
mod arena;
mod dense;
mod key;
pub mod node;
mod scratch;
mod tree;
mod txn;
mod util;

#[cfg(test)]
mod tests;

pub use key::Key;
pub use node::{Iter, Node, NodeRef};
pub use scratch::ScratchPool;
pub use tree::Tree;
pub use txn::{Txn, TxnStats};
pub use util::Hex;

#[cfg(test)]
#[macro_use]
extern crate maplit;

/// Build a [Tree] from key value pairs
#[macro_export]
macro_rules! radixtree {
    () => {
        $crate::Tree::empty()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut txn = $crate::Txn::new($crate::Tree::empty());
        $(
            txn.put($key, $value);
        )+
        txn.commit()
    }};
}
