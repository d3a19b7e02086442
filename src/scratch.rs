use parking_lot::Mutex;

use crate::node::NodeRef;

/// One slot per possible first byte of a child key
pub(crate) const TABLE_SIZE: usize = 256;

pub(crate) type Table<V> = Box<[Option<NodeRef<V>>]>;

/// A bounded pool of scratch tables used when merging the children of two
/// nodes.
///
/// The pool never blocks. If it is empty or another thread holds the lock, a
/// fresh table is allocated, and a table given back to a full or contended
/// pool is dropped.
///
/// Share one pool between transactions with [Txn::with_pool](crate::Txn::with_pool).
pub struct ScratchPool<V> {
    free: Mutex<Vec<Table<V>>>,
    capacity: usize,
}

impl<V> ScratchPool<V> {
    pub const DEFAULT_CAPACITY: usize = 8;

    /// A pool that keeps at most `capacity` idle tables
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Number of idle tables
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn take(&self) -> Table<V> {
        if let Some(mut free) = self.free.try_lock() {
            if let Some(table) = free.pop() {
                return table;
            }
        }
        std::iter::repeat_with(|| None).take(TABLE_SIZE).collect()
    }

    /// Return a table. It must have been cleared by the caller.
    pub(crate) fn give(&self, table: Table<V>) {
        debug_assert!(table.iter().all(Option::is_none), "scratch table not cleared");
        if let Some(mut free) = self.free.try_lock() {
            if free.len() < self.capacity {
                free.push(table);
            }
        }
    }
}

impl<V> Default for ScratchPool<V> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl<V> std::fmt::Debug for ScratchPool<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchPool")
            .field("capacity", &self.capacity)
            .finish()
    }
}
