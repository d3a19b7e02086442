use std::{borrow::Borrow, fmt, ops::Deref, sync::Arc};

use crate::util::Hex;

/// An immutable byte string.
///
/// The bytes live in a shared buffer, so taking a prefix of a key is cheap and
/// the prefix shares storage with the key it was taken from.
#[derive(Clone)]
pub struct Key {
    data: Arc<[u8]>,
    len: usize,
}

impl Key {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.into(),
            len: data.len(),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The first `len` bytes of this key, sharing the same buffer
    pub(crate) fn prefix(&self, len: usize) -> Self {
        assert!(len <= self.len, "prefix longer than key");
        Self {
            data: self.data.clone(),
            len,
        }
    }

    /// The byte at `depth`. Panics if the key is not longer than `depth`.
    #[inline]
    pub(crate) fn at(&self, depth: usize) -> u8 {
        self.as_slice()[depth]
    }

    /// Length of the common prefix of this key and `other`.
    ///
    /// Bytes before `depth` are assumed to be equal and are not compared. The
    /// flag is true if this key was consumed completely, i.e. it is a prefix of
    /// (or equal to) `other`.
    pub fn common_prefix_len(&self, other: &[u8], depth: usize) -> (usize, bool) {
        let key = self.as_slice();
        let (key, truncated) = if other.len() < key.len() {
            (&key[..other.len()], true)
        } else {
            (key, false)
        };
        match key[depth..]
            .iter()
            .zip(&other[depth..])
            .position(|(a, b)| a != b)
        {
            Some(n) => (depth + n, false),
            None => (key.len(), !truncated),
        }
    }
}

impl Deref for Key {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Borrow<[u8]> for Key {
    fn borrow(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<&[u8]> for Key {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Key {}

impl PartialEq<[u8]> for Key {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key{:?}", Hex::key(self.as_slice()))
    }
}
