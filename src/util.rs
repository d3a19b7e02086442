/// Number of key bytes shown before a key is abbreviated in debug output
pub(crate) const DEBUG_KEY_BYTES: usize = 32;

/// Utility to output a key as hex
pub struct Hex<'a>(&'a [u8], usize);

impl<'a> Hex<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self(data, data.len())
    }

    /// Shows at most `len` bytes, followed by the total size
    pub fn partial(data: &'a [u8], len: usize) -> Self {
        Self(data, len)
    }

    /// The form used in `Debug` impls of keys, nodes and trees
    pub(crate) fn key(data: &'a [u8]) -> Self {
        Self::partial(data, DEBUG_KEY_BYTES)
    }
}

impl<'a> std::fmt::Debug for Hex<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl<'a> std::fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() > self.1 {
            write!(
                f,
                "[{}..., {} bytes]",
                hex::encode(&self.0[..self.1]),
                self.0.len()
            )
        } else {
            write!(f, "[{}]", hex::encode(self.0))
        }
    }
}
