/// Running BLAKE3 digest over a blob's logical byte stream.
///
/// The writer feeds exactly the bytes it flushes, in order, so the final
/// digest does not depend on how the caller split its writes.
#[derive(Clone, Debug, Default)]
pub struct ContentDigest {
    hasher: blake3::Hasher,
    bytes: u64,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next span of the stream.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest of everything fed so far. Does not reset.
    pub fn finalize_hex(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

/// Hex digest of a complete byte sequence.
pub fn digest_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
