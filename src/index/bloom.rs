//! Bloom filter over SHA-256 key digests
//!
//! - If any probed bit is 0 → key was DEFINITELY never inserted
//! - If all probed bits are 1 → key was PROBABLY inserted
//!
//! Sizing for n expected keys at false positive rate p:
//!   num_bits   m = ceil(-n * ln(p) / ln(2)^2)
//!   num_hashes k = round(m / n * ln(2))
//!
//!   1% FPR → ~9.6 bits/key, 7 hashes
//!
//! Probe positions use double hashing over the digest: the first two 8-byte
//! words of SHA-256(key) become h1 and h2, and h_i = h1 + i * h2 (mod m).
//! h2 is forced odd so successive probes don't collapse onto one bit.

use sha2::{Digest, Sha256};

/// Insert-only probabilistic key set
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    items_inserted: u64,
}

impl BloomFilter {
    /// Create a filter sized for `expected_items` at `false_positive_rate`.
    ///
    /// # Panics
    /// Panics if `expected_items` is 0 or the rate is not in (0, 1).
    /// `Config::validate` rejects both before the engine gets here.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let ln2 = std::f64::consts::LN_2;

        let num_bits = (-n * false_positive_rate.ln() / (ln2 * ln2)).ceil() as u64;
        let num_bits = num_bits.max(64);

        let num_hashes = ((num_bits as f64 / n) * ln2).round() as u32;
        let num_hashes = num_hashes.max(1);

        let words = num_bits.div_ceil(64) as usize;

        Self {
            bits: vec![0u64; words],
            num_bits,
            num_hashes,
            items_inserted: 0,
        }
    }

    /// Add a key to the filter
    pub fn insert(&mut self, key: &str) {
        let (h1, h2) = hash_key(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.bits[(pos / 64) as usize] |= 1u64 << (pos % 64);
        }
        self.items_inserted += 1;
    }

    /// false → key was never inserted. true → key was probably inserted.
    pub fn might_contain(&self, key: &str) -> bool {
        let (h1, h2) = hash_key(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.position(h1, h2, i);
            (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
        })
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of `insert` calls (re-inserts of the same key count again)
    pub fn items_inserted(&self) -> u64 {
        self.items_inserted
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}

/// SHA-256 the key and split the digest into two probe seeds
fn hash_key(key: &str) -> (u64, u64) {
    let digest = Sha256::digest(key.as_bytes());
    let mut h1 = [0u8; 8];
    let mut h2 = [0u8; 8];
    h1.copy_from_slice(&digest[0..8]);
    h2.copy_from_slice(&digest[8..16]);
    (u64::from_le_bytes(h1), u64::from_le_bytes(h2) | 1)
}
