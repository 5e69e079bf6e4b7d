//! Canonical state encoding and fingerprint.
//!
//! Encoding: little-endian u32 N, then N³ little-endian u32 tokens in
//! linear-index order. The fingerprint is the SHA-256 of those bytes,
//! rendered as lowercase hex, and is stable across processes and platforms.

use sha2::{Digest, Sha256};

pub fn canonical_bytes(n: u32, grid: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 * (grid.len() + 1));
    out.extend_from_slice(&n.to_le_bytes());
    for token in grid {
        out.extend_from_slice(&token.to_le_bytes());
    }
    out
}

pub fn state_hash(n: u32, grid: &[u32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(n, grid));
    format!("{:x}", hasher.finalize())
}

/// Leading hex characters of a hash, for labels and logs.
pub fn short_hash(hash: &str, len: usize) -> &str {
    hash.get(..len).unwrap_or(hash)
}
