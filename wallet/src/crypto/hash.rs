//! # Hashing Utilities
//!
//! SHA-256 is the only hash the partitions speak. Transaction hashes, owner
//! ids (public-key hashes), derived unit ids and account seeds all go through
//! the helpers below so there is exactly one place to look when the digest
//! format matters.

use sha2::{Digest, Sha256};

/// Digest length in bytes.
pub const HASH_LENGTH: usize = 32;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use shardwallet::crypto::sha256;
///
/// let hash = sha256(b"partition");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash several byte slices as if they were concatenated.
///
/// Saves the caller from allocating a scratch buffer when deriving ids from
/// a handful of fields (`parent id || counter || index`).
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; HASH_LENGTH] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
