//! # Cryptographic Primitives
//!
//! Thin wrappers over `sha2` and `ed25519-dalek`. Nothing here is clever on
//! purpose: the wallet signs, hashes, and verifies exactly the way the
//! partitions expect, and every call site goes through these helpers.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_concat, HASH_LENGTH};
pub use keys::{verify_signature, AccountKey, KeyError};
