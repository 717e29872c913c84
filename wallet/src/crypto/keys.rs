//! # Account Keys
//!
//! Ed25519 keypairs for wallet accounts.
//!
//! An [`AccountKey`] bundles the signing key with the two public forms the
//! partitions care about: the raw 32-byte public key (embedded in owner
//! proofs) and its SHA-256 hash (the owner id every unit and fee-credit
//! record is keyed by).
//!
//! Key bytes are never logged. `Debug` prints the public key hash only.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use super::hash::{sha256, HASH_LENGTH};

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected {SIGNATURE_LENGTH} bytes")]
    InvalidSignature,
}

/// The signing key of one wallet account.
///
/// `AccountKey` intentionally does NOT implement `Serialize`. Persisting
/// secret material is the key manager's business, not something that should
/// happen because a struct ended up in a JSON response.
pub struct AccountKey {
    signing_key: SigningKey,
    pub_key_hash: [u8; HASH_LENGTH],
}

impl AccountKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Build a key deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Parse a hex-encoded 32-byte secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let pub_key_hash = sha256(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            pub_key_hash,
        }
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// SHA-256 of the public key. This is the owner id on every partition.
    pub fn pub_key_hash(&self) -> &[u8; HASH_LENGTH] {
        &self.pub_key_hash
    }

    /// Sign a message. Ed25519 is deterministic, so the same key and message
    /// always yield the same 64 bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Hex-encoded public key, for display.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }
}

impl Clone for AccountKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKey(owner={})", hex::encode(self.pub_key_hash))
    }
}

impl PartialEq for AccountKey {
    fn eq(&self, other: &Self) -> bool {
        self.pub_key_hash == other.pub_key_hash
    }
}

impl Eq for AccountKey {}

/// Verify a raw Ed25519 signature.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify and
/// an error when the key or signature bytes cannot even be parsed.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let pk: [u8; PUBLIC_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| KeyError::InvalidPublicKey)?;
    let verifying_key = VerifyingKey::from_bytes(&pk).map_err(|_| KeyError::InvalidPublicKey)?;
    let sig: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| KeyError::InvalidSignature)?;
    Ok(verifying_key
        .verify(message, &Signature::from_bytes(&sig))
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = AccountKey::generate();
        let sig = key.sign(b"lock unit 7");
        assert!(verify_signature(&key.public_key(), b"lock unit 7", &sig).unwrap());
        assert!(!verify_signature(&key.public_key(), b"lock unit 8", &sig).unwrap());
    }

    #[test]
    fn test_pub_key_hash_is_sha256_of_public_key() {
        let key = AccountKey::from_seed(&[7u8; 32]);
        assert_eq!(key.pub_key_hash(), &sha256(&key.public_key()));
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let key = AccountKey::from_hex(&hex::encode([9u8; 32])).unwrap();
        assert_eq!(key, AccountKey::from_seed(&[9u8; 32]));
        assert!(AccountKey::from_hex("abcd").is_err());
        assert!(AccountKey::from_hex("not hex").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = AccountKey::from_seed(&[1u8; 32]);
        let dbg = format!("{:?}", key);
        assert!(dbg.starts_with("AccountKey(owner="));
        assert!(!dbg.contains(&hex::encode([1u8; 32])));
    }

    #[test]
    fn test_malformed_signature_is_an_error() {
        let key = AccountKey::generate();
        assert!(verify_signature(&key.public_key(), b"m", &[0u8; 10]).is_err());
        assert!(verify_signature(&[0u8; 5], b"m", &[0u8; 64]).is_err());
    }
}
