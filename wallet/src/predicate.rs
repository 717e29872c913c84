//! # Predicates and Predicate Proofs
//!
//! Every unit carries an owner predicate, every token type carries minting
//! and invariant predicates, and every transaction carries the proofs that
//! satisfy them. This module covers both halves:
//!
//! - [`Predicate`]: the handful of predicate templates the wallet creates
//!   and understands, with their byte encoding and evaluation.
//! - [`PredicateInput`]: what the caller hands over to satisfy a predicate:
//!   an account key to sign with, a literal argument produced elsewhere
//!   (a co-signer, a hardware device), or nothing at all for always-true
//!   predicates. Resolved once, in [`PredicateInput::proof`].
//!
//! ## Owner proof encoding
//!
//! ```text
//! signature (64 bytes) || public key (32 bytes)
//! ```

use thiserror::Error;

use crate::crypto::hash::{sha256, HASH_LENGTH};
use crate::crypto::keys::{verify_signature, AccountKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

const TAG_ALWAYS_FALSE: u8 = 0x00;
const TAG_ALWAYS_TRUE: u8 = 0x01;
const TAG_PAY_TO_PUBLIC_KEY_HASH: u8 = 0x02;

/// Errors produced while building or decoding predicate material.
#[derive(Debug, Error)]
pub enum PredicateError {
    /// A proof was requested but the caller supplied no input for it.
    #[error("nil predicate input: {0}")]
    NilPredicateInput(String),

    #[error("malformed predicate bytes")]
    MalformedPredicate,

    #[error("malformed owner proof: expected {expected} bytes, got {got}")]
    MalformedOwnerProof { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A verification rule attached to a unit or a unit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    AlwaysFalse,
    AlwaysTrue,
    /// Satisfied by a signature from the key whose SHA-256 is the payload.
    PayToPublicKeyHash([u8; HASH_LENGTH]),
}

impl Predicate {
    /// Owner predicate for an account.
    pub fn pay_to(key: &AccountKey) -> Self {
        Self::PayToPublicKeyHash(*key.pub_key_hash())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::AlwaysFalse => vec![TAG_ALWAYS_FALSE],
            Self::AlwaysTrue => vec![TAG_ALWAYS_TRUE],
            Self::PayToPublicKeyHash(hash) => {
                let mut buf = Vec::with_capacity(1 + HASH_LENGTH);
                buf.push(TAG_PAY_TO_PUBLIC_KEY_HASH);
                buf.extend_from_slice(hash);
                buf
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PredicateError> {
        match bytes {
            [TAG_ALWAYS_FALSE] => Ok(Self::AlwaysFalse),
            [TAG_ALWAYS_TRUE] => Ok(Self::AlwaysTrue),
            [TAG_PAY_TO_PUBLIC_KEY_HASH, rest @ ..] if rest.len() == HASH_LENGTH => {
                let mut hash = [0u8; HASH_LENGTH];
                hash.copy_from_slice(rest);
                Ok(Self::PayToPublicKeyHash(hash))
            }
            _ => Err(PredicateError::MalformedPredicate),
        }
    }

    /// Evaluate the predicate against a proof over `payload`.
    ///
    /// Malformed proofs evaluate to `false`; there is no error oracle.
    pub fn evaluate(&self, proof: &[u8], payload: &[u8]) -> bool {
        match self {
            Self::AlwaysFalse => false,
            Self::AlwaysTrue => proof.is_empty(),
            Self::PayToPublicKeyHash(hash) => {
                let Ok(owner_proof) = OwnerProof::decode(proof) else {
                    return false;
                };
                if &sha256(&owner_proof.public_key) != hash {
                    return false;
                }
                verify_signature(&owner_proof.public_key, payload, &owner_proof.signature)
                    .unwrap_or(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// OwnerProof
// ---------------------------------------------------------------------------

/// Signature plus the public key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerProof {
    pub signature: [u8; SIGNATURE_LENGTH],
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl OwnerProof {
    pub const ENCODED_LENGTH: usize = SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH;

    pub fn sign(key: &AccountKey, payload: &[u8]) -> Self {
        Self {
            signature: key.sign(payload),
            public_key: key.public_key(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ENCODED_LENGTH);
        buf.extend_from_slice(&self.signature);
        buf.extend_from_slice(&self.public_key);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PredicateError> {
        if bytes.len() != Self::ENCODED_LENGTH {
            return Err(PredicateError::MalformedOwnerProof {
                expected: Self::ENCODED_LENGTH,
                got: bytes.len(),
            });
        }
        let mut signature = [0u8; SIGNATURE_LENGTH];
        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        signature.copy_from_slice(&bytes[..SIGNATURE_LENGTH]);
        public_key.copy_from_slice(&bytes[SIGNATURE_LENGTH..]);
        Ok(Self {
            signature,
            public_key,
        })
    }
}

// ---------------------------------------------------------------------------
// PredicateInput
// ---------------------------------------------------------------------------

/// Material for satisfying one predicate.
#[derive(Debug, Clone)]
pub enum PredicateInput {
    /// Sign the payload with this key.
    AccountKey(AccountKey),
    /// Use these bytes verbatim as the proof.
    Argument(Vec<u8>),
    /// The predicate is always true; the proof is the empty argument.
    AlwaysTrue,
}

impl PredicateInput {
    /// Produce the proof bytes for `payload`.
    pub fn proof(&self, payload: &[u8]) -> Vec<u8> {
        match self {
            Self::AccountKey(key) => OwnerProof::sign(key, payload).encode(),
            Self::Argument(arg) => arg.clone(),
            Self::AlwaysTrue => Vec::new(),
        }
    }
}

/// Resolve an optional input into proof bytes.
///
/// `what` names the proof for the error message ("mint proof", "invariant
/// proof #2", ...).
pub fn build_proof(
    input: Option<&PredicateInput>,
    payload: &[u8],
    what: &str,
) -> Result<Vec<u8>, PredicateError> {
    input
        .map(|i| i.proof(payload))
        .ok_or_else(|| PredicateError::NilPredicateInput(what.to_string()))
}

/// Proofs for a list of auxiliary predicates, in order.
pub fn build_proofs(inputs: &[PredicateInput], payload: &[u8]) -> Vec<Vec<u8>> {
    inputs.iter().map(|i| i.proof(payload)).collect()
}
