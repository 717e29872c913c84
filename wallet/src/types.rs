//! Core value types shared by every module: unit identifiers, value-bearing
//! units and fee-credit records.
//!
//! All amounts are `u64` in the smallest indivisible denomination. There is
//! no floating point anywhere near value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::config::LOCK_STATUS_UNLOCKED;
use crate::crypto::hash::{sha256, sha256_concat};

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

/// Identifier of any partition-tracked object: a bill, a token, a token type
/// or a fee-credit record.
///
/// Ordering is lexicographic over the raw bytes, which is the order the
/// partition requires for burn proofs inside a join.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(Vec<u8>);

/// Token types are units too; the alias keeps signatures readable.
pub type TypeId = UnitId;

impl UnitId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let trimmed = s.trim().trim_start_matches("0x");
        Ok(Self(hex::decode(trimmed)?))
    }

    /// Derive the id of a new unit created by `parent` at `counter`, output
    /// `index`. Used for split outputs.
    pub fn derive(parent: &UnitId, counter: u64, index: u32) -> Self {
        Self(
            sha256_concat(&[&parent.0, &counter.to_be_bytes(), &index.to_be_bytes()]).to_vec(),
        )
    }

    /// Derive the id of a freshly minted unit.
    pub fn for_mint(type_id: &TypeId, owner: &[u8], nonce: u64) -> Self {
        Self(sha256_concat(&[&type_id.0, owner, &nonce.to_be_bytes()]).to_vec())
    }

    /// Id of the fee-credit record belonging to an owner.
    pub fn fee_credit_record(owner_hash: &[u8]) -> Self {
        Self(sha256_concat(&[b"fcr", owner_hash]).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId(0x{})", self.to_hex())
    }
}

impl From<[u8; 32]> for UnitId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

// Hex on the wire. Both JSON-RPC and the bincode hash input use the same form.
impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        UnitId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// SHA-256 content hash of a signed transaction order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(sha256(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash(0x{})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// ValueUnit
// ---------------------------------------------------------------------------

/// A fungible value-bearing unit: a bill or a fungible token.
///
/// `counter` must match the partition's view for the next transaction on
/// this unit to be valid. Every state-changing transaction bumps it by one,
/// so callers that chain several transactions increment their local copy
/// instead of re-fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueUnit {
    pub id: UnitId,
    pub type_id: TypeId,
    pub amount: u64,
    pub counter: u64,
    pub lock_status: u64,
}

impl ValueUnit {
    pub fn is_locked(&self) -> bool {
        self.lock_status != LOCK_STATUS_UNLOCKED
    }
}

// ---------------------------------------------------------------------------
// FeeCreditRecord
// ---------------------------------------------------------------------------

/// Per-account fee balance held by the partition.
///
/// The wallet only ever reads it. The partition debits it when a
/// transaction executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCreditRecord {
    pub id: UnitId,
    pub balance: u64,
    #[serde(default)]
    pub counter: Option<u64>,
}
