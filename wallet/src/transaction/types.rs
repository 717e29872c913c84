//! Transaction type discriminants and per-type attributes.
//!
//! Attributes are kept typed rather than as opaque bytes; the RPC layer
//! decides how they travel. Every attribute set that modifies an existing
//! unit carries the `counter` the wallet believes the unit is at, and the
//! partition rejects the transaction if that belief is stale.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::proof::TxProof;
use crate::types::{TypeId, UnitId};

// ---------------------------------------------------------------------------
// TxType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    /// Move a whole unit to a new owner.
    Transfer,
    /// Carve new units out of an existing one, keeping the remainder.
    Split,
    /// Reserve a unit so no other transaction may touch it.
    Lock,
    Unlock,
    /// Destroy a unit in favour of a later join into a target unit.
    Burn,
    /// Merge burned value into a target unit.
    Join,
    /// Create a new unit of a token type.
    Mint,
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "Transfer"),
            Self::Split => write!(f, "Split"),
            Self::Lock => write!(f, "Lock"),
            Self::Unlock => write!(f, "Unlock"),
            Self::Burn => write!(f, "Burn"),
            Self::Join => write!(f, "Join"),
            Self::Mint => write!(f, "Mint"),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMetadata
// ---------------------------------------------------------------------------

/// Fields every transaction carries regardless of type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Last round in which the transaction may be executed.
    pub timeout: u64,
    /// Fee ceiling the owner agrees to pay.
    pub max_fee: u64,
    /// Fee-credit record the fee is taken from.
    pub fee_credit_record_id: Option<UnitId>,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAttributes {
    pub type_id: TypeId,
    pub new_owner_predicate: Vec<u8>,
    pub value: u64,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTarget {
    pub amount: u64,
    pub owner_predicate: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAttributes {
    pub type_id: TypeId,
    pub target_units: Vec<SplitTarget>,
    /// Value left on the original unit id after the split.
    pub remaining_value: u64,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAttributes {
    pub lock_status: u64,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockAttributes {
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnAttributes {
    pub type_id: TypeId,
    pub value: u64,
    /// Unit the burned value will be joined into.
    pub target_unit_id: UnitId,
    /// Counter the target unit must be at when the join executes.
    pub target_unit_counter: u64,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAttributes {
    /// Burn proofs, ascending by burned unit id.
    pub burn_proofs: Vec<TxProof>,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAttributes {
    pub type_id: TypeId,
    pub value: u64,
    pub owner_predicate: Vec<u8>,
    pub nonce: u64,
}

/// Type-specific transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxAttributes {
    Transfer(TransferAttributes),
    Split(SplitAttributes),
    Lock(LockAttributes),
    Unlock(UnlockAttributes),
    Burn(BurnAttributes),
    Join(JoinAttributes),
    Mint(MintAttributes),
}

impl TxAttributes {
    pub fn tx_type(&self) -> TxType {
        match self {
            Self::Transfer(_) => TxType::Transfer,
            Self::Split(_) => TxType::Split,
            Self::Lock(_) => TxType::Lock,
            Self::Unlock(_) => TxType::Unlock,
            Self::Burn(_) => TxType::Burn,
            Self::Join(_) => TxType::Join,
            Self::Mint(_) => TxType::Mint,
        }
    }

    /// Counter of the unit being modified. `None` for mints, which create
    /// a unit rather than modify one.
    pub fn counter(&self) -> Option<u64> {
        match self {
            Self::Transfer(a) => Some(a.counter),
            Self::Split(a) => Some(a.counter),
            Self::Lock(a) => Some(a.counter),
            Self::Unlock(a) => Some(a.counter),
            Self::Burn(a) => Some(a.counter),
            Self::Join(a) => Some(a.counter),
            Self::Mint(_) => None,
        }
    }
}
