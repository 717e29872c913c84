//! Execution records and inclusion proofs returned by a partition.
//!
//! A [`TxProof`] is the wallet's only evidence that a transaction made it
//! into the ledger. The wallet does not verify the block-level part of the
//! proof; it trusts the configured RPC endpoint, and relies on the record's
//! status to tell successful execution from a confirmed failure.

use serde::{Deserialize, Serialize};

use super::order::TransactionOrder;
use super::TransactionError;
use crate::types::{TxHash, UnitId};

/// Outcome of executing a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Successful,
    /// Included and charged for, but the state change did not apply
    /// (stale counter, locked unit, out of gas, ...).
    Failed,
}

/// A transaction as executed, with the fee actually charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub order: TransactionOrder,
    pub actual_fee: u64,
    pub status: TxStatus,
}

/// Proof that a transaction was included in the given round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxProof {
    pub record: TxRecord,
    pub round: u64,
}

impl TxProof {
    pub fn unit_id(&self) -> &UnitId {
        self.record.order.unit_id()
    }

    pub fn actual_fee(&self) -> u64 {
        self.record.actual_fee
    }

    pub fn is_successful(&self) -> bool {
        self.record.status == TxStatus::Successful
    }

    pub fn tx_hash(&self) -> Result<TxHash, TransactionError> {
        self.record.order.hash()
    }
}
