//! # Transaction Module
//!
//! Construction, signing and proof types for partition transactions.
//!
//! ```text
//! types.rs   — TxType, per-type attributes, client metadata
//! order.rs   — Payload, TransactionOrder, TransactionBuilder
//! signing.rs — attaching owner / fee / invariant proofs
//! proof.rs   — execution records and inclusion proofs
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** with [`TransactionBuilder`].
//! 2. **Sign** with [`sign_transaction`].
//! 3. **Submit** through [`crate::txsubmitter::TxSubmissionBatch`].
//! 4. **Confirm** once the partition hands back a [`TxProof`].

pub mod order;
pub mod proof;
pub mod signing;
pub mod types;

use thiserror::Error;

use crate::predicate::PredicateError;

pub use order::{Payload, TransactionBuilder, TransactionOrder};
pub use proof::{TxProof, TxRecord, TxStatus};
pub use signing::{sign_transaction, sign_with_account, AccountSigner};
pub use types::{
    BurnAttributes, ClientMetadata, JoinAttributes, LockAttributes, MintAttributes,
    SplitAttributes, SplitTarget, TransferAttributes, TxAttributes, TxType, UnlockAttributes,
};

/// Errors raised while encoding or signing a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to encode transaction: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Predicate(#[from] PredicateError),
}
