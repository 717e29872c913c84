//! Fee-credit precondition.
//!
//! Every transaction is paid for from the sending account's fee-credit
//! record. The partition does the authoritative balance check when it
//! executes; this guard only stops the wallet from sending transactions that
//! are bound to be rejected.

use thiserror::Error;
use tracing::debug;

use crate::crypto::keys::AccountKey;
use crate::rpc::{PartitionClient, RpcClientError};
use crate::types::UnitId;

#[derive(Debug, Error)]
pub enum FeeCreditError {
    #[error("no fee credit for account {owner}")]
    NoFeeCredit { owner: String },

    #[error(
        "insufficient fee credit: balance {balance} does not cover {tx_count} \
         transaction(s) at {max_fee_per_tx} each"
    )]
    InsufficientFeeCredit {
        balance: u64,
        tx_count: u64,
        max_fee_per_tx: u64,
    },

    #[error(transparent)]
    Rpc(#[from] RpcClientError),
}

/// Check that `account` can pay for `expected_tx_count` transactions and
/// return the id of its fee-credit record.
pub async fn ensure_fee_credit(
    client: &dyn PartitionClient,
    account: &AccountKey,
    expected_tx_count: u64,
    max_fee_per_tx: u64,
) -> Result<UnitId, FeeCreditError> {
    let record = client
        .get_fee_credit_record_by_owner_id(account.pub_key_hash())
        .await?
        .ok_or_else(|| FeeCreditError::NoFeeCredit {
            owner: hex::encode(account.pub_key_hash()),
        })?;

    let required = expected_tx_count.saturating_mul(max_fee_per_tx);
    if record.balance < required {
        return Err(FeeCreditError::InsufficientFeeCredit {
            balance: record.balance,
            tx_count: expected_tx_count,
            max_fee_per_tx,
        });
    }
    debug!(fcr = %record.id, balance = record.balance, required, "fee credit ok");
    Ok(record.id)
}
