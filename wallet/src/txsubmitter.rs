//! # Transaction Submission Engine
//!
//! Sends signed transactions to a partition and polls until each one is
//! confirmed by an inclusion proof or its timeout round has passed.
//!
//! ## Confirmation Loop
//!
//! ```text
//!   ┌──────────────┐
//!   │  cancelled?  │──yes──▶ Cancelled
//!   └──────┬───────┘
//!          ▼
//!   fetch round R
//!          │
//!          ▼
//!   for each unconfirmed submission with timeout >= R:
//!       fetch proof by hash, attach if found
//!          │
//!          ├── all confirmed ──▶ Ok / TransactionsFailed
//!          ├── R > max_timeout ──▶ ConfirmationTimeout (unconfirmed logged)
//!          ▼
//!   sleep poll interval (aborts on cancel) ──▶ repeat
//! ```
//!
//! Only the poll is retried. A failed send aborts the batch; submissions sent
//! before it stay sent.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CONFIRMATION_POLL_INTERVAL;
use crate::rpc::{PartitionClient, RpcClientError};
use crate::transaction::{TransactionError, TransactionOrder, TxProof, TxType};
use crate::types::{TxHash, UnitId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to encode transaction: {0}")]
    Encoding(#[from] TransactionError),

    #[error("failed to send {tx_type} transaction for unit {unit_id}: {source}")]
    Send {
        unit_id: UnitId,
        tx_type: TxType,
        #[source]
        source: RpcClientError,
    },

    #[error("failed to poll partition: {0}")]
    Poll(#[from] RpcClientError),

    #[error("confirmation cancelled")]
    Cancelled,

    #[error(
        "confirmation timeout: {unconfirmed} of {total} transactions not confirmed \
         by round {max_timeout} (current round {round})"
    )]
    ConfirmationTimeout {
        unconfirmed: usize,
        total: usize,
        max_timeout: u64,
        round: u64,
    },

    #[error("{failed} of {total} transactions failed")]
    TransactionsFailed { failed: usize, total: usize },
}

// ---------------------------------------------------------------------------
// TxSubmission
// ---------------------------------------------------------------------------

/// One signed transaction and, once included, its proof.
#[derive(Debug, Clone)]
pub struct TxSubmission {
    pub unit_id: UnitId,
    pub tx_hash: TxHash,
    pub transaction: TransactionOrder,
    pub proof: Option<TxProof>,
}

impl TxSubmission {
    pub fn new(transaction: TransactionOrder) -> Result<Self, SubmitError> {
        let tx_hash = transaction.hash()?;
        Ok(Self {
            unit_id: transaction.unit_id().clone(),
            tx_hash,
            transaction,
            proof: None,
        })
    }

    /// Confirmation is terminal; a proof is never taken back.
    pub fn confirmed(&self) -> bool {
        self.proof.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.proof.as_ref().is_some_and(TxProof::is_successful)
    }
}

// ---------------------------------------------------------------------------
// TxSubmissionBatch
// ---------------------------------------------------------------------------

/// Submissions that are sent together and share one confirmation loop.
///
/// Single use: build it, send it, read the proofs, drop it.
pub struct TxSubmissionBatch<'a> {
    client: &'a dyn PartitionClient,
    submissions: Vec<TxSubmission>,
    max_timeout: u64,
    poll_interval: Duration,
}

impl<'a> TxSubmissionBatch<'a> {
    pub fn new(client: &'a dyn PartitionClient) -> Self {
        Self {
            client,
            submissions: Vec::new(),
            max_timeout: 0,
            poll_interval: CONFIRMATION_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn add(&mut self, submission: TxSubmission) {
        self.max_timeout = self.max_timeout.max(submission.transaction.timeout());
        self.submissions.push(submission);
    }

    /// Highest timeout round of any member.
    pub fn max_timeout(&self) -> u64 {
        self.max_timeout
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn submissions(&self) -> &[TxSubmission] {
        &self.submissions
    }

    pub fn into_submissions(self) -> Vec<TxSubmission> {
        self.submissions
    }

    /// Proofs of confirmed submissions, in insertion order.
    pub fn proofs(&self) -> Vec<TxProof> {
        self.submissions
            .iter()
            .filter_map(|s| s.proof.clone())
            .collect()
    }

    /// Fees actually charged for the confirmed submissions.
    pub fn total_fees(&self) -> u64 {
        self.submissions
            .iter()
            .filter_map(|s| s.proof.as_ref())
            .map(TxProof::actual_fee)
            .sum()
    }

    /// Send every submission in order, then optionally wait for all of them.
    ///
    /// Cancellation is checked before every round trip. Submissions sent
    /// before the token fired stay sent.
    pub async fn send_tx(
        &mut self,
        cancel: &CancellationToken,
        confirm: bool,
    ) -> Result<(), SubmitError> {
        for sub in &self.submissions {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled);
            }
            let receipt = self
                .client
                .send_transaction(&sub.transaction)
                .await
                .map_err(|source| SubmitError::Send {
                    unit_id: sub.unit_id.clone(),
                    tx_type: sub.transaction.tx_type(),
                    source,
                })?;
            debug!(
                unit = %sub.unit_id,
                tx_hash = %sub.tx_hash,
                receipt = %hex::encode(&receipt),
                "transaction sent"
            );
        }

        if !confirm || self.submissions.is_empty() {
            return Ok(());
        }
        self.confirm(cancel).await
    }

    async fn confirm(&mut self, cancel: &CancellationToken) -> Result<(), SubmitError> {
        let total = self.submissions.len();
        loop {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled);
            }

            let round = self.client.get_round_number().await?;
            for sub in self.submissions.iter_mut() {
                if sub.confirmed() || sub.transaction.timeout() < round {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(SubmitError::Cancelled);
                }
                if let Some(proof) = self.client.get_transaction_proof(&sub.tx_hash).await? {
                    debug!(unit = %sub.unit_id, tx_hash = %sub.tx_hash, round = proof.round, "transaction confirmed");
                    sub.proof = Some(proof);
                }
            }

            let confirmed = self.submissions.iter().filter(|s| s.confirmed()).count();
            debug!(round, confirmed, total, "confirmation pass");

            if confirmed == total {
                let failed = self.submissions.iter().filter(|s| !s.succeeded()).count();
                if failed > 0 {
                    return Err(SubmitError::TransactionsFailed { failed, total });
                }
                info!(total, round, "batch confirmed");
                return Ok(());
            }

            if round > self.max_timeout {
                for sub in self.submissions.iter().filter(|s| !s.confirmed()) {
                    warn!(
                        unit = %sub.unit_id,
                        tx_hash = %sub.tx_hash,
                        timeout = sub.transaction.timeout(),
                        "transaction not confirmed"
                    );
                }
                return Err(SubmitError::ConfirmationTimeout {
                    unconfirmed: total - confirmed,
                    total,
                    max_timeout: self.max_timeout,
                    round,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return Err(SubmitError::Cancelled),
            }
        }
    }
}
