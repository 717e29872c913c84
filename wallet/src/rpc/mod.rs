//! # Partition RPC
//!
//! The wallet talks to each partition through one collaborator interface,
//! [`PartitionClient`]. Everything else in the crate is written against the
//! trait, so the submission engine and dust collector run unchanged against
//! a live node ([`JsonRpcClient`]) or an in-process ledger
//! ([`InMemoryPartition`]).
//!
//! ```text
//! jsonrpc.rs — JSON-RPC 2.0 wire types and the reqwest-backed client
//! memory.rs  — in-memory partition that executes transactions locally
//! ```
//!
//! "Not found" is never an error at this layer: a proof that has not been
//! indexed yet or an owner without a fee-credit record comes back as
//! `Ok(None)`.

pub mod jsonrpc;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::transaction::{TransactionError, TransactionOrder, TxProof};
use crate::types::{FeeCreditRecord, TxHash, ValueUnit};

pub use jsonrpc::{JsonRpcClient, RpcError, RpcMethod, RpcRequest, RpcResponse};
pub use memory::InMemoryPartition;

/// Transport-level failures. Never retried by the wallet.
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Encoding(#[from] TransactionError),
}

/// Operations the wallet needs from a partition node.
#[async_trait]
pub trait PartitionClient: Send + Sync {
    /// Submit a signed transaction. Returns the partition's receipt bytes
    /// (the transaction hash as the node computed it).
    async fn send_transaction(&self, tx: &TransactionOrder) -> Result<Vec<u8>, RpcClientError>;

    /// Current round number of the partition.
    async fn get_round_number(&self) -> Result<u64, RpcClientError>;

    /// Inclusion proof for a transaction, `None` while not yet indexed.
    async fn get_transaction_proof(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TxProof>, RpcClientError>;

    /// Fee-credit record owned by `owner_id`, `None` if there is none.
    async fn get_fee_credit_record_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Option<FeeCreditRecord>, RpcClientError>;

    /// All value-bearing units owned by `owner_id`, in unit id order.
    async fn get_units_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Vec<ValueUnit>, RpcClientError>;
}
