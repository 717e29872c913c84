//! # JSON-RPC Client
//!
//! JSON-RPC 2.0 types and a `reqwest` client for partition nodes.
//!
//! ## Method Index
//!
//! | Method                          | Params             | Result                      |
//! |---------------------------------|--------------------|-----------------------------|
//! | `partition_sendTransaction`     | `[hex(tx)]`        | `hex(tx hash)`              |
//! | `partition_getRoundNumber`      | `[]`               | `u64`                       |
//! | `partition_getTransactionProof` | `[hex(tx hash)]`   | `hex(proof)` or `null`      |
//! | `partition_getFeeCreditRecord`  | `[hex(owner id)]`  | `FeeCreditRecord` or `null` |
//! | `partition_getUnitsByOwnerID`   | `[hex(owner id)]`  | `[ValueUnit]`               |
//!
//! Transactions and proofs travel as hex-encoded bincode so the JSON layer
//! never reorders the bytes a signature covers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PartitionClient, RpcClientError};
use crate::config::RPC_NOT_FOUND_CODE;
use crate::transaction::{TransactionOrder, TxProof};
use crate::types::{FeeCreditRecord, TxHash, ValueUnit};

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "partition_sendTransaction")]
    SendTransaction,
    #[serde(rename = "partition_getRoundNumber")]
    GetRoundNumber,
    #[serde(rename = "partition_getTransactionProof")]
    GetTransactionProof,
    #[serde(rename = "partition_getFeeCreditRecord")]
    GetFeeCreditRecord,
    #[serde(rename = "partition_getUnitsByOwnerID")]
    GetUnitsByOwnerId,
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always "2.0".
    pub jsonrpc: String,
    pub id: u64,
    pub method: RpcMethod,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` / `error` is set by a
/// conforming node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Unwrap the response into a typed result.
    ///
    /// A `null` result or the partition's not-found error code both become
    /// `Ok(None)`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<Option<T>, RpcClientError> {
        if let Some(err) = self.error {
            if err.code == RPC_NOT_FOUND_CODE {
                return Ok(None);
            }
            return Err(RpcClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        match self.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| RpcClientError::InvalidResponse(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonRpcClient
// ---------------------------------------------------------------------------

/// [`PartitionClient`] over HTTP JSON-RPC.
pub struct JsonRpcClient {
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcClientError::Transport(e.to_string()))?;
        Ok(Self {
            http_client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        debug!(?method, id, "rpc call");

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcClientError::Transport(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    RpcClientError::Transport(format!("connection failed: {e}"))
                } else {
                    RpcClientError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RpcClientError::Transport(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcClientError::InvalidResponse(e.to_string()))?;
        if body.id != id {
            return Err(RpcClientError::InvalidResponse(format!(
                "response id {} does not match request id {}",
                body.id, id
            )));
        }
        body.into_result()
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, RpcClientError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| RpcClientError::InvalidResponse(format!("{field}: {e}")))
}

#[async_trait]
impl PartitionClient for JsonRpcClient {
    async fn send_transaction(&self, tx: &TransactionOrder) -> Result<Vec<u8>, RpcClientError> {
        let params = serde_json::json!([hex::encode(tx.to_bytes()?)]);
        let receipt: String = self
            .call(RpcMethod::SendTransaction, params)
            .await?
            .ok_or_else(|| RpcClientError::InvalidResponse("empty send receipt".into()))?;
        decode_hex("send receipt", &receipt)
    }

    async fn get_round_number(&self) -> Result<u64, RpcClientError> {
        self.call(RpcMethod::GetRoundNumber, serde_json::json!([]))
            .await?
            .ok_or_else(|| RpcClientError::InvalidResponse("empty round number".into()))
    }

    async fn get_transaction_proof(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TxProof>, RpcClientError> {
        let params = serde_json::json!([tx_hash.to_hex()]);
        let Some(encoded) = self
            .call::<String>(RpcMethod::GetTransactionProof, params)
            .await?
        else {
            return Ok(None);
        };
        let bytes = decode_hex("transaction proof", &encoded)?;
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| RpcClientError::InvalidResponse(format!("transaction proof: {e}")))
    }

    async fn get_fee_credit_record_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Option<FeeCreditRecord>, RpcClientError> {
        self.call(
            RpcMethod::GetFeeCreditRecord,
            serde_json::json!([hex::encode(owner_id)]),
        )
        .await
    }

    async fn get_units_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Vec<ValueUnit>, RpcClientError> {
        Ok(self
            .call(
                RpcMethod::GetUnitsByOwnerId,
                serde_json::json!([hex::encode(owner_id)]),
            )
            .await?
            .unwrap_or_default())
    }
}
