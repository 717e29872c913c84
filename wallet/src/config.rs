//! # Wallet Configuration & Constants
//!
//! Every protocol number the wallet depends on lives here, next to the
//! [`WalletConfig`] struct that bundles the tunable ones. If a constant shows
//! up hardcoded somewhere else, it belongs in this file instead.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Fee ceiling attached to every transaction, in the fee-credit smallest unit.
///
/// The fee-credit guard multiplies this by the expected transaction count to
/// decide whether an operation is worth submitting at all.
pub const MAX_FEE_PER_TX: u64 = 10;

// ---------------------------------------------------------------------------
// Transaction lifetime
// ---------------------------------------------------------------------------

/// How many rounds past the current round a transaction stays valid.
pub const TX_TIMEOUT_ROUNDS: u64 = 10;

/// Fixed interval between confirmation polling passes.
pub const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Dust collection
// ---------------------------------------------------------------------------

/// Upper bound on the number of burns submitted in a single batch.
pub const MAX_BURN_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Lock reasons
// ---------------------------------------------------------------------------

/// Unit is not locked.
pub const LOCK_STATUS_UNLOCKED: u64 = 0;

/// Locked by the owner through an explicit lock command.
pub const LOCK_STATUS_MANUAL: u64 = 1;

/// Reserved for a pending fee-credit operation.
pub const LOCK_STATUS_FEE_CREDIT: u64 = 2;

/// Reserved as the target of a dust collection join.
pub const LOCK_STATUS_DUST_COLLECTING: u64 = 3;

// ---------------------------------------------------------------------------
// RPC
// ---------------------------------------------------------------------------

/// Default partition RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:26866/rpc";

/// Default partition identifier (the money partition).
pub const DEFAULT_PARTITION_ID: u32 = 1;

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC error code a partition uses for "no such unit / proof / record".
pub const RPC_NOT_FOUND_CODE: i32 = -32004;

// ---------------------------------------------------------------------------
// WalletConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`WalletConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one wallet instance talking to one partition.
///
/// Missing fields in a config file fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Partition JSON-RPC endpoint.
    pub rpc_url: String,
    /// Partition the transactions are addressed to.
    pub partition_id: u32,
    /// Maximum number of burns per dust-collection chunk.
    pub max_burn_batch_size: usize,
    /// Rounds a transaction stays valid after the round it was built in.
    pub tx_timeout_rounds: u64,
    /// Fee ceiling per transaction.
    pub max_fee_per_tx: u64,
    /// Sleep between confirmation polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// HTTP request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            partition_id: DEFAULT_PARTITION_ID,
            max_burn_batch_size: MAX_BURN_BATCH_SIZE,
            tx_timeout_rounds: TX_TIMEOUT_ROUNDS,
            max_fee_per_tx: MAX_FEE_PER_TX,
            poll_interval_ms: CONFIRMATION_POLL_INTERVAL.as_millis() as u64,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl WalletConfig {
    /// Load a config from a JSON file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engine loop forever or never send.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.is_empty() {
            return Err(ConfigError::Invalid("rpc_url must not be empty".into()));
        }
        if self.max_burn_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "max_burn_batch_size must be at least 1".into(),
            ));
        }
        if self.tx_timeout_rounds == 0 {
            return Err(ConfigError::Invalid(
                "tx_timeout_rounds must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// HTTP request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
