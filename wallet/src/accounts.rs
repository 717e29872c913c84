//! Account keys.
//!
//! Key storage lives outside the wallet core; the core only needs to look
//! keys up by account number through [`AccountManager`]. [`KeyRing`] is the
//! in-memory implementation used by the CLI: every account key is derived
//! from one master seed, so the seed file is the whole backup.

use thiserror::Error;

use crate::crypto::hash::sha256_concat;
use crate::crypto::keys::AccountKey;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid account number {index}: wallet has {count} account(s)")]
    InvalidAccountNumber { index: u64, count: usize },

    #[error("invalid master seed: {0}")]
    InvalidSeed(String),
}

/// Key lookup by zero-based account number.
pub trait AccountManager: Send + Sync {
    fn account_count(&self) -> usize;

    fn account_key(&self, index: u64) -> Result<AccountKey, AccountError>;

    /// Every account key, ordered by account number.
    fn account_keys(&self) -> Vec<AccountKey>;
}

/// Which accounts an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSelector {
    All,
    Index(u64),
}

impl AccountSelector {
    /// `(account number, key)` pairs selected from `accounts`.
    pub fn resolve(
        &self,
        accounts: &dyn AccountManager,
    ) -> Result<Vec<(u64, AccountKey)>, AccountError> {
        match self {
            Self::All => Ok(accounts
                .account_keys()
                .into_iter()
                .enumerate()
                .map(|(i, key)| (i as u64, key))
                .collect()),
            Self::Index(index) => Ok(vec![(*index, accounts.account_key(*index)?)]),
        }
    }
}

// ---------------------------------------------------------------------------
// KeyRing
// ---------------------------------------------------------------------------

/// Deterministic key ring: account `i` is `sha256(seed || i)`.
pub struct KeyRing {
    seed: [u8; 32],
    keys: Vec<AccountKey>,
}

impl KeyRing {
    pub fn from_seed(seed: [u8; 32], accounts: usize) -> Self {
        let mut ring = Self {
            seed,
            keys: Vec::with_capacity(accounts),
        };
        for _ in 0..accounts {
            ring.add_account();
        }
        ring
    }

    /// Parse a hex-encoded 32-byte seed, as stored in a seed file.
    pub fn from_hex_seed(hex_seed: &str, accounts: usize) -> Result<Self, AccountError> {
        let bytes = hex::decode(hex_seed.trim().trim_start_matches("0x"))
            .map_err(|e| AccountError::InvalidSeed(e.to_string()))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            AccountError::InvalidSeed(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::from_seed(seed, accounts))
    }

    /// Derive the next account. Returns its account number.
    pub fn add_account(&mut self) -> u64 {
        let index = self.keys.len() as u64;
        let derived = sha256_concat(&[&self.seed, &index.to_be_bytes()]);
        self.keys.push(AccountKey::from_seed(&derived));
        index
    }
}

impl AccountManager for KeyRing {
    fn account_count(&self) -> usize {
        self.keys.len()
    }

    fn account_key(&self, index: u64) -> Result<AccountKey, AccountError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.keys.get(i))
            .cloned()
            .ok_or(AccountError::InvalidAccountNumber {
                index,
                count: self.keys.len(),
            })
    }

    fn account_keys(&self) -> Vec<AccountKey> {
        self.keys.clone()
    }
}
