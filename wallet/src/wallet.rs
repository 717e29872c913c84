//! # Wallet
//!
//! User-facing operations. Every operation that changes state goes through
//! the same pipeline:
//!
//! ```text
//! ensure fee credit ─▶ build order ─▶ attach proofs ─▶ submit ─▶ poll proofs
//! ```
//!
//! The wallet holds no state of its own between calls. Units are listed from
//! the partition each time and key material comes from the
//! [`AccountManager`].

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::accounts::{AccountError, AccountManager, AccountSelector};
use crate::config::{WalletConfig, LOCK_STATUS_UNLOCKED};
use crate::crypto::keys::AccountKey;
use crate::dust::{AccountDustResult, DustCollectionError, DustCollector, DustError};
use crate::fees::{self, FeeCreditError};
use crate::predicate::{Predicate, PredicateError, PredicateInput};
use crate::round::CachedRoundNumber;
use crate::rpc::{PartitionClient, RpcClientError};
use crate::transaction::{
    sign_transaction, AccountSigner, LockAttributes, MintAttributes, SplitAttributes,
    SplitTarget, TransactionError, TransferAttributes, TxAttributes, UnlockAttributes,
};
use crate::txsubmitter::{SubmitError, TxSubmission, TxSubmissionBatch};
use crate::types::{FeeCreditRecord, TypeId, UnitId, ValueUnit};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    FeeCredit(#[from] FeeCreditError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Rpc(#[from] RpcClientError),

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("lock status must be non-zero")]
    InvalidLockStatus,

    #[error("unit {0} not found")]
    UnitNotFound(UnitId),

    #[error("unit {0} is locked")]
    UnitLocked(UnitId),

    #[error("unit {0} is not locked")]
    UnitNotLocked(UnitId),
}

// ---------------------------------------------------------------------------
// Payment planning
// ---------------------------------------------------------------------------

/// One transaction of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStep {
    /// Hand over the whole unit.
    Transfer(ValueUnit),
    /// Split `amount` off the unit; the rest stays under the unit's id.
    Split { unit: ValueUnit, amount: u64 },
}

/// Decide which units pay `amount`.
///
/// A unit worth exactly `amount` is transferred whole. Otherwise units are
/// spent largest first and the last one is split.
pub fn plan_payment(
    mut units: Vec<ValueUnit>,
    amount: u64,
) -> Result<Vec<PaymentStep>, WalletError> {
    if amount == 0 {
        return Err(WalletError::InvalidAmount);
    }
    if let Some(pos) = units.iter().position(|u| u.amount == amount) {
        return Ok(vec![PaymentStep::Transfer(units.swap_remove(pos))]);
    }

    let available = units
        .iter()
        .fold(0u64, |acc, u| acc.saturating_add(u.amount));
    if available < amount {
        return Err(WalletError::InsufficientBalance {
            requested: amount,
            available,
        });
    }

    units.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.id.cmp(&b.id)));
    let mut remaining = amount;
    let mut steps = Vec::new();
    for unit in units {
        if remaining == 0 {
            break;
        }
        if unit.amount <= remaining {
            remaining -= unit.amount;
            steps.push(PaymentStep::Transfer(unit));
        } else {
            steps.push(PaymentStep::Split {
                unit,
                amount: remaining,
            });
            remaining = 0;
        }
    }
    Ok(steps)
}

/// Parameters of [`Wallet::send`].
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub account_index: u64,
    /// Receiver's owner id (SHA-256 of their public key).
    pub receiver: [u8; 32],
    pub amount: u64,
    pub type_id: TypeId,
    /// Proofs for the type's invariant predicates, if it has any.
    pub invariants: Vec<PredicateInput>,
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

pub struct Wallet {
    client: Arc<dyn PartitionClient>,
    accounts: Arc<dyn AccountManager>,
    config: WalletConfig,
    confirm: bool,
}

impl Wallet {
    pub fn new(
        client: Arc<dyn PartitionClient>,
        accounts: Arc<dyn AccountManager>,
        config: WalletConfig,
    ) -> Self {
        Self {
            client,
            accounts,
            config,
            confirm: true,
        }
    }

    /// Send without waiting for proofs. Dust collection always waits.
    pub fn without_confirmation(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn accounts(&self) -> &dyn AccountManager {
        self.accounts.as_ref()
    }

    /// Fee-credit record id of `account`, if it can pay for `tx_count`
    /// transactions.
    pub async fn ensure_fee_credit(
        &self,
        account: &AccountKey,
        tx_count: u64,
    ) -> Result<UnitId, WalletError> {
        Ok(fees::ensure_fee_credit(
            self.client.as_ref(),
            account,
            tx_count,
            self.config.max_fee_per_tx,
        )
        .await?)
    }

    /// Empty batch bound to this wallet's partition client.
    pub fn new_batch(&self) -> TxSubmissionBatch<'_> {
        TxSubmissionBatch::new(self.client.as_ref())
            .with_poll_interval(self.config.poll_interval())
    }

    pub async fn submit_and_confirm(
        &self,
        cancel: &CancellationToken,
        batch: &mut TxSubmissionBatch<'_>,
        confirm: bool,
    ) -> Result<(), WalletError> {
        batch.send_tx(cancel, confirm).await?;
        Ok(())
    }

    pub async fn list_units(&self, account_index: u64) -> Result<Vec<ValueUnit>, WalletError> {
        let key = self.accounts.account_key(account_index)?;
        Ok(self.client.get_units_by_owner_id(key.pub_key_hash()).await?)
    }

    pub async fn fee_credit(
        &self,
        account_index: u64,
    ) -> Result<Option<FeeCreditRecord>, WalletError> {
        let key = self.accounts.account_key(account_index)?;
        Ok(self
            .client
            .get_fee_credit_record_by_owner_id(key.pub_key_hash())
            .await?)
    }

    /// Pay `request.amount` of `request.type_id` to the receiver.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        request: &SendRequest,
    ) -> Result<Vec<TxSubmission>, WalletError> {
        if request.amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        let key = self.accounts.account_key(request.account_index)?;
        let units: Vec<ValueUnit> = self
            .client
            .get_units_by_owner_id(key.pub_key_hash())
            .await?
            .into_iter()
            .filter(|u| u.type_id == request.type_id && !u.is_locked())
            .collect();
        let plan = plan_payment(units, request.amount)?;

        let fee_credit_record = self.ensure_fee_credit(&key, plan.len() as u64).await?;
        let signer = self.signer(&key, fee_credit_record);
        let receiver = Predicate::PayToPublicKeyHash(request.receiver).to_bytes();
        let round = CachedRoundNumber::new(self.client.as_ref());

        let mut batch = self.new_batch();
        for step in plan {
            let timeout = round.timeout_after(self.config.tx_timeout_rounds).await?;
            let (unit_id, attributes) = match step {
                PaymentStep::Transfer(unit) => (
                    unit.id,
                    TxAttributes::Transfer(TransferAttributes {
                        type_id: unit.type_id,
                        new_owner_predicate: receiver.clone(),
                        value: unit.amount,
                        counter: unit.counter,
                    }),
                ),
                PaymentStep::Split { unit, amount } => (
                    unit.id,
                    TxAttributes::Split(SplitAttributes {
                        type_id: unit.type_id,
                        target_units: vec![SplitTarget {
                            amount,
                            owner_predicate: receiver.clone(),
                        }],
                        remaining_value: unit.amount - amount,
                        counter: unit.counter,
                    }),
                ),
            };
            batch.add(TxSubmission::new(signer.sign(
                unit_id,
                attributes,
                timeout,
                &request.invariants,
            )?)?);
        }

        self.submit_and_confirm(cancel, &mut batch, self.confirm).await?;
        info!(amount = request.amount, txs = batch.len(), "payment sent");
        Ok(batch.into_submissions())
    }

    /// Lock a unit with a non-zero `lock_status`.
    pub async fn lock(
        &self,
        cancel: &CancellationToken,
        account_index: u64,
        unit_id: &UnitId,
        lock_status: u64,
    ) -> Result<TxSubmission, WalletError> {
        if lock_status == LOCK_STATUS_UNLOCKED {
            return Err(WalletError::InvalidLockStatus);
        }
        let key = self.accounts.account_key(account_index)?;
        let unit = self.owned_unit(&key, unit_id).await?;
        if unit.is_locked() {
            return Err(WalletError::UnitLocked(unit.id));
        }
        let attributes = TxAttributes::Lock(LockAttributes {
            lock_status,
            counter: unit.counter,
        });
        self.submit_single(cancel, &key, unit.id, attributes).await
    }

    pub async fn unlock(
        &self,
        cancel: &CancellationToken,
        account_index: u64,
        unit_id: &UnitId,
    ) -> Result<TxSubmission, WalletError> {
        let key = self.accounts.account_key(account_index)?;
        let unit = self.owned_unit(&key, unit_id).await?;
        if !unit.is_locked() {
            return Err(WalletError::UnitNotLocked(unit.id));
        }
        let attributes = TxAttributes::Unlock(UnlockAttributes {
            counter: unit.counter,
        });
        self.submit_single(cancel, &key, unit.id, attributes).await
    }

    /// Mint `amount` of `type_id` to the account. `mint_input` satisfies the
    /// type's minting predicate; the account pays the fee.
    pub async fn mint(
        &self,
        cancel: &CancellationToken,
        account_index: u64,
        type_id: &TypeId,
        amount: u64,
        mint_input: Option<&PredicateInput>,
    ) -> Result<TxSubmission, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount);
        }
        if mint_input.is_none() {
            return Err(PredicateError::NilPredicateInput("mint proof".into()).into());
        }
        let key = self.accounts.account_key(account_index)?;
        let fee_credit_record = self.ensure_fee_credit(&key, 1).await?;
        let signer = self.signer(&key, fee_credit_record);

        let owner_predicate = Predicate::pay_to(&key).to_bytes();
        let nonce: u64 = rand::random();
        let unit_id = UnitId::for_mint(type_id, &owner_predicate, nonce);
        let timeout = CachedRoundNumber::new(self.client.as_ref())
            .timeout_after(self.config.tx_timeout_rounds)
            .await?;
        let mut tx = signer.build(
            unit_id,
            TxAttributes::Mint(MintAttributes {
                type_id: type_id.clone(),
                value: amount,
                owner_predicate,
                nonce,
            }),
            timeout,
        );
        let fee_payer = PredicateInput::AccountKey(key.clone());
        sign_transaction(&mut tx, mint_input, Some(&fee_payer), &[])?;

        self.submit_one(cancel, TxSubmission::new(tx)?).await
    }

    /// Consolidate small units of the selected accounts.
    pub async fn collect_dust(
        &self,
        cancel: &CancellationToken,
        selector: AccountSelector,
        allowed_types: &[TypeId],
        invariants: &[PredicateInput],
    ) -> Result<Vec<AccountDustResult>, DustCollectionError> {
        let accounts = selector
            .resolve(self.accounts.as_ref())
            .map_err(|e| DustCollectionError {
                results: Vec::new(),
                source: DustError::Account(e),
            })?;
        DustCollector::new(self.client.as_ref(), &self.config)
            .collect_dust(cancel, &accounts, allowed_types, invariants)
            .await
    }

    // -- helpers ------------------------------------------------------------

    async fn submit_one(
        &self,
        cancel: &CancellationToken,
        submission: TxSubmission,
    ) -> Result<TxSubmission, WalletError> {
        let mut batch = self.new_batch();
        batch.add(submission);
        self.submit_and_confirm(cancel, &mut batch, self.confirm).await?;
        // Exactly the one submission added above.
        Ok(batch.into_submissions().remove(0))
    }

    fn signer<'k>(&self, key: &'k AccountKey, fee_credit_record: UnitId) -> AccountSigner<'k> {
        AccountSigner::new(
            key,
            self.config.partition_id,
            self.config.max_fee_per_tx,
            fee_credit_record,
        )
    }

    async fn owned_unit(
        &self,
        key: &AccountKey,
        unit_id: &UnitId,
    ) -> Result<ValueUnit, WalletError> {
        self.client
            .get_units_by_owner_id(key.pub_key_hash())
            .await?
            .into_iter()
            .find(|u| &u.id == unit_id)
            .ok_or_else(|| WalletError::UnitNotFound(unit_id.clone()))
    }

    async fn submit_single(
        &self,
        cancel: &CancellationToken,
        key: &AccountKey,
        unit_id: UnitId,
        attributes: TxAttributes,
    ) -> Result<TxSubmission, WalletError> {
        let fee_credit_record = self.ensure_fee_credit(key, 1).await?;
        let timeout = CachedRoundNumber::new(self.client.as_ref())
            .timeout_after(self.config.tx_timeout_rounds)
            .await?;
        let tx = self
            .signer(key, fee_credit_record)
            .sign(unit_id, attributes, timeout, &[])?;

        self.submit_one(cancel, TxSubmission::new(tx)?).await
    }
}
