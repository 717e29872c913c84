//! # Dust Collection
//!
//! Consolidates an account's small same-type units into one by burning them
//! into a target unit and joining the burns.
//!
//! ## Per (account, type) group
//!
//! ```text
//! units ── drop locked ── group by type ── drop groups < 2 / not allowed
//!                                              │
//!                 target = first unit, candidates = the rest
//!                                              │
//!           for each chunk of max_burn_batch_size candidates:
//!               overflow check ── would overflow ──▶ stop group
//!               1. lock target            (own batch, confirmed)
//!               2. burn every candidate   (one batch, confirmed)
//!               3. join sorted burn proofs into target (own batch, confirmed)
//! ```
//!
//! The target's counter is threaded through the chunks as data: +1 for the
//! lock, +1 for the join. Burns reference the counter the target has after
//! the lock.
//!
//! Overflow is a stop condition, not an error. Completed chunks are still
//! reported; a group whose first chunk would overflow yields no result.
//! Any other failure aborts the whole call and is returned together with the
//! results produced so far. Cancellation is checked before each step, so a
//! cancelled call never locks a target it will not burn into.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::accounts::AccountError;
use crate::config::{
    ConfigError, WalletConfig, LOCK_STATUS_DUST_COLLECTING, LOCK_STATUS_UNLOCKED,
};
use crate::crypto::keys::AccountKey;
use crate::fees::{ensure_fee_credit, FeeCreditError};
use crate::predicate::PredicateInput;
use crate::round::CachedRoundNumber;
use crate::rpc::{PartitionClient, RpcClientError};
use crate::transaction::{
    AccountSigner, BurnAttributes, JoinAttributes, LockAttributes, TxAttributes, TxProof,
};
use crate::txsubmitter::{SubmitError, TxSubmission, TxSubmissionBatch};
use crate::types::{TypeId, UnitId, ValueUnit};

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

/// Outcome of consolidating one type for one account.
#[derive(Debug, Clone)]
pub struct DustCollectionResult {
    pub type_id: TypeId,
    pub target_unit_id: UnitId,
    /// Target amount after the last completed chunk.
    pub target_amount: u64,
    pub burned_units: usize,
    pub chunks: usize,
    /// Fees charged for every lock, burn and join of the completed chunks.
    pub fee_sum: u64,
    pub join_proofs: Vec<TxProof>,
}

#[derive(Debug, Clone)]
pub struct AccountDustResult {
    pub account_index: u64,
    pub results: Vec<DustCollectionResult>,
}

impl AccountDustResult {
    pub fn fee_sum(&self) -> u64 {
        self.results.iter().map(|r| r.fee_sum).sum()
    }
}

/// Step of a chunk, for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DustStage {
    Lock,
    Burn,
    Join,
}

impl std::fmt::Display for DustStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lock => write!(f, "lock"),
            Self::Burn => write!(f, "burn"),
            Self::Join => write!(f, "join"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DustError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    FeeCredit(#[from] FeeCreditError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to list units: {0}")]
    ListUnits(#[source] RpcClientError),

    #[error("failed to fetch round number: {0}")]
    Round(#[source] RpcClientError),

    #[error("dust collection {stage} step failed for target unit {target}: {source}")]
    Stage {
        stage: DustStage,
        target: UnitId,
        #[source]
        source: SubmitError,
    },
}

/// A failed dust collection, with everything that completed before it.
#[derive(Debug, Error)]
#[error("dust collection failed: {source}")]
pub struct DustCollectionError {
    pub results: Vec<AccountDustResult>,
    #[source]
    pub source: DustError,
}

fn stage_error(stage: DustStage, target: &UnitId) -> impl FnOnce(SubmitError) -> DustError {
    let target = target.clone();
    move |source| DustError::Stage {
        stage,
        target,
        source,
    }
}

fn ensure_not_cancelled(
    cancel: &CancellationToken,
    stage: DustStage,
    target: &UnitId,
) -> Result<(), DustError> {
    if cancel.is_cancelled() {
        return Err(stage_error(stage, target)(SubmitError::Cancelled));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Unlocked units grouped by type, keeping only groups with something to
/// consolidate. A non-empty `allowed_types` restricts the types considered.
///
/// Units keep the order they were listed in, so the first unit of each group
/// is the same on every call.
pub fn group_units(
    units: Vec<ValueUnit>,
    allowed_types: &[TypeId],
) -> BTreeMap<TypeId, Vec<ValueUnit>> {
    let mut groups: BTreeMap<TypeId, Vec<ValueUnit>> = BTreeMap::new();
    for unit in units.into_iter().filter(|u| !u.is_locked()) {
        if !allowed_types.is_empty() && !allowed_types.contains(&unit.type_id) {
            continue;
        }
        groups.entry(unit.type_id.clone()).or_default().push(unit);
    }
    groups.retain(|_, group| group.len() >= 2);
    groups
}

// ---------------------------------------------------------------------------
// DustCollector
// ---------------------------------------------------------------------------

pub struct DustCollector<'a> {
    client: &'a dyn PartitionClient,
    config: &'a WalletConfig,
}

struct ChunkOutcome {
    fees: u64,
    join_proofs: Vec<TxProof>,
}

impl<'a> DustCollector<'a> {
    pub fn new(client: &'a dyn PartitionClient, config: &'a WalletConfig) -> Self {
        Self { client, config }
    }

    /// Consolidate every eligible group of every given account, in order.
    ///
    /// Only accounts that produced at least one result appear in the output.
    pub async fn collect_dust(
        &self,
        cancel: &CancellationToken,
        accounts: &[(u64, AccountKey)],
        allowed_types: &[TypeId],
        invariants: &[PredicateInput],
    ) -> Result<Vec<AccountDustResult>, DustCollectionError> {
        if let Err(e) = self.config.validate() {
            return Err(DustCollectionError {
                results: Vec::new(),
                source: e.into(),
            });
        }

        let mut results = Vec::new();
        for (account_index, key) in accounts {
            let mut account = AccountDustResult {
                account_index: *account_index,
                results: Vec::new(),
            };
            let outcome = self
                .collect_account(cancel, key, allowed_types, invariants, &mut account.results)
                .await;
            if !account.results.is_empty() {
                results.push(account);
            }
            if let Err(source) = outcome {
                return Err(DustCollectionError { results, source });
            }
        }
        Ok(results)
    }

    async fn collect_account(
        &self,
        cancel: &CancellationToken,
        key: &AccountKey,
        allowed_types: &[TypeId],
        invariants: &[PredicateInput],
        out: &mut Vec<DustCollectionResult>,
    ) -> Result<(), DustError> {
        let fee_credit_record =
            ensure_fee_credit(self.client, key, 1, self.config.max_fee_per_tx).await?;
        let units = self
            .client
            .get_units_by_owner_id(key.pub_key_hash())
            .await
            .map_err(DustError::ListUnits)?;

        let signer = AccountSigner::new(
            key,
            self.config.partition_id,
            self.config.max_fee_per_tx,
            fee_credit_record,
        );
        for group in group_units(units, allowed_types).into_values() {
            let mut progress = None;
            let outcome = self
                .collect_group(cancel, &signer, group, invariants, &mut progress)
                .await;
            out.extend(progress);
            outcome?;
        }
        Ok(())
    }

    async fn collect_group(
        &self,
        cancel: &CancellationToken,
        signer: &AccountSigner<'_>,
        group: Vec<ValueUnit>,
        invariants: &[PredicateInput],
        progress: &mut Option<DustCollectionResult>,
    ) -> Result<(), DustError> {
        let mut units = group.into_iter();
        let Some(mut target) = units.next() else {
            return Ok(());
        };
        let candidates: Vec<ValueUnit> = units.collect();

        for chunk in candidates.chunks(self.config.max_burn_batch_size) {
            let Some(joined_amount) = chunk
                .iter()
                .try_fold(target.amount, |acc, unit| acc.checked_add(unit.amount))
            else {
                warn!(
                    target = %target.id,
                    type_id = %target.type_id,
                    amount = target.amount,
                    "joining next chunk would overflow the target amount, stopping"
                );
                break;
            };

            let outcome = self
                .run_chunk(cancel, signer, &mut target, chunk, joined_amount, invariants)
                .await?;

            let result = progress.get_or_insert_with(|| DustCollectionResult {
                type_id: target.type_id.clone(),
                target_unit_id: target.id.clone(),
                target_amount: 0,
                burned_units: 0,
                chunks: 0,
                fee_sum: 0,
                join_proofs: Vec::new(),
            });
            result.target_amount = target.amount;
            result.burned_units += chunk.len();
            result.chunks += 1;
            result.fee_sum += outcome.fees;
            result.join_proofs.extend(outcome.join_proofs);
            info!(
                target = %target.id,
                burned = chunk.len(),
                amount = target.amount,
                fees = outcome.fees,
                "dust chunk joined"
            );
        }
        Ok(())
    }

    /// Lock, burn and join one chunk. `target` is updated in place with the
    /// counter, amount and lock status the partition now holds.
    async fn run_chunk(
        &self,
        cancel: &CancellationToken,
        signer: &AccountSigner<'_>,
        target: &mut ValueUnit,
        chunk: &[ValueUnit],
        joined_amount: u64,
        invariants: &[PredicateInput],
    ) -> Result<ChunkOutcome, DustError> {
        // Lock.
        ensure_not_cancelled(cancel, DustStage::Lock, &target.id)?;
        let round = CachedRoundNumber::new(self.client);
        let timeout = round
            .timeout_after(self.config.tx_timeout_rounds)
            .await
            .map_err(DustError::Round)?;
        let mut lock = self.batch();
        lock.add(
            self.submission(
                signer,
                target.id.clone(),
                TxAttributes::Lock(LockAttributes {
                    lock_status: LOCK_STATUS_DUST_COLLECTING,
                    counter: target.counter,
                }),
                timeout,
                &[],
            )
            .map_err(stage_error(DustStage::Lock, &target.id))?,
        );
        lock.send_tx(cancel, true)
            .await
            .map_err(stage_error(DustStage::Lock, &target.id))?;
        target.counter += 1;
        target.lock_status = LOCK_STATUS_DUST_COLLECTING;
        let mut fees = lock.total_fees();

        // Burn.
        ensure_not_cancelled(cancel, DustStage::Burn, &target.id)?;
        let round = CachedRoundNumber::new(self.client);
        let mut burns = self.batch();
        for unit in chunk {
            let timeout = round
                .timeout_after(self.config.tx_timeout_rounds)
                .await
                .map_err(DustError::Round)?;
            burns.add(
                self.submission(
                    signer,
                    unit.id.clone(),
                    TxAttributes::Burn(BurnAttributes {
                        type_id: unit.type_id.clone(),
                        value: unit.amount,
                        target_unit_id: target.id.clone(),
                        target_unit_counter: target.counter,
                        counter: unit.counter,
                    }),
                    timeout,
                    invariants,
                )
                .map_err(stage_error(DustStage::Burn, &target.id))?,
            );
        }
        burns
            .send_tx(cancel, true)
            .await
            .map_err(stage_error(DustStage::Burn, &target.id))?;
        fees += burns.total_fees();

        let mut burn_proofs = burns.proofs();
        burn_proofs.sort_by(|a, b| a.unit_id().cmp(b.unit_id()));

        // Join.
        ensure_not_cancelled(cancel, DustStage::Join, &target.id)?;
        let timeout = CachedRoundNumber::new(self.client)
            .timeout_after(self.config.tx_timeout_rounds)
            .await
            .map_err(DustError::Round)?;
        let mut join = self.batch();
        join.add(
            self.submission(
                signer,
                target.id.clone(),
                TxAttributes::Join(JoinAttributes {
                    burn_proofs,
                    counter: target.counter,
                }),
                timeout,
                invariants,
            )
            .map_err(stage_error(DustStage::Join, &target.id))?,
        );
        join.send_tx(cancel, true)
            .await
            .map_err(stage_error(DustStage::Join, &target.id))?;
        target.counter += 1;
        target.amount = joined_amount;
        target.lock_status = LOCK_STATUS_UNLOCKED;
        fees += join.total_fees();

        Ok(ChunkOutcome {
            fees,
            join_proofs: join.proofs(),
        })
    }

    fn batch(&self) -> TxSubmissionBatch<'a> {
        TxSubmissionBatch::new(self.client).with_poll_interval(self.config.poll_interval())
    }

    fn submission(
        &self,
        signer: &AccountSigner<'_>,
        unit_id: UnitId,
        attributes: TxAttributes,
        timeout: u64,
        invariants: &[PredicateInput],
    ) -> Result<TxSubmission, SubmitError> {
        TxSubmission::new(signer.sign(unit_id, attributes, timeout, invariants)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use crate::rpc::InMemoryPartition;
    use crate::transaction::TxType;

    fn unit(id: u8, type_id: u8, amount: u64) -> ValueUnit {
        ValueUnit {
            id: UnitId::new(vec![id]),
            type_id: UnitId::new(vec![type_id]),
            amount,
            counter: 0,
            lock_status: 0,
        }
    }

    fn account() -> AccountKey {
        AccountKey::from_seed(&[11u8; 32])
    }

    fn seeded(units: Vec<ValueUnit>) -> InMemoryPartition {
        let partition = InMemoryPartition::new();
        partition.set_fee_credit(&account(), 10_000);
        for u in units {
            partition.add_unit(u, Predicate::pay_to(&account()));
        }
        partition
    }

    async fn collect(
        partition: &InMemoryPartition,
        config: &WalletConfig,
        allowed: &[TypeId],
    ) -> Result<Vec<AccountDustResult>, DustCollectionError> {
        DustCollector::new(partition, config)
            .collect_dust(
                &CancellationToken::new(),
                &[(0, account())],
                allowed,
                &[],
            )
            .await
    }

    #[test]
    fn grouping_skips_locked_small_and_disallowed() {
        let mut locked = unit(1, 0xa, 5);
        locked.lock_status = 1;
        let units = vec![
            locked,
            unit(2, 0xa, 5),
            unit(3, 0xa, 5),
            unit(4, 0xb, 5),
            unit(5, 0xc, 5),
            unit(6, 0xc, 5),
        ];

        let groups = group_units(units.clone(), &[]);
        assert_eq!(groups.len(), 2);
        let a = &groups[&UnitId::new(vec![0xa])];
        let ids: Vec<_> = a.iter().map(|u| u.id.clone()).collect();
        assert_eq!(ids, vec![UnitId::new(vec![2]), UnitId::new(vec![3])]);

        let only_c = group_units(units, &[UnitId::new(vec![0xc])]);
        let types: Vec<_> = only_c.keys().cloned().collect();
        assert_eq!(types, vec![UnitId::new(vec![0xc])]);
    }

    #[tokio::test(start_paused = true)]
    async fn ten_units_collapse_in_one_chunk() {
        let partition = seeded((1..=10).map(|i| unit(i, 0xa, i as u64)).collect());
        partition.set_fee_per_tx(3);
        let config = WalletConfig::default();

        let results = collect(&partition, &config, &[]).await.unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0].results[0];
        assert_eq!(r.target_unit_id, UnitId::new(vec![1]));
        assert_eq!(r.target_amount, 55);
        assert_eq!(r.burned_units, 9);
        assert_eq!(r.chunks, 1);
        // lock + 9 burns + join at 3 each
        assert_eq!(r.fee_sum, 33);
        assert_eq!(partition.fee_credit_balance(&account()), Some(10_000 - 33));

        assert_eq!(partition.sent_count(TxType::Lock), 1);
        assert_eq!(partition.sent_count(TxType::Burn), 9);
        assert_eq!(partition.sent_count(TxType::Join), 1);

        let target = partition.unit(&UnitId::new(vec![1])).unwrap();
        assert_eq!(target.amount, 55);
        assert_eq!(target.counter, 2);
        assert!(!target.is_locked());
        for i in 2..=10 {
            assert!(partition.unit(&UnitId::new(vec![i])).is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn candidates_are_chunked_by_batch_size() {
        let partition = seeded((1..=25).map(|i| unit(i, 0xa, 1)).collect());
        let config = WalletConfig {
            max_burn_batch_size: 10,
            ..WalletConfig::default()
        };

        let results = collect(&partition, &config, &[]).await.unwrap();

        // 24 candidates in chunks of 10 -> 3 chunks.
        let r = &results[0].results[0];
        assert_eq!(r.chunks, 3);
        assert_eq!(r.burned_units, 24);
        assert_eq!(r.target_amount, 25);
        assert_eq!(r.join_proofs.len(), 3);
        assert_eq!(partition.sent_count(TxType::Lock), 3);
        assert_eq!(partition.sent_count(TxType::Join), 3);
        assert_eq!(partition.sent_count(TxType::Burn), 24);

        // The counter advanced by two per chunk.
        assert_eq!(partition.unit(&UnitId::new(vec![1])).unwrap().counter, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn join_proofs_are_sorted_by_unit_id() {
        let partition = seeded(vec![unit(1, 0xa, 1), unit(9, 0xa, 1), unit(4, 0xa, 1)]);
        let config = WalletConfig::default();

        collect(&partition, &config, &[]).await.unwrap();

        let join = partition
            .sent_transactions()
            .into_iter()
            .find(|tx| tx.tx_type() == TxType::Join)
            .unwrap();
        let TxAttributes::Join(attrs) = join.payload.attributes else {
            panic!("not a join");
        };
        let ids: Vec<_> = attrs.burn_proofs.iter().map(|p| p.unit_id().clone()).collect();
        assert_eq!(ids, vec![UnitId::new(vec![4]), UnitId::new(vec![9])]);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_stops_group_but_keeps_completed_chunks() {
        let partition = seeded(vec![
            unit(1, 0xa, u64::MAX - 5),
            unit(2, 0xa, 3),
            unit(3, 0xa, 10),
        ]);
        let config = WalletConfig {
            max_burn_batch_size: 1,
            ..WalletConfig::default()
        };

        let results = collect(&partition, &config, &[]).await.unwrap();

        let r = &results[0].results[0];
        assert_eq!(r.chunks, 1);
        assert_eq!(r.fee_sum, 3);
        assert_eq!(r.target_amount, u64::MAX - 2);
        assert_eq!(
            partition.unit(&UnitId::new(vec![1])).unwrap().amount,
            u64::MAX - 2
        );
        // Unit 3 was never touched.
        assert_eq!(partition.unit(&UnitId::new(vec![3])).unwrap().counter, 0);
        assert_eq!(partition.sent_count(TxType::Burn), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_on_first_chunk_yields_no_result() {
        let partition = seeded(vec![unit(1, 0xa, u64::MAX), unit(2, 0xa, 1)]);
        let config = WalletConfig::default();

        let results = collect(&partition, &config, &[]).await.unwrap();

        assert!(results.is_empty());
        assert!(partition.sent_transactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn locked_units_are_never_touched() {
        let mut locked = unit(1, 0xa, 100);
        locked.lock_status = 1;
        let partition = seeded(vec![locked, unit(2, 0xa, 1), unit(3, 0xa, 2)]);
        let config = WalletConfig::default();

        let results = collect(&partition, &config, &[]).await.unwrap();

        assert_eq!(results[0].results[0].target_unit_id, UnitId::new(vec![2]));
        assert!(partition
            .sent_transactions()
            .iter()
            .all(|tx| tx.unit_id() != &UnitId::new(vec![1])));
        assert_eq!(partition.unit(&UnitId::new(vec![1])).unwrap().amount, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn single_unit_types_produce_nothing() {
        let partition = seeded(vec![unit(1, 0xa, 1), unit(2, 0xb, 1)]);
        let config = WalletConfig::default();

        let results = collect(&partition, &config, &[]).await.unwrap();

        assert!(results.is_empty());
        assert!(partition.sent_transactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn allow_list_limits_types() {
        let partition = seeded(vec![
            unit(1, 0xa, 1),
            unit(2, 0xa, 1),
            unit(3, 0xb, 1),
            unit(4, 0xb, 1),
        ]);
        let config = WalletConfig::default();

        let results = collect(&partition, &config, &[UnitId::new(vec![0xb])])
            .await
            .unwrap();

        assert_eq!(results[0].results.len(), 1);
        assert_eq!(results[0].results[0].type_id, UnitId::new(vec![0xb]));
        assert_eq!(partition.unit(&UnitId::new(vec![2])).unwrap().amount, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_fee_credit_fails_before_sending() {
        let partition = InMemoryPartition::new();
        partition.add_unit(unit(1, 0xa, 1), Predicate::pay_to(&account()));
        partition.add_unit(unit(2, 0xa, 1), Predicate::pay_to(&account()));
        let config = WalletConfig::default();

        let err = collect(&partition, &config, &[]).await.unwrap_err();

        assert!(matches!(
            err.source,
            DustError::FeeCredit(FeeCreditError::NoFeeCredit { .. })
        ));
        assert!(err.results.is_empty());
        assert!(partition.sent_transactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_mid_group_returns_completed_chunks() {
        let partition = seeded(vec![unit(1, 0xa, 1), unit(2, 0xa, 1), unit(3, 0xa, 1)]);
        partition.withhold_proofs_for(&UnitId::new(vec![3]));
        let config = WalletConfig {
            max_burn_batch_size: 1,
            ..WalletConfig::default()
        };

        let err = collect(&partition, &config, &[]).await.unwrap_err();

        assert!(matches!(
            err.source,
            DustError::Stage {
                stage: DustStage::Burn,
                source: SubmitError::ConfirmationTimeout { .. },
                ..
            }
        ));
        assert_eq!(err.results.len(), 1);
        let r = &err.results[0].results[0];
        assert_eq!(r.chunks, 1);
        assert_eq!(r.target_amount, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_call_leaves_target_unlocked() {
        let partition = seeded((1..=6).map(|i| unit(i, 0xa, 1)).collect());
        let config = WalletConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = DustCollector::new(&partition, &config)
            .collect_dust(&cancel, &[(0, account())], &[], &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err.source,
            DustError::Stage {
                stage: DustStage::Lock,
                source: SubmitError::Cancelled,
                ..
            }
        ));
        assert!(err.results.is_empty());
        assert!(partition.sent_transactions().is_empty());
        assert!(!partition.unit(&UnitId::new(vec![1])).unwrap().is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_batch_size_is_rejected_before_any_call() {
        let partition = seeded(vec![unit(1, 0xa, 1), unit(2, 0xa, 1)]);
        let config = WalletConfig {
            max_burn_batch_size: 0,
            ..WalletConfig::default()
        };

        let err = collect(&partition, &config, &[]).await.unwrap_err();

        assert!(matches!(err.source, DustError::Config(ConfigError::Invalid(_))));
        assert!(partition.sent_transactions().is_empty());
        assert_eq!(partition.round(), 1);
    }
}
