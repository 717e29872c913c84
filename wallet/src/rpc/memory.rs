//! # In-Memory Partition
//!
//! A [`PartitionClient`] that keeps a small ledger in process and executes
//! every transaction it receives. It enforces the rules a real partition
//! enforces on wallet-built transactions:
//!
//! - timeouts, partition id and fee-credit coverage are checked at submission;
//! - owner, minting, invariant and fee predicates are evaluated at submission
//!   and a bad proof is rejected outright (invariant predicates of a token
//!   type guard value movements only, not lock or unlock);
//! - unit counters, lock status and value conservation are checked at
//!   execution, and a violation yields a proof with [`TxStatus::Failed`]
//!   (the fee is still charged).
//!
//! Knobs for tests: scripted or auto-advancing rounds, an indexing delay,
//! units whose transactions are never indexed, and injected send failures.
//! Every submitted order is recorded for later inspection.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PartitionClient, RpcClientError};
use crate::config::{DEFAULT_PARTITION_ID, LOCK_STATUS_DUST_COLLECTING, LOCK_STATUS_UNLOCKED};
use crate::crypto::keys::AccountKey;
use crate::predicate::Predicate;
use crate::transaction::{
    BurnAttributes, JoinAttributes, TransactionOrder, TxAttributes, TxProof, TxRecord, TxStatus,
    TxType,
};
use crate::types::{FeeCreditRecord, TxHash, TypeId, UnitId, ValueUnit};

/// Error code used when a submission is rejected before execution.
const REJECTED_CODE: i32 = -32000;

struct StoredUnit {
    unit: ValueUnit,
    owner: Predicate,
}

struct TokenType {
    mint_predicate: Predicate,
    invariants: Vec<Predicate>,
}

struct FeeAccount {
    record: FeeCreditRecord,
    owner: Predicate,
}

struct IndexedProof {
    proof: TxProof,
    visible_from: u64,
}

struct State {
    partition_id: u32,
    round: u64,
    auto_advance: bool,
    index_delay: u64,
    fee_per_tx: u64,
    units: BTreeMap<UnitId, StoredUnit>,
    token_types: HashMap<TypeId, TokenType>,
    fee_accounts: HashMap<Vec<u8>, FeeAccount>,
    proofs: HashMap<TxHash, IndexedProof>,
    withheld: HashSet<UnitId>,
    send_failure: Option<String>,
    sent: Vec<TransactionOrder>,
}

/// In-process partition ledger.
pub struct InMemoryPartition {
    state: Mutex<State>,
}

impl Default for InMemoryPartition {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPartition {
    /// Round 1, auto-advancing by one round per `get_round_number` call,
    /// proofs visible immediately, fee of 1 per transaction.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                partition_id: DEFAULT_PARTITION_ID,
                round: 1,
                auto_advance: true,
                index_delay: 0,
                fee_per_tx: 1,
                units: BTreeMap::new(),
                token_types: HashMap::new(),
                fee_accounts: HashMap::new(),
                proofs: HashMap::new(),
                withheld: HashSet::new(),
                send_failure: None,
                sent: Vec::new(),
            }),
        }
    }

    // -- configuration ------------------------------------------------------

    pub fn set_round(&self, round: u64) {
        self.state.lock().round = round;
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        self.state.lock().auto_advance = enabled;
    }

    /// Proofs become visible `rounds` rounds after the round of submission.
    pub fn set_index_delay(&self, rounds: u64) {
        self.state.lock().index_delay = rounds;
    }

    pub fn set_fee_per_tx(&self, fee: u64) {
        self.state.lock().fee_per_tx = fee;
    }

    /// Transactions on this unit are accepted but never included.
    pub fn withhold_proofs_for(&self, unit_id: &UnitId) {
        self.state.lock().withheld.insert(unit_id.clone());
    }

    /// Every subsequent send fails with a transport error.
    pub fn fail_sends_with(&self, message: &str) {
        self.state.lock().send_failure = Some(message.to_string());
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_unit(&self, unit: ValueUnit, owner: Predicate) {
        self.state
            .lock()
            .units
            .insert(unit.id.clone(), StoredUnit { unit, owner });
    }

    pub fn register_token_type(
        &self,
        type_id: TypeId,
        mint_predicate: Predicate,
        invariants: Vec<Predicate>,
    ) {
        self.state.lock().token_types.insert(
            type_id,
            TokenType {
                mint_predicate,
                invariants,
            },
        );
    }

    /// Create (or overwrite) the fee-credit record owned by `owner`.
    pub fn set_fee_credit(&self, owner: &AccountKey, balance: u64) {
        let owner_id = owner.pub_key_hash().to_vec();
        let record = FeeCreditRecord {
            id: UnitId::fee_credit_record(&owner_id),
            balance,
            counter: Some(0),
        };
        self.state.lock().fee_accounts.insert(
            owner_id,
            FeeAccount {
                record,
                owner: Predicate::pay_to(owner),
            },
        );
    }

    // -- inspection ---------------------------------------------------------

    pub fn round(&self) -> u64 {
        self.state.lock().round
    }

    pub fn unit(&self, unit_id: &UnitId) -> Option<ValueUnit> {
        self.state.lock().units.get(unit_id).map(|s| s.unit.clone())
    }

    pub fn unit_owner(&self, unit_id: &UnitId) -> Option<Predicate> {
        self.state.lock().units.get(unit_id).map(|s| s.owner.clone())
    }

    pub fn fee_credit_balance(&self, owner: &AccountKey) -> Option<u64> {
        self.state
            .lock()
            .fee_accounts
            .get(owner.pub_key_hash().as_slice())
            .map(|a| a.record.balance)
    }

    /// Every order accepted by `send_transaction`, in submission order.
    pub fn sent_transactions(&self) -> Vec<TransactionOrder> {
        self.state.lock().sent.clone()
    }

    pub fn sent_count(&self, tx_type: TxType) -> usize {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|tx| tx.tx_type() == tx_type)
            .count()
    }
}

fn rejected(message: impl Into<String>) -> RpcClientError {
    RpcClientError::Rpc {
        code: REJECTED_CODE,
        message: message.into(),
    }
}

impl State {
    /// Submission-time checks. Anything failing here never reaches the ledger.
    fn validate(&self, tx: &TransactionOrder) -> Result<(), RpcClientError> {
        if tx.payload.partition_id != self.partition_id {
            return Err(rejected(format!(
                "wrong partition {}",
                tx.payload.partition_id
            )));
        }
        if tx.timeout() < self.round {
            return Err(rejected(format!(
                "transaction expired: timeout {} < round {}",
                tx.timeout(),
                self.round
            )));
        }

        let signable = tx.payload.signable_bytes()?;

        let fee_account = tx
            .payload
            .client_metadata
            .fee_credit_record_id
            .as_ref()
            .and_then(|id| self.fee_accounts.values().find(|a| &a.record.id == id))
            .ok_or_else(|| rejected("fee credit record not found"))?;
        let fee_authorised = match &tx.fee_proof {
            Some(proof) => fee_account
                .owner
                .evaluate(proof, &tx.fee_proof_signable_bytes()?),
            None => fee_account.owner.evaluate(&tx.auth_proof, &signable),
        };
        if !fee_authorised {
            return Err(rejected("invalid fee proof"));
        }
        if fee_account.record.balance < self.fee_per_tx {
            return Err(rejected("insufficient fee credit"));
        }

        match &tx.payload.attributes {
            TxAttributes::Mint(attrs) => {
                let token_type = self
                    .token_types
                    .get(&attrs.type_id)
                    .ok_or_else(|| rejected(format!("unknown token type {}", attrs.type_id)))?;
                if !token_type.mint_predicate.evaluate(&tx.auth_proof, &signable) {
                    return Err(rejected("invalid mint proof"));
                }
            }
            _ => {
                if let Some(stored) = self.units.get(tx.unit_id()) {
                    if !stored.owner.evaluate(&tx.auth_proof, &signable) {
                        return Err(rejected(format!("invalid owner proof for {}", tx.unit_id())));
                    }
                    let moves_value = !matches!(tx.tx_type(), TxType::Lock | TxType::Unlock);
                    if let Some(token_type) = self.token_types.get(&stored.unit.type_id) {
                        let ok = token_type.invariants.len() == tx.invariant_proofs.len()
                            && token_type
                                .invariants
                                .iter()
                                .zip(&tx.invariant_proofs)
                                .all(|(p, proof)| p.evaluate(proof, &signable));
                        if moves_value && !ok {
                            return Err(rejected("invalid invariant proofs"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply the state change. `false` means the transaction was included
    /// but failed.
    fn execute(&mut self, tx: &TransactionOrder) -> bool {
        let unit_id = tx.unit_id().clone();

        if let TxAttributes::Mint(attrs) = &tx.payload.attributes {
            let expected = UnitId::for_mint(&attrs.type_id, &attrs.owner_predicate, attrs.nonce);
            if expected != unit_id || self.units.contains_key(&unit_id) || attrs.value == 0 {
                return false;
            }
            let Ok(owner) = Predicate::from_bytes(&attrs.owner_predicate) else {
                return false;
            };
            self.units.insert(
                unit_id.clone(),
                StoredUnit {
                    unit: ValueUnit {
                        id: unit_id,
                        type_id: attrs.type_id.clone(),
                        amount: attrs.value,
                        counter: 0,
                        lock_status: LOCK_STATUS_UNLOCKED,
                    },
                    owner,
                },
            );
            return true;
        }

        let Some(stored) = self.units.get(&unit_id) else {
            return false;
        };
        if tx.payload.attributes.counter() != Some(stored.unit.counter) {
            return false;
        }
        let unit = stored.unit.clone();

        match &tx.payload.attributes {
            TxAttributes::Transfer(attrs) => {
                if unit.is_locked() || attrs.value != unit.amount || attrs.type_id != unit.type_id
                {
                    return false;
                }
                let Ok(owner) = Predicate::from_bytes(&attrs.new_owner_predicate) else {
                    return false;
                };
                if let Some(s) = self.units.get_mut(&unit_id) {
                    s.owner = owner;
                    s.unit.counter += 1;
                }
                true
            }
            TxAttributes::Split(attrs) => {
                if unit.is_locked() || attrs.type_id != unit.type_id || attrs.remaining_value == 0
                {
                    return false;
                }
                let total = attrs
                    .target_units
                    .iter()
                    .try_fold(attrs.remaining_value, |acc, t| {
                        if t.amount == 0 {
                            None
                        } else {
                            acc.checked_add(t.amount)
                        }
                    });
                if total != Some(unit.amount) {
                    return false;
                }
                let mut created = Vec::with_capacity(attrs.target_units.len());
                for (index, target) in attrs.target_units.iter().enumerate() {
                    let Ok(owner) = Predicate::from_bytes(&target.owner_predicate) else {
                        return false;
                    };
                    let id = UnitId::derive(&unit_id, unit.counter, index as u32);
                    created.push(StoredUnit {
                        unit: ValueUnit {
                            id,
                            type_id: unit.type_id.clone(),
                            amount: target.amount,
                            counter: 0,
                            lock_status: LOCK_STATUS_UNLOCKED,
                        },
                        owner,
                    });
                }
                for new_unit in created {
                    self.units.insert(new_unit.unit.id.clone(), new_unit);
                }
                if let Some(s) = self.units.get_mut(&unit_id) {
                    s.unit.amount = attrs.remaining_value;
                    s.unit.counter += 1;
                }
                true
            }
            TxAttributes::Lock(attrs) => {
                if unit.is_locked() || attrs.lock_status == LOCK_STATUS_UNLOCKED {
                    return false;
                }
                if let Some(s) = self.units.get_mut(&unit_id) {
                    s.unit.lock_status = attrs.lock_status;
                    s.unit.counter += 1;
                }
                true
            }
            TxAttributes::Unlock(_) => {
                if !unit.is_locked() {
                    return false;
                }
                if let Some(s) = self.units.get_mut(&unit_id) {
                    s.unit.lock_status = LOCK_STATUS_UNLOCKED;
                    s.unit.counter += 1;
                }
                true
            }
            TxAttributes::Burn(attrs) => {
                if unit.is_locked() || attrs.value != unit.amount || attrs.type_id != unit.type_id
                {
                    return false;
                }
                self.units.remove(&unit_id);
                true
            }
            TxAttributes::Join(attrs) => {
                if unit.lock_status != LOCK_STATUS_UNLOCKED
                    && unit.lock_status != LOCK_STATUS_DUST_COLLECTING
                {
                    return false;
                }
                let Some(joined) = self.joined_value(&unit, attrs) else {
                    return false;
                };
                let Some(new_amount) = unit.amount.checked_add(joined) else {
                    return false;
                };
                if let Some(s) = self.units.get_mut(&unit_id) {
                    s.unit.amount = new_amount;
                    s.unit.lock_status = LOCK_STATUS_UNLOCKED;
                    s.unit.counter += 1;
                }
                true
            }
            TxAttributes::Mint(_) => false,
        }
    }

    /// Total burned value if every burn proof is valid for `target`.
    fn joined_value(&self, target: &ValueUnit, attrs: &JoinAttributes) -> Option<u64> {
        if attrs.burn_proofs.is_empty() {
            return None;
        }
        let mut previous: Option<&UnitId> = None;
        let mut total: u64 = 0;
        for proof in &attrs.burn_proofs {
            if previous.is_some_and(|p| p >= proof.unit_id()) {
                return None;
            }
            previous = Some(proof.unit_id());

            let hash = proof.tx_hash().ok()?;
            let indexed = self.proofs.get(&hash)?;
            if !indexed.proof.is_successful() {
                return None;
            }
            let TxAttributes::Burn(BurnAttributes {
                type_id,
                value,
                target_unit_id,
                target_unit_counter,
                ..
            }) = &indexed.proof.record.order.payload.attributes
            else {
                return None;
            };
            if target_unit_id != &target.id
                || *target_unit_counter != target.counter
                || type_id != &target.type_id
            {
                return None;
            }
            total = total.checked_add(*value)?;
        }
        Some(total)
    }

    fn charge_fee(&mut self, tx: &TransactionOrder) -> u64 {
        let fee = self.fee_per_tx.min(tx.payload.client_metadata.max_fee);
        let fcr_id = tx.payload.client_metadata.fee_credit_record_id.as_ref();
        if let Some(account) = self
            .fee_accounts
            .values_mut()
            .find(|a| Some(&a.record.id) == fcr_id)
        {
            account.record.balance = account.record.balance.saturating_sub(fee);
            account.record.counter = account.record.counter.map(|c| c + 1);
        }
        fee
    }
}

#[async_trait]
impl PartitionClient for InMemoryPartition {
    async fn send_transaction(&self, tx: &TransactionOrder) -> Result<Vec<u8>, RpcClientError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.send_failure {
            return Err(RpcClientError::Transport(message.clone()));
        }
        state.validate(tx)?;

        let hash = tx.hash()?;
        state.sent.push(tx.clone());
        if state.withheld.contains(tx.unit_id()) {
            return Ok(hash.0.to_vec());
        }

        let success = state.execute(tx);
        let actual_fee = state.charge_fee(tx);
        let round = state.round;
        let visible_from = round + state.index_delay;
        state.proofs.insert(
            hash,
            IndexedProof {
                proof: TxProof {
                    record: TxRecord {
                        order: tx.clone(),
                        actual_fee,
                        status: if success {
                            TxStatus::Successful
                        } else {
                            TxStatus::Failed
                        },
                    },
                    round,
                },
                visible_from,
            },
        );
        Ok(hash.0.to_vec())
    }

    async fn get_round_number(&self) -> Result<u64, RpcClientError> {
        let mut state = self.state.lock();
        let round = state.round;
        if state.auto_advance {
            state.round += 1;
        }
        Ok(round)
    }

    async fn get_transaction_proof(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<TxProof>, RpcClientError> {
        let state = self.state.lock();
        Ok(state
            .proofs
            .get(tx_hash)
            .filter(|p| state.round >= p.visible_from)
            .map(|p| p.proof.clone()))
    }

    async fn get_fee_credit_record_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Option<FeeCreditRecord>, RpcClientError> {
        Ok(self
            .state
            .lock()
            .fee_accounts
            .get(owner_id)
            .map(|a| a.record.clone()))
    }

    async fn get_units_by_owner_id(
        &self,
        owner_id: &[u8],
    ) -> Result<Vec<ValueUnit>, RpcClientError> {
        let state = self.state.lock();
        Ok(state
            .units
            .values()
            .filter(|s| matches!(&s.owner, Predicate::PayToPublicKeyHash(h) if h.as_slice() == owner_id))
            .map(|s| s.unit.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateInput;
    use crate::transaction::{
        sign_transaction, LockAttributes, TransactionBuilder, TransferAttributes,
    };

    fn setup() -> (InMemoryPartition, AccountKey, ValueUnit) {
        let partition = InMemoryPartition::new();
        let key = AccountKey::from_seed(&[1u8; 32]);
        partition.set_fee_credit(&key, 100);
        let unit = ValueUnit {
            id: UnitId::new(vec![0x10]),
            type_id: UnitId::new(vec![0xaa]),
            amount: 50,
            counter: 0,
            lock_status: 0,
        };
        partition.add_unit(unit.clone(), Predicate::pay_to(&key));
        (partition, key, unit)
    }

    fn signed(key: &AccountKey, unit_id: &UnitId, attrs: TxAttributes) -> TransactionOrder {
        let mut tx = TransactionBuilder::new(DEFAULT_PARTITION_ID, unit_id.clone(), attrs)
            .timeout(100)
            .max_fee(10)
            .fee_credit_record(UnitId::fee_credit_record(key.pub_key_hash()))
            .build();
        let input = PredicateInput::AccountKey(key.clone());
        sign_transaction(&mut tx, Some(&input), Some(&input), &[]).unwrap();
        tx
    }

    #[tokio::test]
    async fn lock_executes_and_charges_fee() {
        let (partition, key, unit) = setup();
        let tx = signed(
            &key,
            &unit.id,
            TxAttributes::Lock(LockAttributes {
                lock_status: 1,
                counter: 0,
            }),
        );
        partition.send_transaction(&tx).await.unwrap();

        let proof = partition
            .get_transaction_proof(&tx.hash().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(proof.is_successful());
        let after = partition.unit(&unit.id).unwrap();
        assert_eq!(after.lock_status, 1);
        assert_eq!(after.counter, 1);
        assert_eq!(partition.fee_credit_balance(&key), Some(99));
    }

    #[tokio::test]
    async fn stale_counter_fails_execution() {
        let (partition, key, unit) = setup();
        let tx = signed(
            &key,
            &unit.id,
            TxAttributes::Lock(LockAttributes {
                lock_status: 1,
                counter: 5,
            }),
        );
        partition.send_transaction(&tx).await.unwrap();
        let proof = partition
            .get_transaction_proof(&tx.hash().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(!proof.is_successful());
        assert_eq!(partition.unit(&unit.id).unwrap().counter, 0);
    }

    #[tokio::test]
    async fn foreign_owner_proof_is_rejected() {
        let (partition, key, unit) = setup();
        let thief = AccountKey::from_seed(&[2u8; 32]);
        partition.set_fee_credit(&thief, 100);
        let tx = signed(
            &thief,
            &unit.id,
            TxAttributes::Transfer(TransferAttributes {
                type_id: unit.type_id.clone(),
                new_owner_predicate: Predicate::pay_to(&thief).to_bytes(),
                value: 50,
                counter: 0,
            }),
        );
        let err = partition.send_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, RpcClientError::Rpc { code: REJECTED_CODE, .. }));
        assert_eq!(partition.unit_owner(&unit.id), Some(Predicate::pay_to(&key)));
    }

    #[tokio::test]
    async fn expired_transaction_is_rejected() {
        let (partition, key, unit) = setup();
        partition.set_round(500);
        let tx = signed(
            &key,
            &unit.id,
            TxAttributes::Lock(LockAttributes {
                lock_status: 1,
                counter: 0,
            }),
        );
        assert!(partition.send_transaction(&tx).await.is_err());
        assert!(partition.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn round_auto_advances_and_delay_hides_proofs() {
        let (partition, key, unit) = setup();
        partition.set_index_delay(2);
        let tx = signed(
            &key,
            &unit.id,
            TxAttributes::Lock(LockAttributes {
                lock_status: 1,
                counter: 0,
            }),
        );
        partition.send_transaction(&tx).await.unwrap();
        let hash = tx.hash().unwrap();

        assert_eq!(partition.get_round_number().await.unwrap(), 1);
        assert!(partition.get_transaction_proof(&hash).await.unwrap().is_none());
        assert_eq!(partition.get_round_number().await.unwrap(), 2);
        assert!(partition.get_transaction_proof(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn units_are_listed_by_owner() {
        let (partition, key, unit) = setup();
        let other = AccountKey::from_seed(&[3u8; 32]);
        let units = partition
            .get_units_by_owner_id(key.pub_key_hash())
            .await
            .unwrap();
        assert_eq!(units, vec![unit]);
        assert!(partition
            .get_units_by_owner_id(other.pub_key_hash())
            .await
            .unwrap()
            .is_empty());
    }
}
