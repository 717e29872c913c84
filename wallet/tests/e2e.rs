//! End-to-end tests for the wallet against an in-process partition.
//!
//! Each test builds its own key ring and [`InMemoryPartition`], drives the
//! public [`Wallet`] API and then inspects the partition's ledger. Rounds
//! advance on every round-number query and tokio time is paused, so
//! confirmation loops run without real sleeps.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use shardwallet::accounts::{AccountManager, AccountSelector, KeyRing};
use shardwallet::config::WalletConfig;
use shardwallet::crypto::keys::AccountKey;
use shardwallet::dust::{DustError, DustStage};
use shardwallet::predicate::{Predicate, PredicateInput};
use shardwallet::rpc::{InMemoryPartition, RpcClientError};
use shardwallet::transaction::TxType;
use shardwallet::txsubmitter::SubmitError;
use shardwallet::types::{TypeId, UnitId, ValueUnit};
use shardwallet::{SendRequest, Wallet, WalletError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const TOKEN: u8 = 0xaa;

fn token() -> TypeId {
    UnitId::new(vec![TOKEN])
}

/// Two funded accounts sharing one partition.
fn setup() -> (Arc<InMemoryPartition>, Wallet, AccountKey, AccountKey) {
    let ring = KeyRing::from_seed([42u8; 32], 2);
    let first = ring.account_key(0).unwrap();
    let second = ring.account_key(1).unwrap();
    let partition = Arc::new(InMemoryPartition::new());
    partition.set_fee_credit(&first, 1_000);
    partition.set_fee_credit(&second, 1_000);
    let wallet = Wallet::new(partition.clone(), Arc::new(ring), WalletConfig::default());
    (partition, wallet, first, second)
}

fn seed_unit(partition: &InMemoryPartition, owner: &AccountKey, id: u8, amount: u64) {
    partition.add_unit(
        ValueUnit {
            id: UnitId::new(vec![id]),
            type_id: token(),
            amount,
            counter: 0,
            lock_status: 0,
        },
        Predicate::pay_to(owner),
    );
}

fn payment(to: &AccountKey, amount: u64, invariants: Vec<PredicateInput>) -> SendRequest {
    SendRequest {
        account_index: 0,
        receiver: *to.pub_key_hash(),
        amount,
        type_id: token(),
        invariants,
    }
}

// ---------------------------------------------------------------------------
// 1. Mint, pay, consolidate
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn mint_send_and_collect_dust() {
    let (partition, wallet, first, second) = setup();
    partition.register_token_type(token(), Predicate::pay_to(&first), Vec::new());
    let cancel = CancellationToken::new();
    let issuer = PredicateInput::AccountKey(first.clone());

    for amount in [10, 20, 30] {
        let sub = wallet
            .mint(&cancel, 0, &token(), amount, Some(&issuer))
            .await
            .unwrap();
        assert!(sub.succeeded());
    }
    assert_eq!(wallet.list_units(0).await.unwrap().len(), 3);

    // No unit is worth exactly 15, so the largest one is split.
    let subs = wallet
        .send(&cancel, &payment(&second, 15, Vec::new()))
        .await
        .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].transaction.tx_type(), TxType::Split);

    let received = wallet.list_units(1).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].amount, 15);

    let results = wallet
        .collect_dust(&cancel, AccountSelector::All, &[], &[])
        .await
        .unwrap();

    // The second account holds a single unit and has nothing to join.
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].account_index, 0);
    let result = &results[0].results[0];
    assert_eq!(result.target_amount, 45);
    assert_eq!(result.burned_units, 2);
    assert_eq!(result.chunks, 1);
    assert_eq!(result.fee_sum, 4);

    let remaining = wallet.list_units(0).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, result.target_unit_id);
    assert_eq!(remaining[0].amount, 45);
    assert!(!remaining[0].is_locked());

    // Three mints, one split, then lock + two burns + join.
    assert_eq!(partition.fee_credit_balance(&first), Some(1_000 - 8));
    assert_eq!(partition.fee_credit_balance(&second), Some(1_000));
}

// ---------------------------------------------------------------------------
// 2. Invariant predicates
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn token_invariants_must_be_proven_to_move_value() {
    let (partition, wallet, first, second) = setup();
    let issuer = AccountKey::from_seed(&[7u8; 32]);
    partition.register_token_type(
        token(),
        Predicate::AlwaysFalse,
        vec![Predicate::pay_to(&issuer)],
    );
    seed_unit(&partition, &first, 0x31, 50);
    let cancel = CancellationToken::new();

    let err = wallet
        .send(&cancel, &payment(&second, 50, Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Submit(SubmitError::Send {
            tx_type: TxType::Transfer,
            source: RpcClientError::Rpc { .. },
            ..
        })
    ));
    assert!(partition.sent_transactions().is_empty());

    let subs = wallet
        .send(
            &cancel,
            &payment(&second, 50, vec![PredicateInput::AccountKey(issuer)]),
        )
        .await
        .unwrap();
    assert!(subs[0].succeeded());
    assert_eq!(
        partition.unit_owner(&UnitId::new(vec![0x31])),
        Some(Predicate::pay_to(&second))
    );
}

// ---------------------------------------------------------------------------
// 3. Dust collection keeps completed work on failure
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_account_keeps_earlier_results() {
    let (partition, wallet, first, second) = setup();
    seed_unit(&partition, &first, 0x11, 1);
    seed_unit(&partition, &first, 0x12, 2);
    seed_unit(&partition, &second, 0x21, 5);
    seed_unit(&partition, &second, 0x22, 5);
    seed_unit(&partition, &second, 0x23, 5);
    partition.withhold_proofs_for(&UnitId::new(vec![0x23]));

    let err = wallet
        .collect_dust(&CancellationToken::new(), AccountSelector::All, &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        DustError::Stage {
            stage: DustStage::Burn,
            source: SubmitError::ConfirmationTimeout { unconfirmed: 1, total: 2, .. },
            ..
        }
    ));
    assert_eq!(err.results.len(), 1);
    assert_eq!(err.results[0].account_index, 0);
    assert_eq!(err.results[0].results[0].target_amount, 3);

    // The second account's target stays locked for dust collection.
    let target = partition.unit(&UnitId::new(vec![0x21])).unwrap();
    assert!(target.is_locked());
    assert_eq!(partition.sent_count(TxType::Join), 1);
}

// ---------------------------------------------------------------------------
// 4. Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancelled_dust_collection_locks_nothing() {
    let (partition, wallet, first, _) = setup();
    for id in 0x71..=0x76 {
        seed_unit(&partition, &first, id, 1);
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = wallet
        .collect_dust(&cancel, AccountSelector::All, &[], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        DustError::Stage {
            source: SubmitError::Cancelled,
            ..
        }
    ));
    assert!(partition.sent_transactions().is_empty());
    assert!(wallet.list_units(0).await.unwrap().iter().all(|u| !u.is_locked()));
}

#[tokio::test(start_paused = true)]
async fn cancelled_payment_sends_nothing() {
    let (partition, wallet, first, second) = setup();
    seed_unit(&partition, &first, 0x41, 25);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = wallet
        .send(&cancel, &payment(&second, 25, Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::Submit(SubmitError::Cancelled)));
    assert!(partition.sent_transactions().is_empty());
    assert_eq!(
        partition.unit_owner(&UnitId::new(vec![0x41])),
        Some(Predicate::pay_to(&first))
    );
}

#[tokio::test(start_paused = true)]
async fn single_account_selector_touches_only_that_account() {
    let (partition, wallet, first, second) = setup();
    seed_unit(&partition, &first, 0x51, 4);
    seed_unit(&partition, &first, 0x52, 6);
    seed_unit(&partition, &second, 0x61, 1);
    seed_unit(&partition, &second, 0x62, 1);

    let results = wallet
        .collect_dust(&CancellationToken::new(), AccountSelector::Index(1), &[], &[])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].account_index, 1);
    assert_eq!(results[0].results[0].target_amount, 2);
    assert_eq!(wallet.list_units(0).await.unwrap().len(), 2);
    assert_eq!(partition.fee_credit_balance(&first), Some(1_000));
}
