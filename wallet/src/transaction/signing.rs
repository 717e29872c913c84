//! Attaching predicate proofs to a built transaction.
//!
//! Signing is a separate step from building because the proofs may come
//! from different places: the owner proof from an account key, the fee proof
//! from the account paying for fee credit, and invariant proofs from whoever
//! controls the token type hierarchy.

use super::order::{TransactionBuilder, TransactionOrder};
use super::types::TxAttributes;
use super::TransactionError;
use crate::crypto::keys::AccountKey;
use crate::predicate::{build_proof, build_proofs, PredicateInput};
use crate::types::UnitId;

/// Attach owner, fee and invariant proofs in the order the partition checks
/// them. The fee proof covers the owner proof, so it is produced last.
///
/// Re-signing overwrites every previous proof.
pub fn sign_transaction(
    tx: &mut TransactionOrder,
    owner: Option<&PredicateInput>,
    fee_payer: Option<&PredicateInput>,
    invariants: &[PredicateInput],
) -> Result<(), TransactionError> {
    let signable = tx.payload.signable_bytes()?;
    tx.auth_proof = build_proof(owner, &signable, "owner proof")?;
    tx.invariant_proofs = build_proofs(invariants, &signable);
    tx.fee_proof = match fee_payer {
        Some(payer) => Some(payer.proof(&tx.fee_proof_signable_bytes()?)),
        None => None,
    };
    Ok(())
}

/// Common case: the account owns the unit and pays the fee.
pub fn sign_with_account(
    tx: &mut TransactionOrder,
    key: &AccountKey,
    invariants: &[PredicateInput],
) -> Result<(), TransactionError> {
    let input = PredicateInput::AccountKey(key.clone());
    sign_transaction(tx, Some(&input), Some(&input), invariants)
}

/// Builds and signs orders for one account against one fee-credit record.
pub struct AccountSigner<'a> {
    key: &'a AccountKey,
    partition_id: u32,
    max_fee: u64,
    fee_credit_record: UnitId,
}

impl<'a> AccountSigner<'a> {
    pub fn new(
        key: &'a AccountKey,
        partition_id: u32,
        max_fee: u64,
        fee_credit_record: UnitId,
    ) -> Self {
        Self {
            key,
            partition_id,
            max_fee,
            fee_credit_record,
        }
    }

    /// Unsigned order carrying this signer's partition, fee limit and
    /// fee-credit reference.
    pub fn build(
        &self,
        unit_id: UnitId,
        attributes: TxAttributes,
        timeout: u64,
    ) -> TransactionOrder {
        TransactionBuilder::new(self.partition_id, unit_id, attributes)
            .timeout(timeout)
            .max_fee(self.max_fee)
            .fee_credit_record(self.fee_credit_record.clone())
            .build()
    }

    pub fn sign(
        &self,
        unit_id: UnitId,
        attributes: TxAttributes,
        timeout: u64,
        invariants: &[PredicateInput],
    ) -> Result<TransactionOrder, TransactionError> {
        let mut tx = self.build(unit_id, attributes, timeout);
        sign_with_account(&mut tx, self.key, invariants)?;
        Ok(tx)
    }
}
