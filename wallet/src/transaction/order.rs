//! Transaction orders and their construction.
//!
//! A [`TransactionOrder`] is the signed, immutable thing sent to a
//! partition. Its [`Payload`] is what gets signed; the proofs are attached
//! afterwards by [`super::signing`]. The builder never signs, which keeps
//! construction testable without key material.

use serde::{Deserialize, Serialize};

use super::types::{ClientMetadata, TxAttributes, TxType};
use super::TransactionError;
use crate::types::{TxHash, UnitId};

/// Domain tag prepended to signable bytes.
const SIGNING_DOMAIN: &[u8] = b"shardwallet/tx/v1";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The signed portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub partition_id: u32,
    pub unit_id: UnitId,
    pub attributes: TxAttributes,
    pub client_metadata: ClientMetadata,
}

impl Payload {
    /// Canonical bytes covered by the owner, fee and invariant proofs.
    ///
    /// `SIGNING_DOMAIN || bincode(payload)`. Bincode's encoding is
    /// deterministic for a given value, unlike JSON field ordering.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        let body = bincode::serialize(self)?;
        let mut buf = Vec::with_capacity(SIGNING_DOMAIN.len() + body.len());
        buf.extend_from_slice(SIGNING_DOMAIN);
        buf.extend_from_slice(&body);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// TransactionOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOrder {
    pub payload: Payload,
    /// Satisfies the unit's owner predicate (or the type's minting predicate
    /// for mints).
    pub auth_proof: Vec<u8>,
    /// Satisfies the fee-credit record's owner predicate. When absent the
    /// partition evaluates `auth_proof` against it instead.
    pub fee_proof: Option<Vec<u8>>,
    /// One proof per invariant predicate of the unit's type hierarchy.
    pub invariant_proofs: Vec<Vec<u8>>,
}

impl TransactionOrder {
    pub fn unit_id(&self) -> &UnitId {
        &self.payload.unit_id
    }

    pub fn tx_type(&self) -> TxType {
        self.payload.attributes.tx_type()
    }

    /// Round after which the partition will no longer execute this order.
    pub fn timeout(&self) -> u64 {
        self.payload.client_metadata.timeout
    }

    /// Content hash over the full signed order, proofs included.
    pub fn hash(&self) -> Result<TxHash, TransactionError> {
        Ok(TxHash::of(&self.to_bytes()?))
    }

    /// Wire encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Bytes the fee proof signs: the signable payload followed by the owner
    /// proof.
    pub fn fee_proof_signable_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        let mut buf = self.payload.signable_bytes()?;
        buf.extend_from_slice(&self.auth_proof);
        Ok(buf)
    }

    pub fn is_signed(&self) -> bool {
        !self.auth_proof.is_empty() || self.fee_proof.is_some()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`TransactionOrder`]s.
///
/// ```
/// use shardwallet::transaction::{TransactionBuilder, TxAttributes, UnlockAttributes};
/// use shardwallet::types::UnitId;
///
/// let order = TransactionBuilder::new(1, UnitId::new(vec![7]), TxAttributes::Unlock(UnlockAttributes { counter: 3 }))
///     .timeout(120)
///     .max_fee(10)
///     .build();
/// assert_eq!(order.timeout(), 120);
/// assert!(!order.is_signed());
/// ```
pub struct TransactionBuilder {
    partition_id: u32,
    unit_id: UnitId,
    attributes: TxAttributes,
    timeout: u64,
    max_fee: u64,
    fee_credit_record_id: Option<UnitId>,
}

impl TransactionBuilder {
    pub fn new(partition_id: u32, unit_id: UnitId, attributes: TxAttributes) -> Self {
        Self {
            partition_id,
            unit_id,
            attributes,
            timeout: 0,
            max_fee: 0,
            fee_credit_record_id: None,
        }
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_fee(mut self, max_fee: u64) -> Self {
        self.max_fee = max_fee;
        self
    }

    pub fn fee_credit_record(mut self, id: UnitId) -> Self {
        self.fee_credit_record_id = Some(id);
        self
    }

    pub fn build(self) -> TransactionOrder {
        TransactionOrder {
            payload: Payload {
                partition_id: self.partition_id,
                unit_id: self.unit_id,
                attributes: self.attributes,
                client_metadata: ClientMetadata {
                    timeout: self.timeout,
                    max_fee: self.max_fee,
                    fee_credit_record_id: self.fee_credit_record_id,
                },
            },
            auth_proof: Vec::new(),
            fee_proof: None,
            invariant_proofs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::{LockAttributes, UnlockAttributes};

    fn sample() -> TransactionOrder {
        TransactionBuilder::new(
            1,
            UnitId::new(vec![0xaa]),
            TxAttributes::Lock(LockAttributes {
                lock_status: 3,
                counter: 2,
            }),
        )
        .timeout(50)
        .max_fee(10)
        .fee_credit_record(UnitId::new(vec![0xfc]))
        .build()
    }

    #[test]
    fn builder_sets_metadata() {
        let tx = sample();
        assert_eq!(tx.timeout(), 50);
        assert_eq!(tx.payload.client_metadata.max_fee, 10);
        assert_eq!(
            tx.payload.client_metadata.fee_credit_record_id,
            Some(UnitId::new(vec![0xfc]))
        );
        assert_eq!(tx.tx_type(), TxType::Lock);
        assert!(!tx.is_signed());
    }

    #[test]
    fn signable_bytes_are_deterministic_and_domain_tagged() {
        let a = sample().payload.signable_bytes().unwrap();
        let b = sample().payload.signable_bytes().unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(SIGNING_DOMAIN));
    }

    #[test]
    fn hash_covers_proofs() {
        let unsigned = sample();
        let mut signed = sample();
        signed.auth_proof = vec![1, 2, 3];
        assert_ne!(unsigned.hash().unwrap(), signed.hash().unwrap());
    }

    #[test]
    fn hash_changes_with_counter() {
        let a = sample();
        let mut b = sample();
        b.payload.attributes = TxAttributes::Unlock(UnlockAttributes { counter: 3 });
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn wire_roundtrip_preserves_hash() {
        let tx = sample();
        let decoded = TransactionOrder::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash().unwrap(), tx.hash().unwrap());
    }
}
