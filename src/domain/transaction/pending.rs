//! The in-transit purchase transaction and the freshness anchor that bounds its lifetime.

use crate::error::{CheckoutError, CheckoutResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use solana_sdk::{
    hash::Hash,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::collections::BTreeSet;

/// A recent blockhash plus the last block height at which it is still accepted.
///
/// The height is only known to whoever fetched the blockhash; a transaction decoded from
/// the wire carries the hash alone, so its height is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: Option<u64>,
}

impl FreshnessAnchor {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height: Some(last_valid_block_height),
        }
    }

    pub fn from_blockhash(blockhash: Hash) -> Self {
        Self {
            blockhash,
            last_valid_block_height: None,
        }
    }

    /// True once `block_height` has passed the anchor's expiry height.
    /// Unknown expiry never reports expired; callers ask the ledger instead.
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        matches!(self.last_valid_block_height, Some(h) if block_height > h)
    }
}

/// The three parties whose signatures a pass purchase needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub buyer: Pubkey,
    pub authority: Pubkey,
    pub mint: Pubkey,
}

impl Parties {
    pub fn as_set(&self) -> BTreeSet<Pubkey> {
        [self.buyer, self.authority, self.mint].into_iter().collect()
    }
}

/// Where a transaction is in its signing lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    PartiallySigned(BTreeSet<Pubkey>),
    FullySigned,
}

/// An assembled purchase transaction travelling between parties.
///
/// Signatures are only ever added, and the message (including its blockhash) is never
/// rewritten once assembled.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    transaction: Transaction,
    anchor: FreshnessAnchor,
}

impl PendingTransaction {
    pub(crate) fn new(transaction: Transaction, anchor: FreshnessAnchor) -> Self {
        Self {
            transaction,
            anchor,
        }
    }

    /// Decodes a wire transaction (legacy format, signatures optional).
    pub fn decode(bytes: &[u8]) -> CheckoutResult<Self> {
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(CheckoutError::Validation(format!(
                "transaction is {} bytes, larger than the {} byte packet limit",
                bytes.len(),
                PACKET_DATA_SIZE
            )));
        }
        let transaction: Transaction = bincode::deserialize(bytes)
            .map_err(|e| CheckoutError::Validation(format!("malformed transaction: {}", e)))?;
        if transaction.signatures.len() != transaction.message.header.num_required_signatures as usize
        {
            return Err(CheckoutError::Validation(
                "signature count does not match the message header".to_string(),
            ));
        }
        let anchor = FreshnessAnchor::from_blockhash(transaction.message.recent_blockhash);
        Ok(Self {
            transaction,
            anchor,
        })
    }

    pub fn from_base64(encoded: &str) -> CheckoutResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CheckoutError::Validation(format!("transaction is not base64: {}", e)))?;
        Self::decode(&bytes)
    }

    pub fn encode(&self) -> CheckoutResult<Vec<u8>> {
        let bytes = bincode::serialize(&self.transaction).map_err(|e| {
            CheckoutError::Configuration(format!("failed to serialize transaction: {}", e))
        })?;
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(CheckoutError::Configuration(format!(
                "transaction is {} bytes, larger than the {} byte packet limit (shorten the metadata uri or name)",
                bytes.len(),
                PACKET_DATA_SIZE
            )));
        }
        Ok(bytes)
    }

    pub fn to_base64(&self) -> CheckoutResult<String> {
        Ok(BASE64.encode(self.encode()?))
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }

    pub fn anchor(&self) -> &FreshnessAnchor {
        &self.anchor
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.account_keys.first()
    }

    /// Accounts the message requires signatures from, in signature-slot order.
    pub fn required_signers(&self) -> &[Pubkey] {
        let n = self.transaction.message.header.num_required_signatures as usize;
        let keys = &self.transaction.message.account_keys;
        &keys[..n.min(keys.len())]
    }

    /// Signers whose slot holds a signature that verifies against the message.
    ///
    /// A non-empty slot that does not verify is an error, not an absent signature.
    pub fn signed_by(&self) -> CheckoutResult<BTreeSet<Pubkey>> {
        let message = self.transaction.message_data();
        let mut signed = BTreeSet::new();
        for (key, sig) in self
            .required_signers()
            .iter()
            .zip(self.transaction.signatures.iter())
        {
            if *sig == Signature::default() {
                continue;
            }
            if !sig.verify(key.as_ref(), &message) {
                return Err(CheckoutError::SignatureOrder(format!(
                    "signature for {} does not verify against this transaction",
                    key
                )));
            }
            signed.insert(*key);
        }
        Ok(signed)
    }

    pub fn state(&self) -> CheckoutResult<SigningState> {
        let signed = self.signed_by()?;
        if signed.is_empty() {
            Ok(SigningState::Unsigned)
        } else if self.required_signers().iter().all(|k| signed.contains(k)) {
            Ok(SigningState::FullySigned)
        } else {
            Ok(SigningState::PartiallySigned(signed))
        }
    }

    /// Adds one signature over the existing message without touching its blockhash.
    pub(crate) fn sign_with(&mut self, keypair: &Keypair) -> CheckoutResult<()> {
        let blockhash = self.transaction.message.recent_blockhash;
        self.transaction
            .try_partial_sign(&[keypair], blockhash)
            .map_err(|e| CheckoutError::SignatureOrder(format!("signing failed: {}", e)))
    }
}
