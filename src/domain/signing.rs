//! Partial-signature choreography.
//!
//! A purchase needs three signatures (buyer, authority, pass mint) and there is no channel
//! on which all three parties meet, so the transaction travels and collects them in an
//! order fixed by the protocol that initiated it:
//!
//! | protocol         | order                          | who finishes            |
//! |------------------|--------------------------------|-------------------------|
//! | `Direct`         | buyer -> authority -> mint     | service, then broadcast |
//! | `PaymentRequest` | authority -> mint -> buyer     | buyer's wallet          |
//!
//! Every transition is checked against that table. Duplicates, out-of-order signatures,
//! signatures on a transaction with the wrong signer set or fee payer, and signatures after
//! the freshness anchor has expired are all rejected with `SignatureOrder`. Signatures are
//! never removed and the blockhash is never replaced.

use crate::domain::mint::{AssetMintIdentity, MintAddressDeriver};
use crate::domain::transaction::{Parties, PendingTransaction, SigningState};
use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    pubkey::Pubkey,
    signer::{keypair::Keypair, Signer},
};
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;

/// How a checkout was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// The web client: buyer signs first, the service completes.
    Direct,
    /// A wallet scanning a payment-request QR: the service presigns, the buyer signs last.
    PaymentRequest,
}

impl Protocol {
    pub fn signing_order(&self) -> [SignerRole; 3] {
        match self {
            Protocol::Direct => [SignerRole::Buyer, SignerRole::Authority, SignerRole::Mint],
            Protocol::PaymentRequest => {
                [SignerRole::Authority, SignerRole::Mint, SignerRole::Buyer]
            }
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Direct => write!(f, "direct"),
            Protocol::PaymentRequest => write!(f, "payment_request"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Buyer,
    Authority,
    Mint,
}

impl SignerRole {
    pub fn key(&self, parties: &Parties) -> Pubkey {
        match self {
            SignerRole::Buyer => parties.buyer,
            SignerRole::Authority => parties.authority,
            SignerRole::Mint => parties.mint,
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerRole::Buyer => write!(f, "buyer"),
            SignerRole::Authority => write!(f, "authority"),
            SignerRole::Mint => write!(f, "mint"),
        }
    }
}

/// Whether the transaction's anchor is still accepted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Valid,
    Expired,
}

/// Rejects transactions that are not a purchase for `parties`.
pub fn check_shape(pending: &PendingTransaction, parties: &Parties) -> CheckoutResult<()> {
    if pending.fee_payer() != Some(&parties.buyer) {
        return Err(CheckoutError::SignatureOrder(format!(
            "fee payer must be the buyer {}",
            parties.buyer
        )));
    }
    let required: std::collections::BTreeSet<Pubkey> =
        pending.required_signers().iter().copied().collect();
    if required != parties.as_set() || pending.required_signers().len() != 3 {
        return Err(CheckoutError::SignatureOrder(
            "transaction signer set is not {buyer, authority, pass mint}".to_string(),
        ));
    }
    Ok(())
}

/// Applies one signature, enforcing the protocol's transition table.
pub fn add_signature(
    pending: &mut PendingTransaction,
    parties: &Parties,
    protocol: Protocol,
    role: SignerRole,
    keypair: &Keypair,
    freshness: Freshness,
) -> CheckoutResult<SigningState> {
    if freshness == Freshness::Expired {
        return Err(CheckoutError::SignatureOrder(format!(
            "freshness anchor {} has expired; request a new transaction",
            pending.anchor().blockhash
        )));
    }
    check_shape(pending, parties)?;

    let key = role.key(parties);
    if keypair.pubkey() != key {
        return Err(CheckoutError::SignatureOrder(format!(
            "keypair {} cannot sign as {} ({})",
            keypair.pubkey(),
            role,
            key
        )));
    }

    let signed = pending.signed_by()?;
    if signed.contains(&key) {
        return Err(CheckoutError::SignatureOrder(format!(
            "duplicate {} signature",
            role
        )));
    }

    let order = protocol.signing_order();
    let done = signed.len();
    // Whatever is already signed must be exactly a prefix of the protocol order.
    if order[..done.min(order.len())]
        .iter()
        .any(|r| !signed.contains(&r.key(parties)))
    {
        return Err(CheckoutError::SignatureOrder(format!(
            "existing signatures do not follow the {} protocol order",
            protocol
        )));
    }
    match order.get(done) {
        Some(expected) if *expected == role => {}
        Some(expected) => {
            return Err(CheckoutError::SignatureOrder(format!(
                "{} signature required before {} under the {} protocol",
                expected, role, protocol
            )));
        }
        None => {
            return Err(CheckoutError::SignatureOrder(
                "transaction is already fully signed".to_string(),
            ));
        }
    }

    pending.sign_with(keypair)?;
    let state = pending.state()?;
    tracing::debug!(%protocol, %role, ?state, "signature added");
    Ok(state)
}

/// Recovers the parties of a purchase transaction from the buyer's side.
///
/// The mint is re-derived from the buyer; the authority is the remaining required signer.
pub fn parties_for_buyer(pending: &PendingTransaction, buyer: &Pubkey) -> CheckoutResult<Parties> {
    let mint = MintAddressDeriver::derive(buyer)?.pubkey();
    let authority = pending
        .required_signers()
        .iter()
        .copied()
        .find(|k| k != buyer && *k != mint)
        .ok_or_else(|| {
            CheckoutError::SignatureOrder("transaction has no authority signer".to_string())
        })?;
    Ok(Parties {
        buyer: *buyer,
        authority,
        mint,
    })
}

/// Adds the buyer's signature. Used by wallets and the `buy_pass` client.
pub fn sign_as_buyer(
    pending: &mut PendingTransaction,
    buyer: &Keypair,
    protocol: Protocol,
    freshness: Freshness,
) -> CheckoutResult<SigningState> {
    let parties = parties_for_buyer(pending, &buyer.pubkey())?;
    add_signature(pending, &parties, protocol, SignerRole::Buyer, buyer, freshness)
}

/// Holds the issuing authority and applies the service-side signatures.
pub struct SigningCoordinator {
    authority: Arc<Keypair>,
}

impl SigningCoordinator {
    pub fn new(authority: Arc<Keypair>) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> Pubkey {
        self.authority.pubkey()
    }

    /// Payment-request protocol: authority then mint sign before the buyer sees it.
    pub fn presign(
        &self,
        pending: &mut PendingTransaction,
        parties: &Parties,
        mint: &AssetMintIdentity,
        freshness: Freshness,
    ) -> CheckoutResult<SigningState> {
        let protocol = Protocol::PaymentRequest;
        add_signature(pending, parties, protocol, SignerRole::Authority, &self.authority, freshness)?;
        add_signature(pending, parties, protocol, SignerRole::Mint, mint.keypair(), freshness)
    }

    /// Direct protocol: the buyer's signature must already be present; authority then mint
    /// complete the set.
    pub fn countersign(
        &self,
        pending: &mut PendingTransaction,
        parties: &Parties,
        mint: &AssetMintIdentity,
        freshness: Freshness,
    ) -> CheckoutResult<SigningState> {
        if !pending.signed_by()?.contains(&parties.buyer) {
            return Err(CheckoutError::SignatureOrder(
                "buyer signature missing; sign the transaction before submitting it".to_string(),
            ));
        }
        let protocol = Protocol::Direct;
        add_signature(pending, parties, protocol, SignerRole::Authority, &self.authority, freshness)?;
        let state =
            add_signature(pending, parties, protocol, SignerRole::Mint, mint.keypair(), freshness)?;
        if state != SigningState::FullySigned {
            return Err(CheckoutError::SignatureOrder(format!(
                "expected a fully signed transaction, got {:?}",
                state
            )));
        }
        Ok(state)
    }
}
