//! Per-buyer pass mint identity.
//!
//! The mint keypair is a pure function of the buyer's address, so "has this buyer already
//! bought a pass" is answered by asking the ledger whether the derived mint account exists.
//! There is no purchase index to keep in sync.

use crate::error::{CheckoutError, CheckoutResult};
use crate::infra::solana::Ledger;
use solana_sdk::{
    pubkey::Pubkey,
    signer::{
        keypair::{keypair_from_seed, Keypair},
        Signer,
    },
};
use std::sync::Arc;

/// The keypair that becomes the buyer's pass mint.
#[derive(Debug)]
pub struct AssetMintIdentity {
    keypair: Keypair,
}

impl AssetMintIdentity {
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

pub struct MintAddressDeriver {
    ledger: Arc<dyn Ledger>,
}

impl MintAddressDeriver {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Uses the buyer's 32 address bytes as an Ed25519 seed.
    pub fn derive(buyer: &Pubkey) -> CheckoutResult<AssetMintIdentity> {
        let seed = buyer.to_bytes();
        let keypair = keypair_from_seed(&seed[..32]).map_err(|e| {
            CheckoutError::Validation(format!("cannot derive mint for {}: {}", buyer, e))
        })?;
        Ok(AssetMintIdentity { keypair })
    }

    pub async fn exists_on_chain(&self, identity: &AssetMintIdentity) -> CheckoutResult<bool> {
        self.ledger.account_exists(&identity.pubkey()).await
    }

    /// Derives the buyer's mint and fails with `AlreadyPurchased` if it is already on-chain.
    pub async fn derive_unclaimed(&self, buyer: &Pubkey) -> CheckoutResult<AssetMintIdentity> {
        let identity = Self::derive(buyer)?;
        if self.exists_on_chain(&identity).await? {
            tracing::info!(buyer = %buyer, mint = %identity.pubkey(), "pass mint already exists");
            return Err(CheckoutError::AlreadyPurchased {
                mint: identity.pubkey().to_string(),
            });
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let buyer = Pubkey::new_unique();
        let a = MintAddressDeriver::derive(&buyer).unwrap();
        let b = MintAddressDeriver::derive(&buyer).unwrap();
        assert_eq!(a.pubkey(), b.pubkey());
        assert_eq!(a.keypair().to_bytes(), b.keypair().to_bytes());
    }

    #[test]
    fn distinct_buyers_get_distinct_mints() {
        let mints: std::collections::HashSet<Pubkey> = (0..64)
            .map(|_| MintAddressDeriver::derive(&Pubkey::new_unique()).unwrap().pubkey())
            .collect();
        assert_eq!(mints.len(), 64);
    }

    #[test]
    fn mint_is_never_the_buyer() {
        let buyer = Pubkey::new_unique();
        assert_ne!(MintAddressDeriver::derive(&buyer).unwrap().pubkey(), buyer);
    }
}
