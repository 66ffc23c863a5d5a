//! Pre-flight balance checks for the buyer.
//!
//! Each check reads the ledger at the moment it runs. Nothing stops the balance from
//! changing before broadcast; in that case the transfer fails on-chain instead.

use crate::domain::pricing::PriceConfig;
use crate::error::{CheckoutError, CheckoutResult, FundsKind};
use crate::infra::solana::Ledger;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;

pub struct BalanceValidator {
    ledger: Arc<dyn Ledger>,
}

impl BalanceValidator {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Succeeds iff the buyer's payment-token account holds at least `required` base units.
    /// Returns the observed balance.
    pub async fn check_token_balance(
        &self,
        buyer: &Pubkey,
        price: &PriceConfig,
        required: u64,
    ) -> CheckoutResult<u64> {
        let account = get_associated_token_address(buyer, &price.payment_mint);
        let available = self
            .ledger
            .token_balance(&account)
            .await?
            .ok_or_else(|| CheckoutError::NoPaymentAccount {
                owner: buyer.to_string(),
            })?;

        if available < required {
            tracing::info!(buyer = %buyer, required, available, "insufficient token balance");
            return Err(CheckoutError::InsufficientFunds {
                kind: FundsKind::Token,
                required,
                available,
                decimals: price.payment_decimals,
            });
        }
        Ok(available)
    }

    /// Succeeds iff the buyer holds at least `required` lamports. Returns the observed balance.
    pub async fn check_native_balance(&self, buyer: &Pubkey, required: u64) -> CheckoutResult<u64> {
        let available = self.ledger.native_balance(buyer).await?;
        if available < required {
            tracing::info!(buyer = %buyer, required, available, "insufficient native balance");
            return Err(CheckoutError::insufficient_native(required, available));
        }
        Ok(available)
    }
}
