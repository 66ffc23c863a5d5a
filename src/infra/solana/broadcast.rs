//! Buyer-side broadcast and confirmation.
//!
//! Transient send failures are retried with exponential backoff, bounded both by an attempt
//! count and by the freshness anchor. A rejection by the ledger is returned at once: once the anchor's expiry height has passed (or the
//! ledger no longer recognizes the blockhash) the transaction can never land, so retrying
//! stops and the caller must request a new one.

use crate::domain::transaction::FreshnessAnchor;
use crate::error::{CheckoutError, CheckoutResult};
use crate::infra::solana::ledger::Ledger;
use solana_sdk::{signature::Signature, transaction::Transaction};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Mirrors the wallet flow: 3 sends, 2s/4s backoff, ~60s of confirmation polling.
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(8),
            poll_interval: Duration::from_millis(500),
            max_polls: 120,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

async fn ensure_fresh(ledger: &dyn Ledger, anchor: &FreshnessAnchor) -> CheckoutResult<()> {
    let expired = match anchor.last_valid_block_height {
        Some(last_valid) => {
            let height = ledger.block_height().await?;
            anchor.is_expired_at(height).then(|| {
                format!(
                    "block height {} exceeded last valid height {}",
                    height, last_valid
                )
            })
        }
        None => (!ledger.is_blockhash_valid(&anchor.blockhash).await?)
            .then(|| format!("blockhash {} is no longer valid", anchor.blockhash)),
    };
    match expired {
        Some(reason) => Err(CheckoutError::ChainRpc(format!(
            "transaction expired: {}; request a new transaction",
            reason
        ))),
        None => Ok(()),
    }
}

/// Sends `transaction` and waits until the ledger reports it confirmed.
pub async fn send_and_confirm(
    ledger: &dyn Ledger,
    transaction: &Transaction,
    anchor: &FreshnessAnchor,
    policy: &RetryPolicy,
) -> CheckoutResult<Signature> {
    let mut attempt = 0u32;
    let signature = loop {
        attempt += 1;
        ensure_fresh(ledger, anchor).await?;

        match ledger.send_transaction(transaction).await {
            Ok(sig) => break sig,
            Err(e) if !e.is_transient() => {
                tracing::error!(attempt, error = %e, "broadcast rejected");
                return Err(e);
            }
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "broadcast failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "broadcast failed, giving up");
                return Err(e);
            }
        }
    };
    tracing::info!(%signature, attempt, "transaction broadcast");

    for _ in 0..policy.max_polls {
        match ledger.signature_status(&signature).await? {
            Some(Ok(())) => {
                tracing::info!(%signature, "transaction confirmed");
                return Ok(signature);
            }
            Some(Err(reason)) => {
                return Err(CheckoutError::ChainRpc(format!(
                    "transaction {} failed on-chain: {}",
                    signature, reason
                )));
            }
            None => {
                ensure_fresh(ledger, anchor).await?;
                tokio::time::sleep(policy.poll_interval).await;
            }
        }
    }

    Err(CheckoutError::ChainRpc(format!(
        "transaction {} not confirmed after {} polls",
        signature, policy.max_polls
    )))
}
