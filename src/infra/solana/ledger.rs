//! Every ledger read and write the checkout performs, behind one async seam.
//!
//! `RpcLedger` talks to a Solana JSON-RPC node. `MemoryLedger` (see `memory.rs`) stands in
//! for it in tests.

use crate::domain::transaction::FreshnessAnchor;
use crate::error::{CheckoutError, CheckoutResult};
use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use spl_token::solana_program::program_pack::Pack;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::time::Duration;

/// Ledger operations consumed by the checkout core and the broadcast step.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether any account (initialized or not) exists at `address`.
    async fn account_exists(&self, address: &Pubkey) -> CheckoutResult<bool>;

    /// Token balance of an SPL token account, `None` if the account does not exist.
    async fn token_balance(&self, token_account: &Pubkey) -> CheckoutResult<Option<u64>>;

    /// Decimal precision recorded in an SPL mint account.
    async fn mint_decimals(&self, mint: &Pubkey) -> CheckoutResult<u8>;

    /// Native balance in lamports (zero for a missing account).
    async fn native_balance(&self, address: &Pubkey) -> CheckoutResult<u64>;

    /// A fresh blockhash together with its last valid block height.
    async fn latest_anchor(&self) -> CheckoutResult<FreshnessAnchor>;

    /// Whether the ledger still accepts transactions built on `blockhash`.
    async fn is_blockhash_valid(&self, blockhash: &Hash) -> CheckoutResult<bool>;

    async fn block_height(&self) -> CheckoutResult<u64>;

    /// Lamports an account of `data_len` bytes needs to be rent exempt.
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> CheckoutResult<u64>;

    /// Submits a signed transaction.
    ///
    /// Fails with `ChainRejected` when the ledger refused this exact transaction and resending
    /// it cannot succeed, or with `ChainRpc` when the node could not be reached or was unhealthy.
    async fn send_transaction(&self, transaction: &Transaction) -> CheckoutResult<Signature>;

    /// `None` while unknown/unconfirmed, `Some(Err(reason))` once it failed on-chain.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> CheckoutResult<Option<Result<(), String>>>;
}

/// Ledger backed by a Solana JSON-RPC endpoint.
pub struct RpcLedger {
    client: RpcClient,
    rpc_url: String,
}

impl RpcLedger {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let rpc_url = rpc_url.into();
        let client = RpcClient::new_with_timeout_and_commitment(
            rpc_url.clone(),
            Duration::from_secs(30),
            CommitmentConfig::confirmed(),
        );
        Self { client, rpc_url }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    async fn fetch_account(&self, address: &Pubkey) -> CheckoutResult<Option<solana_sdk::account::Account>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        Ok(response.value)
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn account_exists(&self, address: &Pubkey) -> CheckoutResult<bool> {
        Ok(self.fetch_account(address).await?.is_some())
    }

    async fn token_balance(&self, token_account: &Pubkey) -> CheckoutResult<Option<u64>> {
        let Some(account) = self.fetch_account(token_account).await? else {
            return Ok(None);
        };
        let state = spl_token::state::Account::unpack(&account.data).map_err(|e| {
            CheckoutError::ChainRpc(format!(
                "account {} is not an SPL token account: {}",
                token_account, e
            ))
        })?;
        Ok(Some(state.amount))
    }

    async fn mint_decimals(&self, mint: &Pubkey) -> CheckoutResult<u8> {
        let account = self
            .fetch_account(mint)
            .await?
            .ok_or_else(|| CheckoutError::ChainRpc(format!("mint {} not found", mint)))?;
        let state = spl_token::state::Mint::unpack(&account.data).map_err(|e| {
            CheckoutError::ChainRpc(format!("account {} is not an SPL mint: {}", mint, e))
        })?;
        Ok(state.decimals)
    }

    async fn native_balance(&self, address: &Pubkey) -> CheckoutResult<u64> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn latest_anchor(&self) -> CheckoutResult<FreshnessAnchor> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.client.commitment())
            .await?;
        Ok(FreshnessAnchor::new(blockhash, last_valid_block_height))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> CheckoutResult<bool> {
        Ok(self
            .client
            .is_blockhash_valid(blockhash, self.client.commitment())
            .await?)
    }

    async fn block_height(&self) -> CheckoutResult<u64> {
        Ok(self.client.get_block_height().await?)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> CheckoutResult<u64> {
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> CheckoutResult<Signature> {
        self.client
            .send_transaction(transaction)
            .await
            .map_err(classify_send_error)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> CheckoutResult<Option<Result<(), String>>> {
        let status = self.client.get_signature_status(signature).await?;
        Ok(status.map(|r| r.map_err(|e| e.to_string())))
    }
}

/// Preflight and execution failures carry a `TransactionError`; everything else (transport,
/// node health, malformed responses) may clear up on its own.
fn classify_send_error(err: ClientError) -> CheckoutError {
    if err.kind().get_transaction_error().is_some() {
        CheckoutError::ChainRejected(err.to_string())
    } else {
        CheckoutError::ChainRpc(err.to_string())
    }
}
