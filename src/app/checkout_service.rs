//! The checkout boundary.
//!
//! Two operations are exposed: build a purchase transaction for a buyer, and complete one the
//! buyer has already signed. Both run a strictly ordered sequence of ledger reads and stop at
//! the first failure. The service holds no mutable state, so one `Arc<CheckoutService>` is
//! shared by every request.

use crate::domain::balance::BalanceValidator;
use crate::domain::instructions::{
    AssetIssuer, InstructionComposer, TokenMetadataIssuer, MINT_ACCOUNT_SPACE,
};
use crate::domain::mint::MintAddressDeriver;
use crate::domain::pricing::PriceConfig;
use crate::domain::signing::{check_shape, Freshness, Protocol, SigningCoordinator};
use crate::domain::transaction::{Parties, PendingTransaction, TransactionAssembler};
use crate::error::{CheckoutError, CheckoutResult};
use crate::infra::config::CheckoutConfig;
use crate::infra::solana::Ledger;
use serde::{Deserialize, Serialize};
use solana_sdk::{message::Message, pubkey::Pubkey, signer::keypair::Keypair, signer::Signer};
use spl_associated_token_account::get_associated_token_address;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

pub const FULLY_SIGNED_MESSAGE: &str = "Transaction fully signed - ready to send";

/// What a caller asked the checkout to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutRequest {
    /// Build a new purchase transaction.
    Create { buyer: Pubkey, protocol: Protocol },
    /// Countersign a transaction the buyer signed (direct protocol).
    Submit {
        buyer: Pubkey,
        signed_transaction: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    /// Base64 legacy wire transaction.
    pub transaction: String,
    pub message: String,
}

/// Parses a buyer address.
pub fn parse_buyer(account: &str) -> CheckoutResult<Pubkey> {
    let account = account.trim();
    if account.is_empty() {
        return Err(CheckoutError::Validation("Missing account".to_string()));
    }
    Pubkey::from_str(account)
        .map_err(|_| CheckoutError::Validation(format!("Invalid account address: {}", account)))
}

pub struct CheckoutService {
    ledger: Arc<dyn Ledger>,
    authority: Arc<Keypair>,
    price: PriceConfig,
    pass_name: String,
    deriver: MintAddressDeriver,
    balances: BalanceValidator,
    composer: InstructionComposer,
    assembler: TransactionAssembler,
    coordinator: SigningCoordinator,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        authority: Arc<Keypair>,
        price: PriceConfig,
        issuer: Arc<dyn AssetIssuer>,
        pass_name: impl Into<String>,
    ) -> Self {
        Self {
            deriver: MintAddressDeriver::new(ledger.clone()),
            balances: BalanceValidator::new(ledger.clone()),
            composer: InstructionComposer::new(issuer),
            assembler: TransactionAssembler,
            coordinator: SigningCoordinator::new(authority.clone()),
            ledger,
            authority,
            price,
            pass_name: pass_name.into(),
        }
    }

    pub fn from_config(config: &CheckoutConfig, ledger: Arc<dyn Ledger>) -> CheckoutResult<Self> {
        let issuer = TokenMetadataIssuer::new(config.metadata.clone())?;
        Ok(Self::new(
            ledger,
            config.authority.clone(),
            config.price.clone(),
            Arc::new(issuer),
            config.metadata.name.clone(),
        ))
    }

    pub fn authority(&self) -> Pubkey {
        self.authority.pubkey()
    }

    pub fn price(&self) -> &PriceConfig {
        &self.price
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub async fn handle(&self, request: CheckoutRequest) -> CheckoutResult<CheckoutResponse> {
        match request {
            CheckoutRequest::Create { buyer, protocol } => {
                self.request_transaction(&buyer, protocol).await
            }
            CheckoutRequest::Submit {
                buyer,
                signed_transaction,
            } => self.submit_signed_transaction(&buyer, &signed_transaction).await,
        }
    }

    fn parties(&self, buyer: &Pubkey, mint: Pubkey) -> CheckoutResult<Parties> {
        let authority = self.authority.pubkey();
        if *buyer == authority {
            return Err(CheckoutError::Validation(
                "the issuing authority cannot buy a pass".to_string(),
            ));
        }
        Ok(Parties {
            buyer: *buyer,
            authority,
            mint,
        })
    }

    /// Builds a purchase transaction for `buyer`.
    ///
    /// Under `Protocol::PaymentRequest` the authority and mint signatures are already applied
    /// and only the buyer's remains; under `Protocol::Direct` nothing is signed.
    pub async fn request_transaction(
        &self,
        buyer: &Pubkey,
        protocol: Protocol,
    ) -> CheckoutResult<CheckoutResponse> {
        tracing::info!(buyer = %buyer, %protocol, "checkout requested");

        let mint = self.deriver.derive_unclaimed(buyer).await?;
        let parties = self.parties(buyer, mint.pubkey())?;

        let decimals = self.ledger.mint_decimals(&self.price.payment_mint).await?;
        if decimals != self.price.payment_decimals {
            return Err(CheckoutError::Configuration(format!(
                "payment mint {} has {} decimals on-chain but {} are configured",
                self.price.payment_mint, decimals, self.price.payment_decimals
            )));
        }

        self.balances
            .check_token_balance(buyer, &self.price, self.price.token_amount())
            .await?;
        self.balances
            .check_native_balance(buyer, self.price.native_required())
            .await?;

        let authority_account =
            get_associated_token_address(&parties.authority, &self.price.payment_mint);
        let authority_account_exists = self.ledger.account_exists(&authority_account).await?;
        if !authority_account_exists {
            tracing::info!(account = %authority_account, "authority payment account will be created in this purchase");
        }

        let mint_rent = self
            .ledger
            .minimum_balance_for_rent_exemption(MINT_ACCOUNT_SPACE)
            .await?;
        let anchor = self.ledger.latest_anchor().await?;
        let instructions = self.composer.compose(
            &parties,
            &self.price,
            authority_account_exists,
            mint_rent,
        )?;
        let mut pending = self.assembler.assemble(&instructions, buyer, anchor)?;

        if protocol == Protocol::PaymentRequest {
            self.coordinator
                .presign(&mut pending, &parties, &mint, Freshness::Valid)?;
        }

        tracing::info!(
            buyer = %buyer,
            mint = %parties.mint,
            %protocol,
            blockhash = %anchor.blockhash,
            "purchase transaction built"
        );
        Ok(CheckoutResponse {
            transaction: pending.to_base64()?,
            message: self.price.summary(&self.pass_name),
        })
    }

    /// Completes a buyer-signed transaction with the authority and mint signatures.
    pub async fn submit_signed_transaction(
        &self,
        buyer: &Pubkey,
        signed_transaction: &str,
    ) -> CheckoutResult<CheckoutResponse> {
        tracing::info!(buyer = %buyer, "signed transaction submitted");

        let mut pending = PendingTransaction::from_base64(signed_transaction)?;
        let mint = MintAddressDeriver::derive(buyer)?;
        let parties = self.parties(buyer, mint.pubkey())?;

        let freshness = if self
            .ledger
            .is_blockhash_valid(&pending.anchor().blockhash)
            .await?
        {
            Freshness::Valid
        } else {
            Freshness::Expired
        };

        check_shape(&pending, &parties)?;
        let mint_rent = self
            .ledger
            .minimum_balance_for_rent_exemption(MINT_ACCOUNT_SPACE)
            .await?;
        if !self.is_purchase_message(&pending, &parties, mint_rent)? {
            tracing::warn!(buyer = %buyer, "submitted transaction is not a pass purchase");
            return Err(CheckoutError::SignatureOrder(
                "transaction is not the pass purchase for this buyer".to_string(),
            ));
        }

        self.coordinator
            .countersign(&mut pending, &parties, &mint, freshness)?;

        tracing::info!(buyer = %buyer, mint = %parties.mint, "transaction countersigned");
        Ok(CheckoutResponse {
            transaction: pending.to_base64()?,
            message: FULLY_SIGNED_MESSAGE.to_string(),
        })
    }

    /// The authority only signs messages it would have built itself.
    fn is_purchase_message(
        &self,
        pending: &PendingTransaction,
        parties: &Parties,
        mint_rent: u64,
    ) -> CheckoutResult<bool> {
        let blockhash = pending.anchor().blockhash;
        for authority_account_exists in [true, false] {
            let instructions = self
                .composer
                .compose(parties, &self.price, authority_account_exists, mint_rent)?;
            let expected =
                Message::new_with_blockhash(&instructions, Some(&parties.buyer), &blockhash);
            if expected == pending.transaction().message {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
