#![allow(dead_code)]

use platform_pass::domain::instructions::{AssetMetadata, TokenMetadataIssuer};
use platform_pass::domain::pricing::PriceConfig;
use platform_pass::solana::{Ledger, MemoryLedger};
use platform_pass::CheckoutService;
use solana_sdk::{
    pubkey::Pubkey,
    signer::{keypair::Keypair, Signer},
};
use std::sync::Arc;

pub const PAYMENT_DECIMALS: u8 = 6;
/// 8 tokens at 6 decimals.
pub const PRICE_BASE_UNITS: u64 = 8_000_000;
/// 0.02 rent + 0.005 fee buffer.
pub const NATIVE_REQUIRED: u64 = 25_000_000;
pub const ONE_SOL: u64 = 1_000_000_000;

pub struct Fixture {
    pub ledger: Arc<MemoryLedger>,
    pub authority: Arc<Keypair>,
    pub payment_mint: Pubkey,
    pub service: Arc<CheckoutService>,
}

pub fn metadata() -> AssetMetadata {
    AssetMetadata {
        uri: "https://arweave.net/pivat-pass.json".to_string(),
        name: "Pivat Platform Pass".to_string(),
        symbol: "PIVAT".to_string(),
        seller_fee_basis_points: 250,
    }
}

pub fn price_config(payment_mint: Pubkey, price: &str) -> PriceConfig {
    PriceConfig::new(payment_mint, PAYMENT_DECIMALS, "USDC", price, "0.02", "0.005")
        .expect("valid price config")
}

/// Chain with a 6-decimal payment mint and a funded authority whose payment account exists.
pub fn fixture() -> Fixture {
    let f = fixture_without_authority_account();
    f.ledger
        .set_token_balance(&f.authority.pubkey(), &f.payment_mint, 0);
    f
}

pub fn fixture_without_authority_account() -> Fixture {
    let ledger = Arc::new(MemoryLedger::new());
    let authority = Arc::new(Keypair::new());
    let payment_mint = Pubkey::new_unique();

    ledger.add_mint(&payment_mint, PAYMENT_DECIMALS);
    ledger.fund(&authority.pubkey(), ONE_SOL);

    let service = service_for(&ledger, &authority, price_config(payment_mint, "8"));
    Fixture {
        ledger,
        authority,
        payment_mint,
        service,
    }
}

pub fn service_for(
    ledger: &Arc<MemoryLedger>,
    authority: &Arc<Keypair>,
    price: PriceConfig,
) -> Arc<CheckoutService> {
    let issuer = TokenMetadataIssuer::new(metadata()).expect("valid metadata");
    let ledger: Arc<dyn Ledger> = ledger.clone();
    Arc::new(CheckoutService::new(
        ledger,
        authority.clone(),
        price,
        Arc::new(issuer),
        "Pivat Platform Pass",
    ))
}

impl Fixture {
    /// A buyer holding `tokens` payment base units and `lamports` native balance.
    pub fn buyer(&self, tokens: u64, lamports: u64) -> Keypair {
        let buyer = Keypair::new();
        self.ledger
            .set_token_balance(&buyer.pubkey(), &self.payment_mint, tokens);
        self.ledger.fund(&buyer.pubkey(), lamports);
        buyer
    }

    pub fn funded_buyer(&self) -> Keypair {
        self.buyer(10_000_000, ONE_SOL)
    }
}
