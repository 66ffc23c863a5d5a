//! Purchase preconditions: one pass per buyer, payment token and native balances, and the
//! payment mint's on-chain decimals.

mod common;

use common::*;
use platform_pass::domain::mint::MintAddressDeriver;
use platform_pass::error::FundsKind;
use platform_pass::solana::MemoryAccount;
use platform_pass::{CheckoutError, Protocol};
use solana_sdk::{pubkey::Pubkey, signer::Signer};
use std::sync::Arc;

#[tokio::test]
async fn exact_balances_are_enough() {
    // Scenario A: 10 USDC held, 8 USDC price.
    let f = fixture();
    let buyer = f.buyer(10_000_000, NATIVE_REQUIRED);

    let response = f
        .service
        .request_transaction(&buyer.pubkey(), Protocol::Direct)
        .await
        .expect("buyer can afford the pass");

    assert!(!response.transaction.is_empty());
    assert_eq!(
        response.message,
        "Purchase your Pivat Platform Pass for 8 USDC + 0.025 SOL (NFT rent + fees)"
    );
}

#[tokio::test]
async fn low_native_balance_is_reported_with_both_amounts() {
    // Scenario B: 0.01 SOL held, 0.025 SOL required.
    let f = fixture();
    let buyer = f.buyer(10_000_000, 10_000_000);

    let err = f
        .service
        .request_transaction(&buyer.pubkey(), Protocol::PaymentRequest)
        .await
        .unwrap_err();

    match err {
        CheckoutError::InsufficientFunds {
            kind,
            required,
            available,
            ..
        } => {
            assert_eq!(kind, FundsKind::Native);
            assert_eq!(required, 25_000_000);
            assert_eq!(available, 10_000_000);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
}

#[tokio::test]
async fn low_token_balance_is_reported_in_base_units() {
    let f = fixture();
    let buyer = f.buyer(7_999_999, ONE_SOL);

    let err = f
        .service
        .request_transaction(&buyer.pubkey(), Protocol::Direct)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::InsufficientFunds {
            kind: FundsKind::Token,
            required: PRICE_BASE_UNITS,
            available: 7_999_999,
            decimals: PAYMENT_DECIMALS,
        }
    ));
    assert_eq!(
        err.to_string(),
        "Insufficient token balance. Required: 8, Available: 7.999999"
    );
}

#[tokio::test]
async fn missing_payment_account_is_its_own_error() {
    let f = fixture();
    let buyer = Pubkey::new_unique();
    f.ledger.fund(&buyer, ONE_SOL);

    let err = f
        .service
        .request_transaction(&buyer, Protocol::Direct)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::NoPaymentAccount { owner } if owner == buyer.to_string()));
}

#[tokio::test]
async fn existing_mint_means_already_purchased() {
    // Scenario C: the derived mint is on-chain. Balances are never consulted.
    let f = fixture();
    let buyer = Pubkey::new_unique();
    let mint = MintAddressDeriver::derive(&buyer).unwrap().pubkey();
    f.ledger.insert_account(&mint, MemoryAccount::Mint { decimals: 0 });

    let err = f
        .service
        .request_transaction(&buyer, Protocol::PaymentRequest)
        .await
        .unwrap_err();

    match err {
        CheckoutError::AlreadyPurchased { mint: reported } => {
            assert_eq!(reported, mint.to_string())
        }
        other => panic!("expected AlreadyPurchased, got {:?}", other),
    }
}

#[tokio::test]
async fn absent_mint_is_unclaimed() {
    let f = fixture();
    let buyer = Pubkey::new_unique();
    let ledger: Arc<dyn platform_pass::solana::Ledger> = f.ledger.clone();
    let deriver = MintAddressDeriver::new(ledger);

    let identity = deriver.derive_unclaimed(&buyer).await.unwrap();
    assert_eq!(
        identity.pubkey(),
        MintAddressDeriver::derive(&buyer).unwrap().pubkey()
    );
    assert!(!deriver.exists_on_chain(&identity).await.unwrap());
}

#[tokio::test]
async fn configured_decimals_must_match_the_chain() {
    let f = fixture();
    f.ledger.add_mint(&f.payment_mint, 9);
    let buyer = f.funded_buyer();

    let err = f
        .service
        .request_transaction(&buyer.pubkey(), Protocol::Direct)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Configuration(msg) if msg.contains("decimals")));
}

#[tokio::test]
async fn authority_cannot_buy_from_itself() {
    let f = fixture();
    f.ledger
        .set_token_balance(&f.authority.pubkey(), &f.payment_mint, 10_000_000);

    let err = f
        .service
        .request_transaction(&f.authority.pubkey(), Protocol::Direct)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(_)));
}
