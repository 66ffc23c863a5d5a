//! Drives the checkout over HTTP: boots the router on an ephemeral port and talks to it with
//! reqwest, the way a wallet or the web client would.

mod common;

use common::*;
use platform_pass::domain::signing::{sign_as_buyer, Freshness};
use platform_pass::domain::transaction::{PendingTransaction, SigningState};
use platform_pass::solana::{send_and_confirm, RetryPolicy};
use platform_pass::transport;
use platform_pass::{CheckoutResponse, Protocol};
use serde_json::{json, Value};
use solana_sdk::signer::Signer;

struct Server {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start(f: &Fixture) -> Result<Server, Box<dyn std::error::Error>> {
    let state = transport::http::AppState {
        checkout: f.service.clone(),
        label: "Pivat Platform".to_string(),
        icon: "https://app.pivat.io/logo/logo_single.png".to_string(),
        rpc_url: "memory://".to_string(),
    };
    let router = transport::http::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Ok(Server {
        base_url: format!("http://{}", addr),
        handle,
    })
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    body: Value,
) -> Result<(u16, Value), Box<dyn std::error::Error>> {
    let response = client.post(url).json(&body).send().await?;
    let status = response.status().as_u16();
    Ok((status, response.json::<Value>().await?))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wallet_metadata_and_health() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();

    for path in ["/checkout", "/api/nft-pass/checkout"] {
        let info = client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await?
            .json::<Value>()
            .await?;
        assert_eq!(info["label"], "Pivat Platform");
        assert_eq!(info["icon"], "https://app.pivat.io/logo/logo_single.png");
    }

    let health = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await?;
    assert_eq!(health.status().as_u16(), 200);
    let health = health.json::<Value>().await?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["authority"], f.authority.pubkey().to_string());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn direct_checkout_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/api/nft-pass/checkout", server.base_url);
    let buyer = f.funded_buyer();
    let account = buyer.pubkey().to_string();

    let (status, offer) = post(&client, &url, json!({ "account": account, "protocol": "direct" })).await?;
    assert_eq!(status, 200, "{}", offer);
    assert_eq!(
        offer["message"],
        "Purchase your Pivat Platform Pass for 8 USDC + 0.025 SOL (NFT rent + fees)"
    );

    let mut pending = PendingTransaction::from_base64(offer["transaction"].as_str().unwrap_or_default())?;
    assert_eq!(pending.state()?, SigningState::Unsigned);
    sign_as_buyer(&mut pending, &buyer, Protocol::Direct, Freshness::Valid)?;

    let (status, signed) = post(
        &client,
        &url,
        json!({ "account": account, "signedTransaction": pending.to_base64()? }),
    )
    .await?;
    assert_eq!(status, 200, "{}", signed);
    assert_eq!(signed["message"], "Transaction fully signed - ready to send");

    let done = PendingTransaction::from_base64(signed["transaction"].as_str().unwrap_or_default())?;
    assert_eq!(done.state()?, SigningState::FullySigned);
    send_and_confirm(f.ledger.as_ref(), done.transaction(), done.anchor(), &RetryPolicy::default())
        .await?;

    let (status, err) = post(&client, &url, json!({ "account": account })).await?;
    assert_eq!(status, 409);
    assert_eq!(err["code"], "already_purchased");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bare_account_gets_a_presigned_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();
    let buyer = f.funded_buyer();

    let (status, offer) = post(
        &client,
        &format!("{}/checkout", server.base_url),
        json!({ "account": buyer.pubkey().to_string() }),
    )
    .await?;
    assert_eq!(status, 200, "{}", offer);

    let mut pending = PendingTransaction::from_base64(offer["transaction"].as_str().unwrap_or_default())?;
    assert_eq!(pending.signed_by()?.len(), 2);
    let state = sign_as_buyer(&mut pending, &buyer, Protocol::PaymentRequest, Freshness::Valid)?;
    assert_eq!(state, SigningState::FullySigned);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn errors_map_to_status_codes() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/checkout", server.base_url);

    let (status, body) = post(&client, &url, json!({})).await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid request: No account provided");

    let (status, _) = post(&client, &url, json!({ "account": "definitely-not-base58" })).await?;
    assert_eq!(status, 400);

    let malformed = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(malformed.status().as_u16(), 400);

    let broke = f.buyer(1_000_000, ONE_SOL);
    let (status, body) = post(&client, &url, json!({ "account": broke.pubkey().to_string() })).await?;
    assert_eq!(status, 402);
    assert_eq!(body["code"], "insufficient_funds");
    assert_eq!(
        body["error"],
        "Insufficient token balance. Required: 8, Available: 1"
    );

    let stranger = solana_sdk::pubkey::Pubkey::new_unique();
    let (status, body) = post(&client, &url, json!({ "account": stranger.to_string() })).await?;
    assert_eq!(status, 402);
    assert_eq!(body["code"], "no_payment_account");

    let buyer = f.funded_buyer();
    let (status, body) = post(
        &client,
        &url,
        json!({ "account": buyer.pubkey().to_string(), "signedTransaction": "AAAA" }),
    )
    .await?;
    assert_eq!(status, 400, "{}", body);

    let (status, body) = post(
        &client,
        &url,
        json!({
            "account": buyer.pubkey().to_string(),
            "signedTransaction": "AAAA",
            "protocol": "payment_request"
        }),
    )
    .await?;
    assert_eq!(status, 400, "{}", body);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsigned_submission_is_a_signature_order_error() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/checkout", server.base_url);
    let buyer = f.funded_buyer();
    let account = buyer.pubkey().to_string();

    let (_, offer) = post(&client, &url, json!({ "account": account, "protocol": "direct" })).await?;
    let (status, body) = post(
        &client,
        &url,
        json!({ "account": account, "signedTransaction": offer["transaction"] }),
    )
    .await?;
    assert_eq!(status, 422);
    assert_eq!(body["code"], "signature_order");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replies_decode_into_checkout_response() -> Result<(), Box<dyn std::error::Error>> {
    let f = fixture();
    let server = start(&f).await?;
    let client = reqwest::Client::new();
    let buyer = f.funded_buyer();

    let offer: CheckoutResponse = client
        .post(format!("{}/api/nft-pass/checkout", server.base_url))
        .json(&json!({ "account": buyer.pubkey().to_string(), "protocol": "direct" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    assert!(offer.message.starts_with("Purchase your Pivat Platform Pass"));
    let pending = PendingTransaction::from_base64(&offer.transaction)?;
    assert_eq!(pending.fee_payer(), Some(&buyer.pubkey()));
    Ok(())
}
