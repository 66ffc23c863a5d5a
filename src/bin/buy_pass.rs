//! Buys a pass end to end from the command line, acting as the buyer's wallet.
//!
//! Requests a transaction from a running `api_server`, signs it with the buyer keypair,
//! (direct protocol) sends it back for the authority and mint signatures, then broadcasts it
//! with retry and waits for confirmation.

use platform_pass::crypto::keypair_from_file;
use platform_pass::domain::signing::{sign_as_buyer, Freshness};
use platform_pass::domain::transaction::PendingTransaction;
use platform_pass::infra::logging::{init_logging, LogFormat, DEFAULT_FILTER};
use platform_pass::solana::{send_and_confirm, RetryPolicy, RpcLedger};
use platform_pass::transport::http::types::ErrorResponse;
use platform_pass::{CheckoutResponse, Protocol};
use serde_json::json;
use solana_sdk::signer::Signer;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin buy_pass -- [--server URL] [--keypair PATH] [--protocol direct|payment-request]\n\
         \n\
         Defaults: --server http://127.0.0.1:3001 --keypair ~/.config/solana/id.json --protocol direct\n\
         Requires env var SOLANA_RPC_URL for broadcasting.\n"
    );
    std::process::exit(2);
}

struct Args {
    server: String,
    keypair: String,
    protocol: Protocol,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        server: "http://127.0.0.1:3001".to_string(),
        keypair: "~/.config/solana/id.json".to_string(),
        protocol: Protocol::Direct,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a value", arg))
        };
        match arg.as_str() {
            "-h" | "--help" => usage_and_exit(),
            "--server" => args.server = value()?,
            "--keypair" => args.keypair = value()?,
            "--protocol" => {
                args.protocol = match value()?.as_str() {
                    "direct" => Protocol::Direct,
                    "payment-request" | "payment_request" => Protocol::PaymentRequest,
                    other => return Err(anyhow::anyhow!("unknown protocol: {}", other)),
                }
            }
            other => return Err(anyhow::anyhow!("unknown argument: {}", other)),
        }
    }
    Ok(args)
}

async fn post_checkout(
    client: &reqwest::Client,
    url: &str,
    body: serde_json::Value,
) -> anyhow::Result<CheckoutResponse> {
    let response = client.post(url).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let err: ErrorResponse = response.json().await?;
        return Err(anyhow::anyhow!("checkout failed ({}): {}", status, err.error));
    }
    Ok(response.json().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging(DEFAULT_FILTER, LogFormat::from_env());

    let args = parse_args()?;
    let rpc_url = std::env::var("SOLANA_RPC_URL")
        .map_err(|_| anyhow::anyhow!("SOLANA_RPC_URL must be set"))?;
    let buyer = keypair_from_file(&args.keypair)?;
    let account = buyer.pubkey().to_string();
    let url = format!("{}/checkout", args.server.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    println!("> Requesting {} checkout for {}", args.protocol, account);
    let request_body = match args.protocol {
        Protocol::Direct => json!({ "account": account, "protocol": "direct" }),
        Protocol::PaymentRequest => json!({ "account": account }),
    };
    let offer = post_checkout(&client, &url, request_body).await?;
    println!("  {}", offer.message);

    let mut pending = PendingTransaction::from_base64(&offer.transaction)?;
    sign_as_buyer(&mut pending, &buyer, args.protocol, Freshness::Valid)?;

    if args.protocol == Protocol::Direct {
        let signed = post_checkout(
            &client,
            &url,
            json!({ "account": account, "signedTransaction": pending.to_base64()? }),
        )
        .await?;
        println!("  {}", signed.message);
        pending = PendingTransaction::from_base64(&signed.transaction)?;
    }

    let ledger = RpcLedger::new(rpc_url);
    let anchor = *pending.anchor();
    let signature =
        send_and_confirm(&ledger, pending.transaction(), &anchor, &RetryPolicy::default()).await?;

    println!("> Pass purchased. Signature: {}", signature);
    Ok(())
}
