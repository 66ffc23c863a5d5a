use platform_pass::crypto::generate_keypair;
use platform_pass::infra::logging::{init_logging, LogFormat, DEFAULT_FILTER};
use platform_pass::solana::{Ledger, RpcLedger};
use platform_pass::CheckoutConfig;
use platform_pass::domain::pricing::{format_base_units, LAMPORTS_DECIMALS};
use solana_sdk::signer::Signer;
use spl_associated_token_account::get_associated_token_address;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--generate-keypair]\n\
         \n\
         Requires env vars:\n\
           SOLANA_RPC_URL, PASS_METADATA_URI\n\
         And the authority key as one of:\n\
           AUTHORITY_SECRET_KEY (base58) or AUTHORITY_KEYPAIR_PATH (JSON file)\n\
         \n\
         --generate-keypair prints a new authority keypair and exits.\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging(DEFAULT_FILTER, LogFormat::from_env());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    if args.iter().any(|a| a == "--generate-keypair") {
        let (keypair, secret) = generate_keypair();
        println!("> New authority keypair:");
        println!("  Public key: {}", keypair.pubkey());
        println!("  AUTHORITY_SECRET_KEY={}", secret);
        println!("> Store the secret somewhere safe; it controls every pass this service issues.");
        return Ok(());
    }

    let config = CheckoutConfig::from_env()?;
    let authority = config.authority.pubkey();
    let price = &config.price;

    println!("> Preflight:");
    println!("  SOLANA_RPC_URL={}", config.rpc_url);
    println!("  Authority: {}", authority);
    println!(
        "  Payment: {} {} (mint {}, {} decimals)",
        format_base_units(price.token_amount(), price.payment_decimals),
        price.payment_symbol,
        price.payment_mint,
        price.payment_decimals
    );
    println!("  Pass: {} ({})", config.metadata.name, config.metadata.uri);

    let ledger = RpcLedger::new(config.rpc_url.clone());

    // Basic RPC connectivity
    let version = ledger.client().get_version().await?;
    println!("  RPC version: {}", version.solana_core);

    let lamports = ledger.native_balance(&authority).await?;
    println!(
        "  Authority balance: {} lamports (~{} SOL)",
        lamports,
        format_base_units(lamports, LAMPORTS_DECIMALS)
    );
    if lamports < price.rent_lamports() {
        eprintln!("  Warning: authority balance is below one pass worth of rent; issuance will fail.");
    }

    let decimals = ledger
        .mint_decimals(&price.payment_mint)
        .await
        .map_err(|e| anyhow::anyhow!("Payment mint {} is not readable: {}", price.payment_mint, e))?;
    if decimals != price.payment_decimals {
        return Err(anyhow::anyhow!(
            "PAYMENT_DECIMALS={} but mint {} has {} decimals on-chain",
            price.payment_decimals,
            price.payment_mint,
            decimals
        ));
    }
    println!("  Payment mint decimals match ({}).", decimals);

    let payment_account = get_associated_token_address(&authority, &price.payment_mint);
    match ledger.token_balance(&payment_account).await? {
        Some(amount) => println!(
            "  Authority {} account {}: {} {}",
            price.payment_symbol,
            payment_account,
            format_base_units(amount, decimals),
            price.payment_symbol
        ),
        None => println!(
            "  Authority {} account {} does not exist yet; the first purchase creates it.",
            price.payment_symbol, payment_account
        ),
    }

    println!("> Preflight OK.");
    Ok(())
}
