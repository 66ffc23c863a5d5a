//! Centralized configuration (environment variables + defaults).
//!
//! Everything is read once at startup. A missing or placeholder value is a
//! `CheckoutError::Configuration` and the server refuses to start.

use crate::crypto::keys::{keypair_from_base58, keypair_from_file};
use crate::domain::instructions::AssetMetadata;
use crate::domain::pricing::PriceConfig;
use crate::error::{CheckoutError, CheckoutResult};
use reqwest::Url;
use solana_sdk::{
    pubkey::Pubkey,
    signer::{keypair::Keypair, Signer},
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

/// USDC on mainnet.
pub const DEFAULT_PAYMENT_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const DEFAULT_PAYMENT_DECIMALS: u8 = 6;
pub const DEFAULT_PAYMENT_SYMBOL: &str = "USDC";
pub const DEFAULT_PRICE: &str = "8";
pub const DEFAULT_RENT_COST: &str = "0.02";
pub const DEFAULT_FEE_BUFFER: &str = "0.005";
pub const DEFAULT_PASS_NAME: &str = "Pivat Platform Pass";
pub const DEFAULT_PASS_SYMBOL: &str = "PIVAT";
pub const DEFAULT_ROYALTY_BPS: u16 = 250;
pub const DEFAULT_LABEL: &str = "Pivat Platform";
pub const DEFAULT_ICON: &str = "https://app.pivat.io/logo/logo_single.png";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

const PLACEHOLDER_MARKER: &str = "your-";

#[derive(Clone)]
pub struct CheckoutConfig {
    pub rpc_url: String,
    pub authority: Arc<Keypair>,
    pub price: PriceConfig,
    pub metadata: AssetMetadata,
    pub label: String,
    pub icon: String,
    pub bind_addr: SocketAddr,
}

// Only the authority's public key is printed.
impl std::fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("rpc_url", &self.rpc_url)
            .field("authority", &self.authority.pubkey())
            .field("price", &self.price)
            .field("metadata", &self.metadata)
            .field("label", &self.label)
            .field("icon", &self.icon)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl CheckoutConfig {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up `.env`.
    pub fn from_env() -> CheckoutResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> CheckoutResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let rpc_url = env.required("SOLANA_RPC_URL")?;
        validate_rpc_url(&rpc_url)?;

        let authority = match env.optional("AUTHORITY_SECRET_KEY")? {
            Some(secret) => keypair_from_base58(&secret)?,
            None => match env.optional("AUTHORITY_KEYPAIR_PATH")? {
                Some(path) => keypair_from_file(&path)?,
                None => {
                    return Err(CheckoutError::Configuration(
                        "AUTHORITY_SECRET_KEY or AUTHORITY_KEYPAIR_PATH must be set".to_string(),
                    ))
                }
            },
        };

        let payment_mint_str = env.or_default("PAYMENT_MINT", DEFAULT_PAYMENT_MINT)?;
        let payment_mint = Pubkey::from_str(&payment_mint_str).map_err(|_| {
            CheckoutError::Configuration(format!(
                "PAYMENT_MINT is not a valid address: {}",
                payment_mint_str
            ))
        })?;
        let payment_decimals = env.parsed("PAYMENT_DECIMALS", DEFAULT_PAYMENT_DECIMALS)?;
        let price = PriceConfig::new(
            payment_mint,
            payment_decimals,
            env.or_default("PAYMENT_SYMBOL", DEFAULT_PAYMENT_SYMBOL)?,
            &env.or_default("PASS_PRICE", DEFAULT_PRICE)?,
            &env.or_default("PASS_RENT_COST", DEFAULT_RENT_COST)?,
            &env.or_default("PASS_FEE_BUFFER", DEFAULT_FEE_BUFFER)?,
        )?;

        let metadata = AssetMetadata {
            uri: env.required("PASS_METADATA_URI")?,
            name: env.or_default("PASS_NAME", DEFAULT_PASS_NAME)?,
            symbol: env.or_default("PASS_SYMBOL", DEFAULT_PASS_SYMBOL)?,
            seller_fee_basis_points: env.parsed("PASS_ROYALTY_BPS", DEFAULT_ROYALTY_BPS)?,
        };
        metadata.validate()?;

        let bind_addr_str = env.or_default("BIND_ADDR", DEFAULT_BIND_ADDR)?;
        let bind_addr = bind_addr_str.parse::<SocketAddr>().map_err(|_| {
            CheckoutError::Configuration(format!("BIND_ADDR is not a socket address: {}", bind_addr_str))
        })?;

        Ok(Self {
            rpc_url,
            authority: Arc::new(authority),
            price,
            metadata,
            label: env.or_default("CHECKOUT_LABEL", DEFAULT_LABEL)?,
            icon: env.or_default("CHECKOUT_ICON", DEFAULT_ICON)?,
            bind_addr,
        })
    }
}

/// Accepts only absolute http(s) URLs that name a host.
fn validate_rpc_url(rpc_url: &str) -> CheckoutResult<()> {
    let invalid = |reason: &str| {
        CheckoutError::Configuration(format!(
            "SOLANA_RPC_URL must be an http(s) URL with a host, got '{}': {}",
            rpc_url, reason
        ))
    };
    let url = Url::parse(rpc_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("unsupported scheme"));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid("missing host")),
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are the same; placeholders are an error.
    fn optional(&self, key: &str) -> CheckoutResult<Option<String>> {
        match (self.0)(key).map(|v| v.trim().to_string()) {
            None => Ok(None),
            Some(v) if v.is_empty() => Ok(None),
            Some(v) if v.contains(PLACEHOLDER_MARKER) => Err(CheckoutError::Configuration(
                format!("{} still holds a placeholder value", key),
            )),
            Some(v) => Ok(Some(v)),
        }
    }

    fn required(&self, key: &str) -> CheckoutResult<String> {
        self.optional(key)?
            .ok_or_else(|| CheckoutError::Configuration(format!("{} must be set", key)))
    }

    fn or_default(&self, key: &str, default: &str) -> CheckoutResult<String> {
        Ok(self.optional(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> CheckoutResult<T> {
        match self.optional(key)? {
            None => Ok(default),
            Some(v) => v.parse::<T>().map_err(|_| {
                CheckoutError::Configuration(format!("{} has an invalid value: {}", key, v))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_keypair;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        let (_, secret) = generate_keypair();
        HashMap::from([
            ("SOLANA_RPC_URL", "https://api.devnet.solana.com".to_string()),
            ("AUTHORITY_SECRET_KEY", secret),
            ("PASS_METADATA_URI", "https://arweave.net/pass.json".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> CheckoutResult<CheckoutConfig> {
        CheckoutConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.price.token_amount(), 8_000_000);
        assert_eq!(config.price.native_required(), 25_000_000);
        assert_eq!(config.metadata.name, DEFAULT_PASS_NAME);
        assert_eq!(config.bind_addr.port(), 3001);
    }

    #[test]
    fn missing_authority_is_fatal() {
        let mut env = base_env();
        env.remove("AUTHORITY_SECRET_KEY");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("AUTHORITY_SECRET_KEY"));
    }

    #[test]
    fn placeholders_are_rejected() {
        let mut env = base_env();
        env.insert("PASS_METADATA_URI", "https://your-metadata-uri".to_string());
        assert!(matches!(load(&env), Err(CheckoutError::Configuration(_))));
    }

    #[test]
    fn rpc_url_must_be_http() {
        let mut env = base_env();
        env.insert("SOLANA_RPC_URL", "localhost:8899".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn rpc_url_needs_a_host() {
        for url in ["https://", "http://:8899", "ftp://api.devnet.solana.com"] {
            let mut env = base_env();
            env.insert("SOLANA_RPC_URL", url.to_string());
            assert!(
                matches!(load(&env), Err(CheckoutError::Configuration(_))),
                "{} was accepted",
                url
            );
        }

        let mut env = base_env();
        env.insert("SOLANA_RPC_URL", "http://127.0.0.1:8899".to_string());
        assert_eq!(load(&env).unwrap().rpc_url, "http://127.0.0.1:8899");
    }
}
