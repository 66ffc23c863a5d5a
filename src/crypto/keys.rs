//! Authority key material: decoding, loading, and generation.
//!
//! Secrets are never formatted into errors or logs; only public keys are.

use crate::error::{CheckoutError, CheckoutResult};
use solana_sdk::signer::keypair::{read_keypair_file, Keypair};

/// Decodes a base58 64-byte secret key (secret scalar followed by public key), the format
/// wallets export.
#[allow(deprecated)]
pub fn keypair_from_base58(secret: &str) -> CheckoutResult<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|_| CheckoutError::Configuration("authority secret key is not valid base58".into()))?;
    if bytes.len() != 64 {
        return Err(CheckoutError::Configuration(format!(
            "authority secret key must be 64 bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::from_bytes(&bytes).map_err(|_| {
        CheckoutError::Configuration("authority secret key is not a valid ed25519 keypair".into())
    })
}

/// Reads a JSON keypair file as written by `solana-keygen`. `~` is expanded.
pub fn keypair_from_file(path: &str) -> CheckoutResult<Keypair> {
    let expanded = shellexpand::tilde(path).to_string();
    read_keypair_file(&expanded).map_err(|e| {
        CheckoutError::Configuration(format!("failed to read keypair file {}: {}", expanded, e))
    })
}

/// A fresh keypair and its base58 secret, for provisioning a new authority.
pub fn generate_keypair() -> (Keypair, String) {
    let keypair = Keypair::new();
    let secret = bs58::encode(keypair.to_bytes()).into_string();
    (keypair, secret)
}
