//! Error taxonomy for the checkout core.
//!
//! Every failure the core can detect is turned into one of these variants and handed back
//! to the caller. Nothing here is retried by the core itself; retry belongs to the
//! broadcast/confirm step on the buyer's side, and only for `is_transient` errors.

use crate::domain::pricing::{format_base_units, LAMPORTS_DECIMALS};
use thiserror::Error;

/// Which balance a funds check was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsKind {
    /// The payment token (e.g. USDC).
    Token,
    /// The ledger's native currency (SOL).
    Native,
}

impl std::fmt::Display for FundsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundsKind::Token => write!(f, "token"),
            FundsKind::Native => write!(f, "native"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Missing or malformed process configuration (authority secret, RPC endpoint, ...).
    ///
    /// Fatal at startup: the service refuses to serve in this state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed caller input (buyer identity, signed payload).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A balance is below what the purchase needs.
    ///
    /// `required` and `available` are in base units; `decimals` converts them for display.
    #[error(
        "Insufficient {kind} balance. Required: {}, Available: {}",
        format_base_units(*required, *decimals),
        format_base_units(*available, *decimals)
    )]
    InsufficientFunds {
        kind: FundsKind,
        required: u64,
        available: u64,
        decimals: u8,
    },

    /// The buyer has never held the payment token.
    #[error("No payment token account found for {owner}. Please ensure you hold the payment token.")]
    NoPaymentAccount { owner: String },

    /// The deterministic pass mint for this buyer already exists on-chain.
    #[error("You already have a platform pass. The mint account {mint} for your wallet already exists.")]
    AlreadyPurchased { mint: String },

    /// A ledger read or write that failed without a verdict on the transaction itself
    /// (unreachable node, timeout, unhealthy node). Safe to retry.
    #[error("Chain RPC error: {0}")]
    ChainRpc(String),

    /// The ledger refused the transaction (failed simulation, already processed, unknown
    /// blockhash). Sending the same bytes again cannot succeed.
    #[error("Transaction rejected by the chain: {0}")]
    ChainRejected(String),

    /// A signature was offered out of protocol order, twice, for the wrong transaction,
    /// or after the freshness anchor expired.
    #[error("Signature order error: {0}")]
    SignatureOrder(String),
}

impl CheckoutError {
    pub fn insufficient_native(required: u64, available: u64) -> Self {
        CheckoutError::InsufficientFunds {
            kind: FundsKind::Native,
            required,
            available,
            decimals: LAMPORTS_DECIMALS,
        }
    }

    /// Whether resending the same transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckoutError::ChainRpc(_))
    }

    /// True when the caller sent something unusable (as opposed to a server or chain fault).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation(_)
                | CheckoutError::InsufficientFunds { .. }
                | CheckoutError::NoPaymentAccount { .. }
                | CheckoutError::AlreadyPurchased { .. }
                | CheckoutError::SignatureOrder(_)
        )
    }
}

impl From<solana_client::client_error::ClientError> for CheckoutError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        CheckoutError::ChainRpc(err.to_string())
    }
}

impl From<spl_token::solana_program::program_error::ProgramError> for CheckoutError {
    fn from(err: spl_token::solana_program::program_error::ProgramError) -> Self {
        CheckoutError::Configuration(format!("instruction build failed: {}", err))
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;
