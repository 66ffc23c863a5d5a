//! Checkout domain: pricing, eligibility, instruction composition, assembly, and signing.

pub mod balance;
pub mod instructions;
pub mod mint;
pub mod pricing;
pub mod signing;
pub mod transaction;

pub use balance::BalanceValidator;
pub use instructions::{AssetIssuer, AssetMetadata, InstructionComposer, TokenMetadataIssuer};
pub use mint::{AssetMintIdentity, MintAddressDeriver};
pub use pricing::PriceConfig;
pub use signing::{sign_as_buyer, Freshness, Protocol, SignerRole, SigningCoordinator};
pub use transaction::{FreshnessAnchor, Parties, PendingTransaction, SigningState, TransactionAssembler};
