pub mod app;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{CheckoutRequest, CheckoutResponse, CheckoutService};
pub use domain::signing::Protocol;
pub use error::{CheckoutError, CheckoutResult};
pub use infra::config::CheckoutConfig;
pub use infra::solana;
