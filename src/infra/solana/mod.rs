// Responsible for all communication with the Solana blockchain.

pub mod broadcast;
pub mod ledger;
pub mod memory;

pub use broadcast::{send_and_confirm, RetryPolicy};
pub use ledger::{Ledger, RpcLedger};
pub use memory::{MemoryAccount, MemoryLedger, BLOCKHASH_WINDOW};
