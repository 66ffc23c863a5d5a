pub mod assembler;
pub mod pending;

pub use assembler::TransactionAssembler;
pub use pending::{FreshnessAnchor, Parties, PendingTransaction, SigningState};
