use crate::domain::transaction::pending::{FreshnessAnchor, PendingTransaction};
use crate::error::{CheckoutError, CheckoutResult};
use solana_sdk::{instruction::Instruction, message::Message, pubkey::Pubkey, transaction::Transaction};

/// Compiles an instruction list into one legacy transaction paid for by the buyer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionAssembler;

impl TransactionAssembler {
    /// The buyer is always the fee payer, even though the authority and the mint identity
    /// also sign. The message is bound to `anchor.blockhash`, so it dies with the anchor.
    pub fn assemble(
        &self,
        instructions: &[Instruction],
        buyer: &Pubkey,
        anchor: FreshnessAnchor,
    ) -> CheckoutResult<PendingTransaction> {
        if instructions.is_empty() {
            return Err(CheckoutError::Configuration(
                "cannot assemble a transaction without instructions".to_string(),
            ));
        }

        let message = Message::new_with_blockhash(instructions, Some(buyer), &anchor.blockhash);
        let pending = PendingTransaction::new(Transaction::new_unsigned(message), anchor);

        // Fail here rather than hand out bytes no party can broadcast.
        pending.encode()?;

        tracing::debug!(
            buyer = %buyer,
            instructions = instructions.len(),
            signers = pending.required_signers().len(),
            blockhash = %anchor.blockhash,
            "assembled purchase transaction"
        );
        Ok(pending)
    }
}
