use crate::domain::instructions::asset::{AssetIssuer, IssueRequest};
use crate::domain::pricing::PriceConfig;
use crate::domain::transaction::Parties;
use crate::error::CheckoutResult;
use solana_sdk::{instruction::Instruction, system_instruction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use std::sync::Arc;

/// Builds the ordered purchase instructions.
///
/// Order is fixed, each step is a precondition for the next:
/// 1. create the authority's payment-token account (only when it does not exist yet)
/// 2. checked token transfer buyer -> authority for the price
/// 3. native transfer buyer -> authority funding the asset rent
/// 4. asset issuance, appended verbatim from the issuer
///
/// `mint_rent_lamports` is the ledger's rent-exempt minimum for the pass mint account.
pub struct InstructionComposer {
    issuer: Arc<dyn AssetIssuer>,
}

impl InstructionComposer {
    pub fn new(issuer: Arc<dyn AssetIssuer>) -> Self {
        Self { issuer }
    }

    pub fn compose(
        &self,
        parties: &Parties,
        price: &PriceConfig,
        authority_account_exists: bool,
        mint_rent_lamports: u64,
    ) -> CheckoutResult<Vec<Instruction>> {
        let token_program = spl_token::id();
        let from_account = get_associated_token_address(&parties.buyer, &price.payment_mint);
        let to_account = get_associated_token_address(&parties.authority, &price.payment_mint);

        let mut instructions = Vec::with_capacity(9);

        if !authority_account_exists {
            instructions.push(create_associated_token_account(
                &parties.authority,
                &parties.authority,
                &price.payment_mint,
                &token_program,
            ));
        }

        // transfer_checked makes the token program reject a decimals mismatch on-chain too.
        instructions.push(spl_token::instruction::transfer_checked(
            &token_program,
            &from_account,
            &price.payment_mint,
            &to_account,
            &parties.buyer,
            &[],
            price.token_amount(),
            price.payment_decimals,
        )?);

        instructions.push(system_instruction::transfer(
            &parties.buyer,
            &parties.authority,
            price.rent_lamports(),
        ));

        let issued = self.issuer.issue_instructions(&IssueRequest {
            owner: parties.buyer,
            authority: parties.authority,
            mint: parties.mint,
            mint_rent_lamports,
        })?;
        instructions.extend(issued);

        Ok(instructions)
    }
}
