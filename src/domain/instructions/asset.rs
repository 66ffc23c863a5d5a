//! Asset issuance: the instructions that bring a one-of-one pass NFT into existence.
//!
//! The checkout treats issuance as a black box behind `AssetIssuer`; the composer appends
//! whatever it returns verbatim. `TokenMetadataIssuer` produces the classic Metaplex NFT
//! sequence: SPL mint + owner token account + one token + metadata + master edition.

use crate::error::{CheckoutError, CheckoutResult};
use mpl_token_metadata::accounts::{MasterEdition, Metadata};
use mpl_token_metadata::instructions::{
    CreateMasterEditionV3, CreateMasterEditionV3InstructionArgs, CreateMetadataAccountV3,
    CreateMetadataAccountV3InstructionArgs,
};
use mpl_token_metadata::types::{Creator, DataV2};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction, system_program, sysvar};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::solana_program::program_pack::Pack;

pub use mpl_token_metadata::ID as TOKEN_METADATA_PROGRAM_ID;

/// Bytes allocated for the pass mint account.
pub const MINT_ACCOUNT_SPACE: usize = spl_token::state::Mint::LEN;

// Token Metadata field limits.
const MAX_NAME_LENGTH: usize = 32;
const MAX_SYMBOL_LENGTH: usize = 10;
const MAX_URI_LENGTH: usize = 200;
const MAX_BASIS_POINTS: u16 = 10_000;

/// Display data attached to every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub uri: String,
    pub name: String,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
}

impl AssetMetadata {
    pub fn validate(&self) -> CheckoutResult<()> {
        let check = |field: &str, value: &str, max: usize| {
            if value.is_empty() || value.len() > max {
                Err(CheckoutError::Configuration(format!(
                    "asset {} must be 1..={} bytes, got {}",
                    field,
                    max,
                    value.len()
                )))
            } else {
                Ok(())
            }
        };
        check("name", &self.name, MAX_NAME_LENGTH)?;
        check("symbol", &self.symbol, MAX_SYMBOL_LENGTH)?;
        check("uri", &self.uri, MAX_URI_LENGTH)?;
        if self.seller_fee_basis_points > MAX_BASIS_POINTS {
            return Err(CheckoutError::Configuration(format!(
                "royalty basis points must be <= {}, got {}",
                MAX_BASIS_POINTS, self.seller_fee_basis_points
            )));
        }
        Ok(())
    }
}

/// Who receives the new asset and who controls it.
#[derive(Debug, Clone, Copy)]
pub struct IssueRequest {
    /// Receives the single token.
    pub owner: Pubkey,
    /// Mint authority, update authority, verified creator, and rent payer.
    pub authority: Pubkey,
    /// Address of the new mint; must sign the transaction.
    pub mint: Pubkey,
    /// Rent-exempt minimum for `MINT_ACCOUNT_SPACE`, as reported by the ledger.
    pub mint_rent_lamports: u64,
}

pub trait AssetIssuer: Send + Sync {
    fn issue_instructions(&self, request: &IssueRequest) -> CheckoutResult<Vec<Instruction>>;
}

/// Issues a Metaplex master-edition NFT with a single verified creator (the authority).
#[derive(Debug, Clone)]
pub struct TokenMetadataIssuer {
    metadata: AssetMetadata,
}

impl TokenMetadataIssuer {
    pub fn new(metadata: AssetMetadata) -> CheckoutResult<Self> {
        metadata.validate()?;
        Ok(Self { metadata })
    }

    pub fn metadata(&self) -> &AssetMetadata {
        &self.metadata
    }

    fn create_metadata_account_v3(&self, request: &IssueRequest) -> Instruction {
        let md = &self.metadata;
        let accounts = CreateMetadataAccountV3 {
            metadata: Metadata::find_pda(&request.mint).0,
            mint: request.mint,
            mint_authority: request.authority,
            payer: request.authority,
            update_authority: (request.authority, true),
            system_program: system_program::id(),
            rent: Some(sysvar::rent::id()),
        };
        accounts.instruction(CreateMetadataAccountV3InstructionArgs {
            data: DataV2 {
                name: md.name.clone(),
                symbol: md.symbol.clone(),
                uri: md.uri.clone(),
                seller_fee_basis_points: md.seller_fee_basis_points,
                // Verified because the authority signs this instruction.
                creators: Some(vec![Creator {
                    address: request.authority,
                    verified: true,
                    share: 100,
                }]),
                collection: None,
                uses: None,
            },
            is_mutable: true,
            collection_details: None,
        })
    }

    fn create_master_edition_v3(&self, request: &IssueRequest) -> Instruction {
        let accounts = CreateMasterEditionV3 {
            edition: MasterEdition::find_pda(&request.mint).0,
            mint: request.mint,
            update_authority: request.authority,
            mint_authority: request.authority,
            payer: request.authority,
            metadata: Metadata::find_pda(&request.mint).0,
            token_program: spl_token::id(),
            system_program: system_program::id(),
            rent: Some(sysvar::rent::id()),
        };
        // No prints can ever be made from this master.
        accounts.instruction(CreateMasterEditionV3InstructionArgs {
            max_supply: Some(0),
        })
    }
}

impl AssetIssuer for TokenMetadataIssuer {
    fn issue_instructions(&self, request: &IssueRequest) -> CheckoutResult<Vec<Instruction>> {
        let token_program = spl_token::id();
        let owner_account = get_associated_token_address(&request.owner, &request.mint);

        Ok(vec![
            system_instruction::create_account(
                &request.authority,
                &request.mint,
                request.mint_rent_lamports,
                MINT_ACCOUNT_SPACE as u64,
                &token_program,
            ),
            spl_token::instruction::initialize_mint2(
                &token_program,
                &request.mint,
                &request.authority,
                Some(&request.authority),
                0,
            )?,
            create_associated_token_account(
                &request.authority,
                &request.owner,
                &request.mint,
                &token_program,
            ),
            spl_token::instruction::mint_to(
                &token_program,
                &request.mint,
                &owner_account,
                &request.authority,
                &[],
                1,
            )?,
            self.create_metadata_account_v3(request),
            self.create_master_edition_v3(request),
        ])
    }
}
