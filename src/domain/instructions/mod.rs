pub mod asset;
pub mod composer;

pub use asset::{
    AssetIssuer, AssetMetadata, IssueRequest, TokenMetadataIssuer, MINT_ACCOUNT_SPACE,
    TOKEN_METADATA_PROGRAM_ID,
};
pub use composer::InstructionComposer;
