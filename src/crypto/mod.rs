pub mod keys;

pub use keys::{generate_keypair, keypair_from_base58, keypair_from_file};
