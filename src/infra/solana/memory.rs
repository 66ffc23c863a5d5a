//! In-process ledger used by tests and local dry runs.
//!
//! It models just enough of the chain for checkout: system/token/mint accounts, a rolling
//! blockhash window, and broadcast semantics for the instructions a purchase contains
//! (account creation conflicts, lamport and token transfers, mint initialization).

use crate::domain::transaction::FreshnessAnchor;
use crate::error::{CheckoutError, CheckoutResult};
use crate::infra::solana::ledger::Ledger;
use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, rent::Rent, signature::Signature, transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Blocks a blockhash stays usable for, as on mainnet.
pub const BLOCKHASH_WINDOW: u64 = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAccount {
    System { lamports: u64 },
    Token { owner: Pubkey, mint: Pubkey, amount: u64 },
    Mint { decimals: u8 },
    /// Allocated but not interpreted (metadata, freshly created mint before init, ...).
    Opaque,
}

#[derive(Debug)]
struct MemoryState {
    accounts: HashMap<Pubkey, MemoryAccount>,
    /// blockhash -> last valid block height
    blockhashes: HashMap<Hash, u64>,
    latest: Hash,
    block_height: u64,
    statuses: HashMap<Signature, Result<(), String>>,
    sent: Vec<Transaction>,
    send_attempts: u32,
    failing_sends: u32,
    rent: Rent,
}

pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let latest = Hash::new_unique();
        let block_height = 1_000;
        let mut blockhashes = HashMap::new();
        blockhashes.insert(latest, block_height + BLOCKHASH_WINDOW);
        Self {
            state: Mutex::new(MemoryState {
                accounts: HashMap::new(),
                blockhashes,
                latest,
                block_height,
                statuses: HashMap::new(),
                sent: Vec::new(),
                send_attempts: 0,
                failing_sends: 0,
                rent: Rent::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the native balance of `owner`, creating the account if needed.
    pub fn fund(&self, owner: &Pubkey, lamports: u64) {
        self.lock()
            .accounts
            .insert(*owner, MemoryAccount::System { lamports });
    }

    pub fn add_mint(&self, mint: &Pubkey, decimals: u8) {
        self.lock()
            .accounts
            .insert(*mint, MemoryAccount::Mint { decimals });
    }

    /// Creates (or overwrites) `owner`'s associated token account for `mint`.
    pub fn set_token_balance(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let ata = get_associated_token_address(owner, mint);
        self.lock().accounts.insert(
            ata,
            MemoryAccount::Token {
                owner: *owner,
                mint: *mint,
                amount,
            },
        );
        ata
    }

    pub fn insert_account(&self, address: &Pubkey, account: MemoryAccount) {
        self.lock().accounts.insert(*address, account);
    }

    pub fn account(&self, address: &Pubkey) -> Option<MemoryAccount> {
        self.lock().accounts.get(address).cloned()
    }

    /// Moves the chain forward without producing a new blockhash.
    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.lock();
        state.block_height += blocks;
    }

    /// Produces a new latest blockhash; older ones stay valid until their own expiry.
    pub fn rotate_blockhash(&self) -> Hash {
        let mut state = self.lock();
        let hash = Hash::new_unique();
        let expiry = state.block_height + BLOCKHASH_WINDOW;
        state.blockhashes.insert(hash, expiry);
        state.latest = hash;
        hash
    }

    /// Makes the next `count` broadcasts fail with a transient RPC error.
    pub fn fail_next_sends(&self, count: u32) {
        self.lock().failing_sends = count;
    }

    /// Replaces the rent schedule (mainnet's by default).
    pub fn set_rent(&self, rent: Rent) {
        self.lock().rent = rent;
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.lock().sent.clone()
    }

    /// Every `send_transaction` call, accepted or not.
    pub fn send_attempts(&self) -> u32 {
        self.lock().send_attempts
    }

    fn apply(
        accounts: &mut HashMap<Pubkey, MemoryAccount>,
        transaction: &Transaction,
    ) -> Result<(), String> {
        let keys = &transaction.message.account_keys;
        let system = solana_sdk::system_program::id();
        let token = spl_token::id();
        let ata_program = spl_associated_token_account::id();

        for ix in &transaction.message.instructions {
            let program = keys[ix.program_id_index as usize];
            let account = |i: usize| -> Result<Pubkey, String> {
                ix.accounts
                    .get(i)
                    .map(|idx| keys[*idx as usize])
                    .ok_or_else(|| format!("instruction for {} is missing account #{}", program, i))
            };
            let data = &ix.data;

            if program == system && data.len() >= 12 {
                let tag = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                let lamports = u64::from_le_bytes(data[4..12].try_into().map_err(|_| "bad data")?);
                let from = account(0)?;
                let to = account(1)?;
                match tag {
                    // CreateAccount
                    0 => {
                        if accounts.contains_key(&to) {
                            return Err(format!(
                                "Allocate: account Address {{ address: {}, base: None }} already in use",
                                to
                            ));
                        }
                        debit(accounts, &from, lamports)?;
                        accounts.insert(to, MemoryAccount::Opaque);
                    }
                    // Transfer
                    2 => {
                        debit(accounts, &from, lamports)?;
                        credit(accounts, &to, lamports);
                    }
                    _ => {}
                }
            } else if program == ata_program {
                let ata = account(1)?;
                let wallet = account(2)?;
                let mint = account(3)?;
                let idempotent = data.first() == Some(&1);
                if accounts.contains_key(&ata) {
                    if idempotent {
                        continue;
                    }
                    return Err(format!("associated token account {} already in use", ata));
                }
                accounts.insert(
                    ata,
                    MemoryAccount::Token {
                        owner: wallet,
                        mint,
                        amount: 0,
                    },
                );
            } else if program == token && !data.is_empty() {
                match data[0] {
                    // MintTo
                    7 if data.len() >= 9 => {
                        let amount = u64::from_le_bytes(data[1..9].try_into().map_err(|_| "bad data")?);
                        adjust_token(accounts, &account(1)?, amount as i128)?;
                    }
                    // TransferChecked
                    12 if data.len() >= 10 => {
                        let amount = u64::from_le_bytes(data[1..9].try_into().map_err(|_| "bad data")?);
                        let decimals = data[9];
                        let mint = account(1)?;
                        match accounts.get(&mint) {
                            Some(MemoryAccount::Mint { decimals: d }) if *d == decimals => {}
                            _ => return Err("custom program error: 0x12 (MintDecimalsMismatch)".into()),
                        }
                        adjust_token(accounts, &account(0)?, -(amount as i128))?;
                        adjust_token(accounts, &account(2)?, amount as i128)?;
                    }
                    // InitializeMint2
                    20 if data.len() >= 2 => {
                        accounts.insert(account(0)?, MemoryAccount::Mint { decimals: data[1] });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

fn debit(accounts: &mut HashMap<Pubkey, MemoryAccount>, from: &Pubkey, lamports: u64) -> Result<(), String> {
    match accounts.get_mut(from) {
        Some(MemoryAccount::System { lamports: balance }) if *balance >= lamports => {
            *balance -= lamports;
            Ok(())
        }
        _ => Err(format!("insufficient lamports in {}", from)),
    }
}

fn credit(accounts: &mut HashMap<Pubkey, MemoryAccount>, to: &Pubkey, lamports: u64) {
    match accounts.get_mut(to) {
        Some(MemoryAccount::System { lamports: balance }) => *balance += lamports,
        Some(_) => {}
        None => {
            accounts.insert(*to, MemoryAccount::System { lamports });
        }
    }
}

fn adjust_token(
    accounts: &mut HashMap<Pubkey, MemoryAccount>,
    address: &Pubkey,
    delta: i128,
) -> Result<(), String> {
    match accounts.get_mut(address) {
        Some(MemoryAccount::Token { amount, .. }) => {
            let next = *amount as i128 + delta;
            if next < 0 {
                return Err("custom program error: 0x1 (InsufficientFunds)".into());
            }
            *amount = next as u64;
            Ok(())
        }
        _ => Err(format!("token account {} not found", address)),
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn account_exists(&self, address: &Pubkey) -> CheckoutResult<bool> {
        Ok(self.lock().accounts.contains_key(address))
    }

    async fn token_balance(&self, token_account: &Pubkey) -> CheckoutResult<Option<u64>> {
        match self.lock().accounts.get(token_account) {
            None => Ok(None),
            Some(MemoryAccount::Token { amount, .. }) => Ok(Some(*amount)),
            Some(_) => Err(CheckoutError::ChainRpc(format!(
                "account {} is not an SPL token account",
                token_account
            ))),
        }
    }

    async fn mint_decimals(&self, mint: &Pubkey) -> CheckoutResult<u8> {
        match self.lock().accounts.get(mint) {
            Some(MemoryAccount::Mint { decimals }) => Ok(*decimals),
            Some(_) => Err(CheckoutError::ChainRpc(format!("account {} is not an SPL mint", mint))),
            None => Err(CheckoutError::ChainRpc(format!("mint {} not found", mint))),
        }
    }

    async fn native_balance(&self, address: &Pubkey) -> CheckoutResult<u64> {
        match self.lock().accounts.get(address) {
            Some(MemoryAccount::System { lamports }) => Ok(*lamports),
            _ => Ok(0),
        }
    }

    async fn latest_anchor(&self) -> CheckoutResult<FreshnessAnchor> {
        let state = self.lock();
        let expiry = state
            .blockhashes
            .get(&state.latest)
            .copied()
            .unwrap_or(state.block_height);
        Ok(FreshnessAnchor::new(state.latest, expiry))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> CheckoutResult<bool> {
        let state = self.lock();
        Ok(matches!(state.blockhashes.get(blockhash), Some(h) if state.block_height <= *h))
    }

    async fn block_height(&self) -> CheckoutResult<u64> {
        Ok(self.lock().block_height)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> CheckoutResult<u64> {
        Ok(self.lock().rent.minimum_balance(data_len))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> CheckoutResult<Signature> {
        let mut state = self.lock();
        state.send_attempts += 1;

        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(CheckoutError::ChainRpc("node is behind (simulated)".to_string()));
        }

        let blockhash = transaction.message.recent_blockhash;
        let live = matches!(state.blockhashes.get(&blockhash), Some(h) if state.block_height <= *h);
        if !live {
            return Err(CheckoutError::ChainRejected("Blockhash not found".to_string()));
        }
        transaction
            .verify()
            .map_err(|e| {
                CheckoutError::ChainRejected(format!("signature verification failed: {}", e))
            })?;

        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| {
                CheckoutError::ChainRejected("transaction has no signatures".to_string())
            })?;
        if state.statuses.contains_key(&signature) {
            return Err(CheckoutError::ChainRejected(
                "This transaction has already been processed".to_string(),
            ));
        }

        // All-or-nothing: work on a copy and commit only on success.
        let mut accounts = state.accounts.clone();
        Self::apply(&mut accounts, transaction)
            .map_err(|e| {
                CheckoutError::ChainRejected(format!("Transaction simulation failed: {}", e))
            })?;
        state.accounts = accounts;
        state.statuses.insert(signature, Ok(()));
        state.sent.push(transaction.clone());
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> CheckoutResult<Option<Result<(), String>>> {
        Ok(self.lock().statuses.get(signature).cloned())
    }
}
