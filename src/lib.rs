//! # UTXO Ledger
//!
//! A single-operator, append-only ledger of proof-of-work blocks with balances
//! derived from unspent transaction outputs.
//!
//! ## Layout
//! - `core/`: blocks, transactions, the proof-of-work engine and the sled-backed ledger
//! - `storage/`: the UTXO view computed by scanning the chain
//! - `config/`: database path and mining mode settings
//! - `utils/`: SHA-256 and the bincode codec
//! - `cli/`: command-line argument definitions
//!
//! ## Things to keep in mind
//! - Ownership is a plaintext match between an input's unlock token and an
//!   output's owner key. Nothing is signed.
//! - Difficulty is fixed. Every block must hash below `2^(255 - DIFFICULTY)`.
//! - The ledger assumes a single writer. Appends re-check the tip inside a
//!   store transaction and fail rather than overwrite a concurrent append.
//! - Balances are recomputed from the whole chain on each query.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, Settings, GLOBAL_CONFIG};
pub use crate::core::{
    Block, Ledger, LedgerIterator, MiningMode, ProofOfWork, TXInput, TXOutput, Transaction,
    COINBASE_REWARD, DIFFICULTY,
};
pub use error::{BlockchainError, Result};
pub use storage::{UTXOSet, UnspentTransaction};
pub use utils::{deserialize, serialize, sha256_digest};
