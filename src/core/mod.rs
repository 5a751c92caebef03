//! Core ledger functionality
//!
//! Blocks, transactions, the proof-of-work engine and the persistent ledger
//! that chains them together.

pub mod block;
pub mod ledger;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use ledger::{Ledger, LedgerIterator};
pub use monetary::{COINBASE_REWARD, GENESIS_DATA};
pub use proof_of_work::{MiningMode, ProofOfWork, DIFFICULTY};
pub use transaction::{TXInput, TXOutput, Transaction, COINBASE_OUTPUT_INDEX};
