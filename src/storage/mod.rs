//! Derived state
//!
//! Views computed from the persisted chain. The UTXO set is rebuilt by a
//! full scan on every query; nothing here writes to the store.

pub mod utxo_set;

pub use utxo_set::{UTXOSet, UnspentTransaction};
