//! Utility functions and helpers
//!
//! Hashing and the binary codec shared by blocks and transactions.

pub mod hashing;
pub mod serialization;

pub use hashing::sha256_digest;

pub use serialization::{deserialize, serialize};
