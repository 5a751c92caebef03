//! Configuration management
//!
//! Where the ledger lives on disk and how blocks are mined. Values come from
//! defaults, an optional TOML file and environment variables, in that order.

pub mod settings;

pub use settings::{Config, Settings, GLOBAL_CONFIG};
