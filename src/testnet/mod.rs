//! Test helpers shared by the unit tests
//!
//! Every helper works on a throwaway sled directory, so tests can run in
//! parallel without sharing state.

pub mod test_utils;

pub use test_utils::*;
