use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::debug;
use num_bigint::{BigInt, Sign};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ShlAssign;
use std::str::FromStr;

/// Fixed difficulty shared by every block in the chain. There is no retargeting.
pub const DIFFICULTY: u32 = 12;

const MAX_NONCE: i64 = i64::MAX;

/// How the nonce space is searched.
///
/// Both modes return the lowest satisfying nonce, so a block mined either way
/// is byte-for-byte identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    #[default]
    Sequential,
    Parallel,
}

impl FromStr for MiningMode {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(MiningMode::Sequential),
            "parallel" => Ok(MiningMode::Parallel),
            _ => Err(BlockchainError::Config(format!(
                "Invalid mining mode: {s}. Valid options: sequential, parallel"
            ))),
        }
    }
}

impl fmt::Display for MiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningMode::Sequential => write!(f, "sequential"),
            MiningMode::Parallel => write!(f, "parallel"),
        }
    }
}

pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: BigInt,
    transactions_digest: Vec<u8>,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block) -> ProofOfWork<'a> {
        ProofOfWork {
            block,
            target: Self::target(),
            transactions_digest: block.hash_transactions(),
        }
    }

    /// `2^(255 - DIFFICULTY)`
    pub fn target() -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(255 - DIFFICULTY);
        target
    }

    /// Recompute the hash for the block's stored nonce and check it against
    /// both the target and the hash recorded in the block.
    pub fn validate(block: &Block) -> bool {
        let pow = ProofOfWork::new_proof_of_work(block);
        let hash = pow.hash_for(block.get_nonce());
        pow.meets_target(hash.as_slice()) && hash.as_slice() == block.get_hash()
    }

    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let pre_block_hash = self.block.get_pre_block_hash();
        let mut data_bytes = Vec::with_capacity(pre_block_hash.len() + 48);
        data_bytes.extend(pre_block_hash);
        data_bytes.extend(self.transactions_digest.as_slice());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes.extend(i64::from(DIFFICULTY).to_be_bytes());
        data_bytes
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    fn hash_for(&self, nonce: i64) -> Vec<u8> {
        sha256_digest(self.prepare_data(nonce).as_slice())
    }

    pub fn run(&self, mode: MiningMode) -> (i64, Vec<u8>) {
        debug!("Mining the block ({mode})");
        let (nonce, hash) = match mode {
            MiningMode::Sequential => self.run_sequential(),
            MiningMode::Parallel => self.run_parallel(),
        };
        debug!("Found nonce {nonce}: {}", HEXLOWER.encode(hash.as_slice()));
        (nonce, hash)
    }

    fn run_sequential(&self) -> (i64, Vec<u8>) {
        let mut nonce = 0;
        let mut hash = Vec::new();
        while nonce < MAX_NONCE {
            hash = self.hash_for(nonce);
            if self.meets_target(hash.as_slice()) {
                break;
            }
            nonce += 1;
        }
        (nonce, hash)
    }

    // find_first keeps the sequential answer: the lowest satisfying nonce wins
    // no matter which worker reaches it first.
    fn run_parallel(&self) -> (i64, Vec<u8>) {
        let nonce = (0..MAX_NONCE)
            .into_par_iter()
            .find_first(|nonce| self.meets_target(self.hash_for(*nonce).as_slice()))
            .unwrap_or(MAX_NONCE);
        (nonce, self.hash_for(nonce))
    }
}
