use crate::core::{MiningMode, ProofOfWork, Transaction};
use crate::error::Result;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    hash: Vec<u8>,
    pre_block_hash: Vec<u8>, // empty only for genesis
    transactions: Vec<Transaction>,
    nonce: i64,
}

impl Block {
    /// Build a block on top of `pre_block_hash` and mine it. Hash and nonce are
    /// fixed from here on.
    pub fn new_block(
        pre_block_hash: Vec<u8>,
        transactions: &[Transaction],
        mode: MiningMode,
    ) -> Block {
        let mut block = Block {
            hash: vec![],
            pre_block_hash,
            transactions: transactions.to_vec(),
            nonce: 0,
        };

        let (nonce, hash) = ProofOfWork::new_proof_of_work(&block).run(mode);
        block.nonce = nonce;
        block.hash = hash;
        info!(
            "Proof-of-work completed for block {} ({} transactions, nonce {nonce})",
            HEXLOWER.encode(block.hash.as_slice()),
            block.transactions.len()
        );

        block
    }

    pub fn generate_genesis_block(transaction: &Transaction, mode: MiningMode) -> Block {
        Block::new_block(vec![], &[transaction.clone()], mode)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// SHA-256 over the concatenated transaction IDs
    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut txhashs = vec![];
        for transaction in &self.transactions {
            txhashs.extend(transaction.get_id());
        }

        sha256_digest(txhashs.as_slice())
    }

    /// Assemble a block from raw parts without mining (for testing only)
    #[cfg(test)]
    pub fn new_test_block(
        hash: Vec<u8>,
        pre_block_hash: Vec<u8>,
        transactions: &[Transaction],
        nonce: i64,
    ) -> Block {
        Block {
            hash,
            pre_block_hash,
            transactions: transactions.to_vec(),
            nonce,
        }
    }
}
