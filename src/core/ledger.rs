// The ledger: an append-only chain of mined blocks in a sled database.
//
// Store layout is flat: the key "lh" holds the tip hash, and every block is
// stored under its own hash. Tip and block are always written in the same sled
// transaction, so the tip never points at a block the store does not have.

use crate::config::GLOBAL_CONFIG;
use crate::core::monetary::GENESIS_DATA;
use crate::core::{Block, MiningMode, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use log::info;
use sled::transaction::{abort, TransactionError, TransactionResult};
use sled::Db;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const TIP_BLOCK_HASH_KEY: &str = "lh";

#[derive(Clone)]
pub struct Ledger {
    tip_hash: Arc<RwLock<Vec<u8>>>, // Last tip this handle observed or wrote
    db: Db,
    db_path: PathBuf,
    mining_mode: MiningMode,
}

enum AppendOutcome {
    Committed,
    TipMoved(Option<Vec<u8>>),
}

impl Ledger {
    /// Open the ledger at the configured path, creating the genesis block for
    /// `genesis_address` if the store is empty.
    pub fn open(genesis_address: &str) -> Result<Ledger> {
        Self::open_with_mode(
            genesis_address,
            GLOBAL_CONFIG.get_db_path(),
            GLOBAL_CONFIG.get_mining_mode(),
        )
    }

    /// Open an already initialized ledger at the configured path.
    pub fn new_ledger() -> Result<Ledger> {
        Ok(Self::new_ledger_with_path(GLOBAL_CONFIG.get_db_path())?
            .with_mining_mode(GLOBAL_CONFIG.get_mining_mode()))
    }

    pub fn open_with_path(genesis_address: &str, db_path: impl AsRef<Path>) -> Result<Ledger> {
        Self::open_with_mode(genesis_address, db_path, MiningMode::default())
    }

    /// Opening is idempotent: an empty store gets a genesis block, an
    /// initialized one is resumed from its tip.
    pub fn open_with_mode(
        genesis_address: &str,
        db_path: impl AsRef<Path>,
        mining_mode: MiningMode,
    ) -> Result<Ledger> {
        let path = db_path.as_ref().to_path_buf();
        let db = Self::open_db(&path)?;

        let tip_hash = match Self::read_tip(&db)? {
            Some(tip_hash) => tip_hash,
            None => Self::initialize(&db, genesis_address, mining_mode)?,
        };

        Ok(Ledger {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            db,
            db_path: path,
            mining_mode,
        })
    }

    pub fn new_ledger_with_path(db_path: impl AsRef<Path>) -> Result<Ledger> {
        let path = db_path.as_ref().to_path_buf();
        let db = Self::open_db(&path)?;

        let tip_hash = Self::read_tip(&db)?.ok_or_else(|| {
            BlockchainError::Database(format!(
                "No existing ledger found at {}. Create one first.",
                path.display()
            ))
        })?;

        Ok(Ledger {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            db,
            db_path: path,
            mining_mode: MiningMode::default(),
        })
    }

    pub fn with_mining_mode(mut self, mining_mode: MiningMode) -> Ledger {
        self.mining_mode = mining_mode;
        self
    }

    fn open_db(path: &Path) -> Result<Db> {
        sled::open(path).map_err(|e| {
            BlockchainError::Database(format!("Failed to open database {}: {e}", path.display()))
        })
    }

    fn initialize(db: &Db, genesis_address: &str, mining_mode: MiningMode) -> Result<Vec<u8>> {
        info!("Creating genesis block for address: {genesis_address}");
        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address, GENESIS_DATA)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx, mining_mode);

        match Self::compare_and_append(db, None, &genesis)? {
            AppendOutcome::Committed => {
                db.flush()?;
                info!("Genesis proved: {}", HEXLOWER.encode(genesis.get_hash()));
                Ok(genesis.get_hash().to_vec())
            }
            // Someone else initialized the store first; theirs stands.
            AppendOutcome::TipMoved(Some(existing)) => Ok(existing),
            AppendOutcome::TipMoved(None) => Err(BlockchainError::Database(
                "Tip vanished while creating the genesis block".to_string(),
            )),
        }
    }

    // Reads the tip and confirms its block is present in one snapshot.
    fn read_tip(db: &Db) -> Result<Option<Vec<u8>>> {
        let result: TransactionResult<Option<Vec<u8>>, BlockchainError> =
            db.transaction(|tx_db| {
                let Some(tip) = tx_db.get(TIP_BLOCK_HASH_KEY)? else {
                    return Ok(None);
                };
                if tx_db.get(&tip[..])?.is_none() {
                    return abort(BlockchainError::Database(format!(
                        "Tip block {} missing from store",
                        HEXLOWER.encode(&tip)
                    )));
                }
                Ok(Some(tip.to_vec()))
            });
        result.map_err(Self::transaction_error)
    }

    // Stores the block and moves the tip to it, provided the tip still equals
    // `expected_tip`. Both writes land together or not at all.
    fn compare_and_append(
        db: &Db,
        expected_tip: Option<&[u8]>,
        block: &Block,
    ) -> Result<AppendOutcome> {
        let block_data = block.serialize()?;

        let result: TransactionResult<AppendOutcome, BlockchainError> =
            db.transaction(|tx_db| {
                let current = tx_db.get(TIP_BLOCK_HASH_KEY)?;
                if current.as_deref() != expected_tip {
                    return Ok(AppendOutcome::TipMoved(current.map(|tip| tip.to_vec())));
                }
                tx_db.insert(block.get_hash(), block_data.as_slice())?;
                tx_db.insert(TIP_BLOCK_HASH_KEY, block.get_hash())?;
                Ok(AppendOutcome::Committed)
            });
        result.map_err(Self::transaction_error)
    }

    fn transaction_error(err: TransactionError<BlockchainError>) -> BlockchainError {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => {
                BlockchainError::Database(format!("Store transaction failed: {e}"))
            }
        }
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn get_mining_mode(&self) -> MiningMode {
        self.mining_mode
    }

    pub fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash
            .read()
            .expect("Failed to acquire read lock on tip_hash - this should never happen")
            .clone()
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self
            .tip_hash
            .write()
            .expect("Failed to acquire write lock on tip_hash - this should never happen");
        *tip_hash = new_tip_hash.to_vec()
    }

    /// Verify `transactions`, mine them into a block on the current tip and
    /// persist it.
    ///
    /// There must be no concurrent appender. If the tip moves while mining, the
    /// new block is discarded and the store is left untouched.
    ///
    /// Coinbase transactions passed in are trusted as-is; their minted value is
    /// not checked against `COINBASE_REWARD`.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        for transaction in transactions {
            transaction.verify(self)?;
        }
        Self::check_for_double_spending(transactions)?;

        let tip_hash = Self::read_tip(&self.db)?
            .ok_or_else(|| BlockchainError::Database("Ledger has no tip".to_string()))?;

        info!(
            "Mining block on {} with {} transactions",
            HEXLOWER.encode(&tip_hash),
            transactions.len()
        );
        let block = Block::new_block(tip_hash.clone(), transactions, self.mining_mode);

        match Self::compare_and_append(&self.db, Some(tip_hash.as_slice()), &block)? {
            AppendOutcome::Committed => {}
            AppendOutcome::TipMoved(current) => {
                return Err(BlockchainError::Database(format!(
                    "Tip moved from {} to {} while mining; block discarded",
                    HEXLOWER.encode(&tip_hash),
                    current.map_or("nothing".to_string(), |tip| HEXLOWER.encode(&tip))
                )));
            }
        }
        self.db.flush()?;
        self.set_tip_hash(block.get_hash());

        info!(
            "Successfully mined block: {}",
            HEXLOWER.encode(block.get_hash())
        );
        Ok(block)
    }

    /// Walk the chain from the current tip back to genesis.
    pub fn iterator(&self) -> Result<LedgerIterator> {
        let tip_hash = Self::read_tip(&self.db)?
            .ok_or_else(|| BlockchainError::Database("Ledger has no tip".to_string()))?;
        self.set_tip_hash(&tip_hash);
        Ok(LedgerIterator::new(tip_hash, self.db.clone()))
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        load_block(&self.db, block_hash)
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iterator()? {
            let block = block?;
            if let Some(transaction) = block
                .get_transactions()
                .iter()
                .find(|transaction| transaction.get_id() == txid)
            {
                return Ok(Some(transaction.clone()));
            }
        }
        Ok(None)
    }

    pub fn is_output_spent(&self, txid: &[u8], vout: i64) -> Result<bool> {
        for block in self.iterator()? {
            let block = block?;
            for transaction in block.get_transactions() {
                if transaction.is_coinbase() {
                    continue;
                }
                if transaction
                    .get_vin()
                    .iter()
                    .any(|input| input.get_txid() == txid && input.get_vout() == vout)
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Number of blocks from tip to genesis inclusive
    pub fn chain_length(&self) -> Result<usize> {
        let mut length = 0;
        for block in self.iterator()? {
            block?;
            length += 1;
        }
        Ok(length)
    }

    /// Audit every block: stored under its own hash, linked to its parent and
    /// carrying a valid proof-of-work. Returns the number of blocks checked.
    pub fn validate_chain(&self) -> Result<usize> {
        let iterator = self.iterator()?;
        let mut expected_hash = iterator.current_hash.clone().unwrap_or_default();
        let mut checked = 0;

        for block in iterator {
            let block = block?;
            let hash_hex = HEXLOWER.encode(block.get_hash());
            if block.get_hash() != expected_hash.as_slice() {
                return Err(BlockchainError::InvalidBlock(format!(
                    "Block {hash_hex} stored under {}",
                    HEXLOWER.encode(&expected_hash)
                )));
            }
            if !ProofOfWork::validate(&block) {
                return Err(BlockchainError::InvalidBlock(format!(
                    "Block {hash_hex} fails proof-of-work"
                )));
            }
            expected_hash = block.get_pre_block_hash().to_vec();
            checked += 1;
        }
        Ok(checked)
    }

    // One output may be spent by at most one input across the whole batch
    fn check_for_double_spending(transactions: &[Transaction]) -> Result<()> {
        let mut spent_outputs: HashSet<(Vec<u8>, i64)> = HashSet::new();

        for (tx_index, transaction) in transactions.iter().enumerate() {
            if transaction.is_coinbase() {
                continue;
            }

            for input in transaction.get_vin() {
                let output_reference = (input.get_txid().to_vec(), input.get_vout());
                if !spent_outputs.insert(output_reference) {
                    return Err(BlockchainError::Transaction(format!(
                        "Double-spending detected in transaction {}: output {}:{} already spent in this block",
                        tx_index,
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn load_block(db: &Db, block_hash: &[u8]) -> Result<Option<Block>> {
    let Some(data) = db.get(block_hash).map_err(|e| {
        BlockchainError::Database(format!(
            "Failed to read block {}: {e}",
            HEXLOWER.encode(block_hash)
        ))
    })?
    else {
        return Ok(None);
    };

    Block::deserialize(data.as_ref())
        .map(Some)
        .map_err(|e| BlockchainError::Decode(format!("Block {}: {e}", HEXLOWER.encode(block_hash))))
}

/// Yields blocks from a starting hash back to genesis, inclusive.
///
/// A block that is missing or fails to decode is yielded as an error and ends
/// the walk, since its parent link cannot be followed.
pub struct LedgerIterator {
    db: Db,
    current_hash: Option<Vec<u8>>,
}

impl LedgerIterator {
    fn new(tip_hash: Vec<u8>, db: Db) -> LedgerIterator {
        LedgerIterator {
            current_hash: Some(tip_hash),
            db,
        }
    }
}

impl Iterator for LedgerIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current_hash.take()?;
        let block = match load_block(&self.db, &hash) {
            Ok(Some(block)) => block,
            Ok(None) => {
                return Some(Err(BlockchainError::Database(format!(
                    "Block {} missing from store",
                    HEXLOWER.encode(&hash)
                ))))
            }
            Err(e) => return Some(Err(e)),
        };
        if !block.is_genesis() {
            self.current_hash = Some(block.get_pre_block_hash().to_vec());
        }
        Some(Ok(block))
    }
}
