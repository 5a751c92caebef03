use crate::core::{Ledger, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use std::collections::{BTreeMap, HashMap};

/// A transaction together with the indices of its outputs that are still
/// unspent (and, for owner-filtered scans, owned by the queried address).
#[derive(Debug, Clone)]
pub struct UnspentTransaction {
    transaction: Transaction,
    outputs: Vec<usize>,
}

impl UnspentTransaction {
    pub fn get_transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn get_unspent_indices(&self) -> &[usize] {
        self.outputs.as_slice()
    }

    pub fn unspent_outputs(&self) -> impl Iterator<Item = (usize, &TXOutput)> + '_ {
        let vout = self.transaction.get_vout();
        self.outputs.iter().map(move |idx| (*idx, &vout[*idx]))
    }
}

/// Derives unspent outputs by scanning the ledger. Nothing is indexed or
/// cached; every query walks the chain from tip to genesis once.
pub struct UTXOSet<'a> {
    ledger: &'a Ledger,
}

impl<'a> UTXOSet<'a> {
    pub fn new(ledger: &'a Ledger) -> UTXOSet<'a> {
        UTXOSet { ledger }
    }

    /// Transactions holding outputs that `address` can spend.
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<UnspentTransaction>> {
        self.scan(Some(address))
    }

    /// Every unspent output on the chain, whoever owns it.
    pub fn find_all_utxo(&self) -> Result<Vec<UnspentTransaction>> {
        self.scan(None)
    }

    // The walk runs newest to oldest, so a spending input is always seen before
    // the output it consumes. Outputs are therefore checked against the spent
    // set before this transaction's own inputs are added to it.
    fn scan(&self, owner: Option<&str>) -> Result<Vec<UnspentTransaction>> {
        let mut unspent = vec![];
        // ( K -> txid_hex, V -> spent output indices )
        let mut spent_txos: HashMap<String, Vec<i64>> = HashMap::new();

        for block in self.ledger.iterator()? {
            let block = block?;
            for tx in block.get_transactions() {
                let txid_hex = HEXLOWER.encode(tx.get_id());
                let spent = spent_txos.get(txid_hex.as_str());

                let mut outputs = vec![];
                for (idx, out) in tx.get_vout().iter().enumerate() {
                    let is_spent = spent.is_some_and(|outs| {
                        outs.iter().any(|spent_idx| usize::try_from(*spent_idx) == Ok(idx))
                    });
                    let is_owned = owner.map_or(true, |address| out.can_be_unlocked(address));
                    if !is_spent && is_owned {
                        outputs.push(idx);
                    }
                }
                if !outputs.is_empty() {
                    unspent.push(UnspentTransaction {
                        transaction: tx.clone(),
                        outputs,
                    });
                }

                if tx.is_coinbase() {
                    continue;
                }
                // Inputs naming a transaction the walk never reaches are simply
                // never matched.
                for txin in tx.get_vin() {
                    spent_txos
                        .entry(HEXLOWER.encode(txin.get_txid()))
                        .or_default()
                        .push(txin.get_vout());
                }
            }
        }
        Ok(unspent)
    }

    pub fn find_utxo(&self, address: &str) -> Result<Vec<TXOutput>> {
        let mut utxos = vec![];
        for unspent in self.find_unspent_transactions(address)? {
            for (_, out) in unspent.unspent_outputs() {
                utxos.push(out.clone());
            }
        }
        Ok(utxos)
    }

    pub fn get_balance(&self, address: &str) -> Result<u64> {
        let mut balance = 0u64;
        for out in self.find_utxo(address)? {
            balance = balance
                .checked_add(out.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Balance overflow".to_string()))?;
        }
        Ok(balance)
    }

    /// Greedily collect outputs of `address` in scan order until they cover
    /// `amount`. The result is not minimal and may fall short; callers compare
    /// the accumulated value against what they need.
    ///
    /// ( K -> txid_hex, V -> output indices )
    pub fn find_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> Result<(u64, BTreeMap<String, Vec<usize>>)> {
        let mut unspent_outputs: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut accumulated = 0u64;

        'work: for unspent in self.find_unspent_transactions(address)? {
            let txid_hex = HEXLOWER.encode(unspent.get_transaction().get_id());
            for (idx, out) in unspent.unspent_outputs() {
                if accumulated >= amount {
                    break 'work;
                }
                accumulated = accumulated.checked_add(out.get_value()).ok_or_else(|| {
                    BlockchainError::Transaction("Spendable value overflow".to_string())
                })?;
                unspent_outputs.entry(txid_hex.clone()).or_default().push(idx);
            }
        }
        Ok((accumulated, unspent_outputs))
    }

    /// Number of transactions that still hold at least one unspent output
    pub fn count_transactions(&self) -> Result<usize> {
        Ok(self.find_all_utxo()?.len())
    }
}
