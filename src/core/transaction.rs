// Transactions move value by consuming earlier outputs and creating new ones.
// Ownership is a plain string: an input unlocks an output when its unlock token
// equals the output's owner key. There are no signatures.

use crate::core::monetary::{default_coinbase_memo, COINBASE_REWARD};
use crate::core::Ledger;
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use crate::utils::{deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Output index carried by the single input of a coinbase transaction
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

// A reference to an earlier output plus the token claiming it
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TXInput {
    txid: Vec<u8>,     // Transaction holding the output being spent
    vout: i64,         // Index of that output, -1 for coinbase
    signature: String, // Unlock token, compared verbatim with the owner key
}

impl TXInput {
    pub fn new(txid: &[u8], vout: i64, signature: &str) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: signature.to_string(),
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> i64 {
        self.vout
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }

    pub fn can_unlock(&self, data: &str) -> bool {
        self.signature == data
    }
}

// Value locked to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TXOutput {
    value: u64,
    pub_key: String, // Owner address, opaque to the ledger
}

impl TXOutput {
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        if value == 0 {
            return Err(BlockchainError::Transaction(
                "Transaction value must be positive".to_string(),
            ));
        }
        if address.is_empty() {
            return Err(BlockchainError::Transaction(
                "Output address must not be empty".to_string(),
            ));
        }

        Ok(TXOutput {
            value,
            pub_key: address.to_string(),
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key(&self) -> &str {
        self.pub_key.as_str()
    }

    pub fn can_be_unlocked(&self, data: &str) -> bool {
        self.pub_key == data
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,         // SHA-256 of the encoded transaction with an empty id
    vin: Vec<TXInput>,   // What is being spent
    vout: Vec<TXOutput>, // Where the value goes
}

impl Transaction {
    /// Mint the fixed reward to `to`. An empty `data` gets a default memo.
    pub fn new_coinbase_tx(to: &str, data: &str) -> Result<Transaction> {
        let memo = if data.is_empty() {
            default_coinbase_memo(to)
        } else {
            data.to_string()
        };

        let txout = TXOutput::new(COINBASE_REWARD, to)?;
        let tx_input = TXInput::new(&[], COINBASE_OUTPUT_INDEX, &memo);

        let mut tx = Transaction {
            id: vec![],
            vin: vec![tx_input],
            vout: vec![txout],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Pay `amount` from `from` to `to` out of the outputs `from` can spend.
    ///
    /// Any surplus from the selected outputs comes back to `from` as a second
    /// output.
    pub fn new_utxo_transaction(
        from: &str,
        to: &str,
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }
        if from.is_empty() || to.is_empty() {
            return Err(BlockchainError::Transaction(
                "Sender and recipient addresses must not be empty".to_string(),
            ));
        }

        let (accumulated, valid_outputs) = utxo_set.find_spendable_outputs(from, amount)?;
        if accumulated < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut inputs = vec![];
        for (txid_hex, outs) in valid_outputs {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                BlockchainError::Transaction(format!("Invalid transaction ID: {e}"))
            })?;
            for out in outs {
                let vout = i64::try_from(out).map_err(|_| {
                    BlockchainError::Transaction(format!("Output index {out} out of range"))
                })?;
                inputs.push(TXInput::new(txid.as_slice(), vout, from));
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            outputs.push(TXOutput::new(accumulated - amount, from)?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Check this transaction against the chain it is about to join.
    ///
    /// Every input must point at an existing, unspent output whose owner equals
    /// the input's unlock token, and inputs must balance outputs exactly.
    pub fn verify(&self, ledger: &Ledger) -> Result<()> {
        let txid_hex = HEXLOWER.encode(self.get_id());
        if self.hash()? != self.id {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} does not match its content hash"
            )));
        }
        if self.vout.is_empty() {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} has no outputs"
            )));
        }
        if let Some(out) = self.vout.iter().find(|out| out.get_value() == 0) {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} pays zero to {}",
                out.get_pub_key()
            )));
        }

        if self.is_coinbase() {
            return Ok(());
        }
        if self.vin.is_empty() {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} has no inputs"
            )));
        }

        let mut input_value = 0u64;
        for vin in &self.vin {
            let prev_txid_hex = HEXLOWER.encode(vin.get_txid());
            let prev_tx = ledger.find_transaction(vin.get_txid())?.ok_or_else(|| {
                BlockchainError::Transaction(format!(
                    "Input references unknown transaction {prev_txid_hex}"
                ))
            })?;

            let prev_output = usize::try_from(vin.get_vout())
                .ok()
                .and_then(|idx| prev_tx.vout.get(idx))
                .ok_or_else(|| {
                    BlockchainError::Transaction(format!(
                        "Input references missing output {prev_txid_hex}:{}",
                        vin.get_vout()
                    ))
                })?;

            if !prev_output.can_be_unlocked(vin.get_signature()) {
                return Err(BlockchainError::Transaction(format!(
                    "Input {prev_txid_hex}:{} is not unlocked by '{}'",
                    vin.get_vout(),
                    vin.get_signature()
                )));
            }

            if ledger.is_output_spent(vin.get_txid(), vin.get_vout())? {
                return Err(BlockchainError::Transaction(format!(
                    "Input already spent: {prev_txid_hex}:{}",
                    vin.get_vout()
                )));
            }

            input_value = input_value
                .checked_add(prev_output.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Input value overflow".to_string()))?;
        }

        let output_value = self.get_output_value()?;
        if input_value != output_value {
            return Err(BlockchainError::Transaction(format!(
                "Transaction {txid_hex} does not balance: inputs={input_value}, outputs={output_value}"
            )));
        }

        Ok(())
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1
            && self.vin[0].txid.is_empty()
            && self.vin[0].vout == COINBASE_OUTPUT_INDEX
    }

    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for vout in &self.vout {
            total = total
                .checked_add(vout.get_value())
                .ok_or_else(|| BlockchainError::Transaction("Output value overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }

    /// Assemble a transaction from raw parts, with its id computed (for testing only)
    #[cfg(test)]
    pub fn new_test_transaction(vin: Vec<TXInput>, vout: Vec<TXOutput>) -> Transaction {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash().unwrap();
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{create_test_ledger, genesis_transaction, pay};

    #[test]
    fn test_coinbase_structure() {
        let tx = Transaction::new_coinbase_tx("alice", "").unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.get_vin()[0].get_signature(), "Coins to alice");
        assert_eq!(tx.get_vin()[0].get_vout(), COINBASE_OUTPUT_INDEX);
        assert_eq!(tx.get_vout().len(), 1);
        assert_eq!(tx.get_vout()[0].get_value(), COINBASE_REWARD);
        assert!(tx.get_vout()[0].can_be_unlocked("alice"));
        assert_eq!(tx.get_id().len(), 32);
    }

    #[test]
    fn test_coinbase_keeps_explicit_memo() {
        let tx = Transaction::new_coinbase_tx("alice", "hello").unwrap();
        assert_eq!(tx.get_vin()[0].get_signature(), "hello");
    }

    #[test]
    fn test_id_is_content_hash() {
        let a = Transaction::new_coinbase_tx("alice", "").unwrap();
        let b = Transaction::new_coinbase_tx("bob", "").unwrap();

        assert_ne!(a.get_id(), b.get_id());
        assert_eq!(a.hash().unwrap(), a.get_id());
    }

    #[test]
    fn test_non_coinbase_shapes() {
        let two_inputs = Transaction::new_test_transaction(
            vec![
                TXInput::new(&[], COINBASE_OUTPUT_INDEX, "x"),
                TXInput::new(&[], COINBASE_OUTPUT_INDEX, "y"),
            ],
            vec![TXOutput::new(1, "x").unwrap()],
        );
        let real_index = Transaction::new_test_transaction(
            vec![TXInput::new(&[], 0, "x")],
            vec![TXOutput::new(1, "x").unwrap()],
        );

        assert!(!two_inputs.is_coinbase());
        assert!(!real_index.is_coinbase());
    }

    #[test]
    fn test_zero_value_output_rejected() {
        assert!(matches!(
            TXOutput::new(0, "alice"),
            Err(BlockchainError::Transaction(_))
        ));
    }

    #[test]
    fn test_payment_with_change() {
        let (ledger, _dir) = create_test_ledger("alice");
        let utxo_set = UTXOSet::new(&ledger);

        let tx = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();

        assert!(!tx.is_coinbase());
        assert_eq!(tx.get_vin().len(), 1);
        assert!(tx.get_vin()[0].can_unlock("alice"));
        assert_eq!(tx.get_vout().len(), 2);
        assert_eq!(tx.get_vout()[0].get_value(), 30);
        assert!(tx.get_vout()[0].can_be_unlocked("bob"));
        assert_eq!(tx.get_vout()[1].get_value(), 70);
        assert!(tx.get_vout()[1].can_be_unlocked("alice"));
        assert!(tx.verify(&ledger).is_ok());
    }

    #[test]
    fn test_exact_payment_has_no_change() {
        let (ledger, _dir) = create_test_ledger("alice");
        let utxo_set = UTXOSet::new(&ledger);

        let tx = Transaction::new_utxo_transaction("alice", "bob", 100, &utxo_set).unwrap();

        assert_eq!(tx.get_vout().len(), 1);
        assert_eq!(tx.get_output_value().unwrap(), 100);
    }

    #[test]
    fn test_insufficient_funds() {
        let (ledger, _dir) = create_test_ledger("alice");
        let utxo_set = UTXOSet::new(&ledger);

        let result = Transaction::new_utxo_transaction("alice", "bob", 101, &utxo_set);
        assert_eq!(
            result.unwrap_err(),
            BlockchainError::InsufficientFunds {
                required: 101,
                available: 100
            }
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (ledger, _dir) = create_test_ledger("alice");
        let utxo_set = UTXOSet::new(&ledger);

        let result = Transaction::new_utxo_transaction("alice", "bob", 0, &utxo_set);
        assert!(matches!(result, Err(BlockchainError::Transaction(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_unlock_token() {
        let (ledger, _dir) = create_test_ledger("alice");
        let genesis_tx = genesis_transaction(&ledger);

        let forged = Transaction::new_test_transaction(
            vec![TXInput::new(genesis_tx.get_id(), 0, "mallory")],
            vec![TXOutput::new(100, "mallory").unwrap()],
        );

        let err = forged.verify(&ledger).unwrap_err();
        assert!(err.to_string().contains("not unlocked by 'mallory'"));
    }

    #[test]
    fn test_verify_rejects_unknown_source_transaction() {
        let (ledger, _dir) = create_test_ledger("alice");

        let dangling = Transaction::new_test_transaction(
            vec![TXInput::new(&[9u8; 32], 0, "alice")],
            vec![TXOutput::new(5, "dave").unwrap()],
        );

        let err = dangling.verify(&ledger).unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::Transaction(ref msg)
                if msg.starts_with("Input references unknown transaction")
        ));
        assert!(ledger.mine_block(&[dangling]).is_err());
        assert_eq!(ledger.chain_length().unwrap(), 1);
    }

    #[test]
    fn test_verify_rejects_unbalanced_transaction() {
        let (ledger, _dir) = create_test_ledger("alice");
        let genesis_tx = genesis_transaction(&ledger);

        let inflated = Transaction::new_test_transaction(
            vec![TXInput::new(genesis_tx.get_id(), 0, "alice")],
            vec![TXOutput::new(150, "alice").unwrap()],
        );

        let err = inflated.verify(&ledger).unwrap_err();
        assert!(err.to_string().contains("does not balance"));
    }

    #[test]
    fn test_verify_rejects_spent_output() {
        let (ledger, _dir) = create_test_ledger("alice");
        let genesis_tx = genesis_transaction(&ledger);
        pay(&ledger, "alice", "bob", 30).unwrap();

        let replay = Transaction::new_test_transaction(
            vec![TXInput::new(genesis_tx.get_id(), 0, "alice")],
            vec![TXOutput::new(100, "carol").unwrap()],
        );

        let err = replay.verify(&ledger).unwrap_err();
        assert!(err.to_string().contains("already spent"));
    }

    #[test]
    fn test_verify_rejects_tampered_id() {
        let (ledger, _dir) = create_test_ledger("alice");
        let utxo_set = UTXOSet::new(&ledger);
        let mut tx = Transaction::new_utxo_transaction("alice", "bob", 30, &utxo_set).unwrap();
        tx.vout[0] = TXOutput::new(31, "bob").unwrap();

        assert!(tx.verify(&ledger).is_err());
    }

    #[test]
    fn test_transaction_roundtrip() {
        let tx = Transaction::new_coinbase_tx("alice", "").unwrap();
        let decoded = Transaction::deserialize(&tx.serialize().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }
}
