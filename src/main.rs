// Entry point for the ledger CLI. Each subcommand opens the ledger, does one
// thing and exits; all ledger logic lives in the library.
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, LevelFilter};
use std::process;
use utxo_ledger::{
    Command, Ledger, MiningMode, Opt, ProofOfWork, Transaction, UTXOSet, GLOBAL_CONFIG,
};

fn main() {
    // Info by default, RUST_LOG can still override it
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Some(db_path) = opt.db_path {
        GLOBAL_CONFIG.set_db_path(db_path);
    }
    if opt.parallel {
        GLOBAL_CONFIG.set_mining_mode(MiningMode::Parallel);
    }

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Createblockchain { address } => {
            if address.is_empty() {
                return Err("Address must not be empty".into());
            }
            // Opening an existing ledger just resumes it.
            let ledger = Ledger::open(&address)?;
            println!(
                "Done! Ledger at {}, tip: {}",
                ledger.get_db_path().display(),
                HEXLOWER.encode(ledger.get_tip_hash().as_slice())
            );
        }
        Command::GetBalance { address } => {
            if address.is_empty() {
                return Err("Address must not be empty".into());
            }
            let ledger = Ledger::new_ledger()?;
            let balance = UTXOSet::new(&ledger).get_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send { from, to, amount } => {
            if from.is_empty() || to.is_empty() {
                return Err("Sender and recipient must not be empty".into());
            }
            if amount == 0 {
                return Err("Amount must be positive".into());
            }

            let ledger = Ledger::new_ledger()?;
            let transaction = {
                let utxo_set = UTXOSet::new(&ledger);
                Transaction::new_utxo_transaction(&from, &to, amount, &utxo_set)?
            };
            ledger.mine_block(&[transaction])?;
            println!("Success!");
        }
        Command::Printchain => {
            let ledger = Ledger::new_ledger()?;
            for block in ledger.iterator()? {
                let block = block?;
                println!(
                    "Previous Hash: {}",
                    HEXLOWER.encode(block.get_pre_block_hash())
                );
                println!("Hash: {}", HEXLOWER.encode(block.get_hash()));
                println!("Nonce: {}", block.get_nonce());
                println!("Pow: {}", ProofOfWork::validate(&block));

                for tx in block.get_transactions() {
                    println!("- Transaction {}", HEXLOWER.encode(tx.get_id()));
                    if tx.is_coinbase() {
                        println!("-- Coinbase: {}", tx.get_vin()[0].get_signature());
                    } else {
                        for input in tx.get_vin() {
                            println!(
                                "-- Input txid = {}, vout = {}, from = {}",
                                HEXLOWER.encode(input.get_txid()),
                                input.get_vout(),
                                input.get_signature()
                            );
                        }
                    }
                    for output in tx.get_vout() {
                        println!(
                            "-- Output value = {}, to = {}",
                            output.get_value(),
                            output.get_pub_key()
                        );
                    }
                }
                println!();
            }
        }
        Command::Validatechain => {
            let ledger = Ledger::new_ledger()?;
            let checked = ledger.validate_chain()?;
            println!("Chain is valid: {checked} blocks checked");
        }
    }
    Ok(())
}
