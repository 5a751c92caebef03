use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "utxo-ledger")]
pub struct Opt {
    #[arg(
        long = "db-path",
        global = true,
        help = "Ledger database directory (overrides config and LEDGER_DB_PATH)"
    )]
    pub db_path: Option<PathBuf>,
    #[arg(long, global = true, help = "Search nonces on all cores")]
    pub parallel: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        name = "createblockchain",
        about = "Create the ledger and send the genesis reward to ADDRESS"
    )]
    Createblockchain {
        #[arg(help = "The address to send genesis block reward to")]
        address: String,
    },
    #[command(name = "getbalance", about = "Get the balance of the target address")]
    GetBalance {
        #[arg(help = "The address to get balance for")]
        address: String,
    },
    #[command(name = "send", about = "Send coins between addresses in a new block")]
    Send {
        #[arg(help = "Source address")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
    },
    #[command(name = "printchain", about = "Print all blocks from tip to genesis")]
    Printchain,
    #[command(
        name = "validatechain",
        about = "Check linkage and proof-of-work of every block"
    )]
    Validatechain,
}
