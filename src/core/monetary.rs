/// Ledger monetary constants
///
/// There are no fees and no halving: every coinbase mints the same reward.
///
/// Value minted by every coinbase transaction
pub const COINBASE_REWARD: u64 = 100;

/// Memo carried by the genesis coinbase input
pub const GENESIS_DATA: &str = "First Transaction from Genesis";

/// Memo used when a coinbase is built without one
pub fn default_coinbase_memo(to: &str) -> String {
    format!("Coins to {to}")
}
