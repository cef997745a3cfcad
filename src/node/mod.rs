//! Bitcoin node client contract
//!
//! The orchestrator only needs three things from a bitcoin node: UTXO
//! lookup, the height of a named block and raw-transaction broadcast.
//! Embedders bind these to their RPC client of choice; tests script a fake.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, BlockHash, Txid};

use crate::errors::NodeError;

/// One unspent transaction output as reported by the node
///
/// Mirrors the shape of a `gettxout` response: the value comes back as a
/// BTC decimal and is converted to satoshis at the consumer with
/// [`btc_to_sats`].
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutInfo {
    /// Output value in BTC
    pub value: f64,
    /// Confirmations of the containing transaction
    pub confirmations: u32,
    /// Tip block hash the confirmation count was computed against
    pub best_block: BlockHash,
    /// Whether the containing transaction is a coinbase
    pub coinbase: bool,
    /// Addresses the output pays to
    pub addresses: Vec<Address<NetworkUnchecked>>,
}

/// The node operations the orchestrator depends on
///
/// Implementations are shared between callers and must tolerate concurrent
/// use.
pub trait BitcoinNode {
    /// Looks up an unspent output, `None` if it does not exist or is spent
    fn get_tx_out(
        &self,
        txid: &Txid,
        vout: u32,
        include_mempool: bool,
    ) -> Result<Option<TxOutInfo>, NodeError>;

    /// Returns the height of the block with the given hash
    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u64, NodeError>;

    /// Broadcasts a raw transaction, returning its txid
    fn send_raw_transaction(&self, raw: &[u8]) -> Result<Txid, NodeError>;
}

impl<T: BitcoinNode + ?Sized> BitcoinNode for &T {
    fn get_tx_out(
        &self,
        txid: &Txid,
        vout: u32,
        include_mempool: bool,
    ) -> Result<Option<TxOutInfo>, NodeError> {
        (**self).get_tx_out(txid, vout, include_mempool)
    }

    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u64, NodeError> {
        (**self).get_block_height(block_hash)
    }

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<Txid, NodeError> {
        (**self).send_raw_transaction(raw)
    }
}

impl<T: BitcoinNode + ?Sized> BitcoinNode for std::sync::Arc<T> {
    fn get_tx_out(
        &self,
        txid: &Txid,
        vout: u32,
        include_mempool: bool,
    ) -> Result<Option<TxOutInfo>, NodeError> {
        (**self).get_tx_out(txid, vout, include_mempool)
    }

    fn get_block_height(&self, block_hash: &BlockHash) -> Result<u64, NodeError> {
        (**self).get_block_height(block_hash)
    }

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<Txid, NodeError> {
        (**self).send_raw_transaction(raw)
    }
}

/// Converts a BTC decimal amount from the RPC interface into satoshis
pub fn btc_to_sats(value: f64) -> u64 {
    (value * 1e8).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_to_sats_rounds() {
        assert_eq!(btc_to_sats(0.01), 1_000_000);
        assert_eq!(btc_to_sats(0.00075), 75_000);
        // 20.00000002 is not representable exactly; rounding must recover it
        assert_eq!(btc_to_sats(20.000_000_02), 2_000_000_002);
        assert_eq!(btc_to_sats(0.0), 0);
    }
}
