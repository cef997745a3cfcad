//! Shared channel state
//!
//! [`SharedState`] is the single source of truth for a channel. Both roles
//! mirror it: every field that feeds the closure transaction is either fixed
//! at creation or set by a committed transition, so identical states produce
//! byte-identical transactions on both sides.
//!
//! # Invariants
//!
//! - `balance + fee <= funding_amount` whenever the channel is open
//! - `count` strictly increases across committed payments
//! - `status` only ever moves forward through the lifecycle
//! - funding fields are immutable once the channel is open

use bitcoin::address::{AddressType, NetworkUnchecked};
use bitcoin::{Address, Network, OutPoint, PublicKey, Txid};
use serde::{Deserialize, Serialize};

use crate::errors::ChannelError;
use crate::types::{DEFAULT_FEE_SATS, DEFAULT_TIMEOUT_BLOCKS, STATE_VERSION};

/// Channel lifecycle status
///
/// The ordering of the variants is the lifecycle ordering: transitions only
/// ever move to a later status, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// Channel record exists but no keys have been exchanged
    NotStarted,
    /// Keys and payout addresses are known; waiting for funding
    PreInfoGathered,
    /// Funding is confirmed and payments can flow
    Open,
    /// A closure transaction has been produced and may be broadcast
    Closing,
    /// The closure transaction was mined
    Closed,
}

/// Per-channel protocol parameters, fixed at channel creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// CSV refund timeout in blocks
    pub timeout: u16,
    /// Miner fee for the on-chain close, in satoshis
    pub fee: u64,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT_BLOCKS, fee: DEFAULT_FEE_SATS }
    }
}

/// The shared per-channel state mirrored by sender and receiver
///
/// Fields that are unknown until a later transition (`Accept`, `Open`) are
/// optional; the script and transaction layer requires them and reports
/// [`ChannelError::MissingField`] when asked to operate on an incomplete
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    /// Schema version
    pub version: u32,
    /// Bitcoin network the channel runs on
    pub net: Network,
    /// CSV refund timeout in blocks
    pub timeout: u16,
    /// Miner fee for the on-chain spend, in satoshis
    pub fee: u64,
    /// Lifecycle status
    pub status: Status,
    /// Sender's compressed public key
    pub sender_pubkey: Option<PublicKey>,
    /// Receiver's compressed public key
    pub receiver_pubkey: Option<PublicKey>,
    /// Sender's payout address
    pub sender_output: Option<Address<NetworkUnchecked>>,
    /// Receiver's payout address
    pub receiver_output: Option<Address<NetworkUnchecked>>,
    /// Transaction id of the funding UTXO
    pub funding_txid: Option<Txid>,
    /// Output index of the funding UTXO
    pub funding_vout: u32,
    /// Value of the funding UTXO in satoshis
    pub funding_amount: u64,
    /// Height of the block that confirmed the funding transaction
    pub block_height: u64,
    /// Cumulative satoshis owed to the receiver
    pub balance: u64,
    /// Number of committed payments
    pub count: u64,
    /// Most recent sender signature over the closure transaction at `balance`
    pub sender_sig: Vec<u8>,
    /// Running hash over the committed payment log
    pub payments_hash: [u8; 32],
}

impl SharedState {
    /// Creates the initial state for a new channel
    ///
    /// The state starts in [`Status::NotStarted`] with no keys, no funding
    /// and a zero balance; `params` fixes the refund timeout and close fee
    /// for the lifetime of the channel.
    pub fn new(net: Network, params: ChannelParams) -> Self {
        Self {
            version: STATE_VERSION,
            net,
            timeout: params.timeout,
            fee: params.fee,
            status: Status::NotStarted,
            sender_pubkey: None,
            receiver_pubkey: None,
            sender_output: None,
            receiver_output: None,
            funding_txid: None,
            funding_vout: 0,
            funding_amount: 0,
            block_height: 0,
            balance: 0,
            count: 0,
            sender_sig: Vec::new(),
            payments_hash: [0u8; 32],
        }
    }

    /// Validates a payment amount against the remaining channel capacity
    ///
    /// # Returns
    /// The new cumulative balance after the payment.
    ///
    /// # Errors
    /// * [`ChannelError::InvalidAmount`] - if the amount is zero
    /// * [`ChannelError::InsufficientCapacity`] - if `balance + amount + fee`
    ///   would exceed the funding amount
    pub fn validate_amount(&self, amount: u64) -> Result<u64, ChannelError> {
        if amount == 0 {
            return Err(ChannelError::InvalidAmount);
        }

        let capacity_err = ChannelError::InsufficientCapacity {
            balance: self.balance,
            amount,
            fee: self.fee,
            funding: self.funding_amount,
        };

        let new_balance = self.balance.checked_add(amount).ok_or(capacity_err.clone())?;
        let required = new_balance.checked_add(self.fee).ok_or(capacity_err.clone())?;
        if required > self.funding_amount {
            return Err(capacity_err);
        }

        Ok(new_balance)
    }

    /// Returns both channel public keys, failing if either is still unset
    pub fn keys(&self) -> Result<(&PublicKey, &PublicKey), ChannelError> {
        let sender = self.sender_pubkey.as_ref().ok_or(ChannelError::MissingField("sender_pubkey"))?;
        let receiver =
            self.receiver_pubkey.as_ref().ok_or(ChannelError::MissingField("receiver_pubkey"))?;
        Ok((sender, receiver))
    }

    /// Returns the funding outpoint, failing if the channel is not funded
    pub fn funding_outpoint(&self) -> Result<OutPoint, ChannelError> {
        let txid = self.funding_txid.ok_or(ChannelError::MissingField("funding_txid"))?;
        Ok(OutPoint { txid, vout: self.funding_vout })
    }
}

/// Checks that an address is a supported payout type on the given network
///
/// Only P2PKH and P2SH outputs are supported; the address must carry the
/// network's prefix.
///
/// # Returns
/// The network-checked address.
///
/// # Errors
/// * [`ChannelError::WrongNetwork`] - if the address belongs to a different network
/// * [`ChannelError::UnsupportedAddress`] - for any other output type
pub fn check_supported_address(
    net: Network,
    addr: &Address<NetworkUnchecked>,
) -> Result<Address, ChannelError> {
    let checked = addr
        .clone()
        .require_network(net)
        .map_err(|_| ChannelError::WrongNetwork { net })?;

    match checked.address_type() {
        Some(AddressType::P2pkh) | Some(AddressType::P2sh) => Ok(checked),
        _ => Err(ChannelError::UnsupportedAddress),
    }
}
