//! Request and response models for the hub operations
//!
//! These are the payloads a transport (HTTP, RPC) would carry; the hub
//! itself is transport-agnostic. All models serialize with serde so any
//! framing can be layered on top.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, PublicKey, Txid};
use serde::{Deserialize, Serialize};

use crate::channel::state::Status;
use crate::types::ChannelId;

/// Sender's request to create a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Sender's compressed public key
    pub sender_pubkey: PublicKey,
    /// Address the receiver pays change back to
    pub sender_output: Address<NetworkUnchecked>,
}

/// Everything the sender needs to fund the new channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    /// Channel id
    pub id: ChannelId,
    /// CSV refund timeout in blocks
    pub timeout: u16,
    /// Close fee in satoshis
    pub fee: u64,
    /// Receiver's compressed public key
    pub receiver_pubkey: PublicKey,
    /// Receiver's payout address
    pub receiver_output: Address<NetworkUnchecked>,
    /// P2SH address the sender must pay to fund the channel
    pub funding_address: Address<NetworkUnchecked>,
}

/// Sender's notification that the funding transaction confirmed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    /// Channel id
    pub id: ChannelId,
    /// Funding transaction id
    pub txid: Txid,
    /// Funding output index
    pub vout: u32,
    /// Sender's signature over the zero-balance closure transaction
    pub sender_sig: Vec<u8>,
}

/// Acknowledgement of a successful open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {}

/// Idempotent pre-flight check of a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// Channel id
    pub id: ChannelId,
    /// Opaque payment envelope
    pub payment: Vec<u8>,
    /// Sender's signature over the closure transaction at the new balance
    pub sender_sig: Vec<u8>,
}

/// Combined result of signature and target validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the payment would be accepted as-is
    pub valid: bool,
}

/// A payment to commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Channel id
    pub id: ChannelId,
    /// Opaque payment envelope; appended verbatim to the payment log
    pub payment: Vec<u8>,
    /// Sender's signature over the closure transaction at the new balance
    pub sender_sig: Vec<u8>,
}

/// Acknowledgement of a committed payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {}

/// Request to close the channel at the current balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequest {
    /// Channel id
    pub id: ChannelId,
}

/// The broadcast closure transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResponse {
    /// Raw closure transaction in bitcoin wire format
    pub close_tx: Vec<u8>,
}

/// Read-only status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Channel id
    pub id: ChannelId,
}

/// Snapshot of a channel's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Lifecycle status
    pub status: Status,
    /// Cumulative satoshis owed to the receiver
    pub balance: u64,
    /// Running hash over the committed payment log
    pub payments_hash: [u8; 32],
}
