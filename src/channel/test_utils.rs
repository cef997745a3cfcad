//! Shared test utilities for channel module tests

use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, Network, PublicKey, Txid};

use crate::channel::state::{ChannelParams, SharedState, Status};
use crate::channel::transition::FundingOutput;

/// Channel parameters used throughout the channel tests
pub fn test_params() -> ChannelParams {
    ChannelParams { timeout: 144, fee: 75_000 }
}

/// Deterministically derive a secret key from a single byte (tests only)
fn deterministic_secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("32-byte array should always be a valid SecretKey")
}

/// Deterministic compressed keypair from a single byte
pub fn keypair(byte: u8) -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let sk = deterministic_secret(byte);
    (sk, PublicKey::new(sk.public_key(&secp)))
}

/// The sender's test keypair
pub fn sender_keys() -> (SecretKey, PublicKey) {
    keypair(1)
}

/// The receiver's test keypair
pub fn receiver_keys() -> (SecretKey, PublicKey) {
    keypair(2)
}

/// A regtest P2PKH payout address derived from a single byte
pub fn p2pkh_output(byte: u8) -> Address<NetworkUnchecked> {
    let (_, pk) = keypair(byte);
    Address::p2pkh(pk.pubkey_hash(), Network::Regtest).as_unchecked().clone()
}

/// A fresh state carrying the sender's request fields, not yet accepted
pub fn new_state_with_sender() -> SharedState {
    let (_, sender_pubkey) = sender_keys();
    let mut state = SharedState::new(Network::Regtest, test_params());
    state.sender_pubkey = Some(sender_pubkey);
    state.sender_output = Some(p2pkh_output(11));
    state.receiver_output = Some(p2pkh_output(12));
    state
}

/// A state in `PreInfoGathered`, mirroring both parties' keys
pub fn accepted_state() -> SharedState {
    let (_, receiver_pubkey) = receiver_keys();
    let mut state = new_state_with_sender();
    state.receiver_pubkey = Some(receiver_pubkey);
    state.status = Status::PreInfoGathered;
    state
}

/// A deterministic funding output of the given value
pub fn test_funding(amount: u64) -> FundingOutput {
    FundingOutput { txid: Txid::from_byte_array([5u8; 32]), vout: 1, amount, height: 120 }
}

/// A state in `Open` funded with the given amount
pub fn open_state(funding_amount: u64) -> SharedState {
    let funding = test_funding(funding_amount);
    let mut state = accepted_state();
    state.funding_txid = Some(funding.txid);
    state.funding_vout = funding.vout;
    state.funding_amount = funding.amount;
    state.block_height = funding.height;
    state.status = Status::Open;
    state
}
