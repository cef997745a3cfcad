//! Funding script and unlock scripts
//!
//! The channel locks its funding in a P2SH output whose redeem script has
//! two spending paths:
//!
//! ```text
//! IF
//!   2 <senderPubKey> <receiverPubKey> 2 CHECKMULTISIG
//! ELSE
//!   <timeout> CHECKSEQUENCEVERIFY DROP
//!   DUP HASH160 <hash160(senderPubKey)> EQUALVERIFY CHECKSIG
//! ENDIF
//! ```
//!
//! The IF branch is the cooperative close (both signatures). The ELSE branch
//! is the sender's unilateral refund, spendable once the input's relative
//! lock of `timeout` blocks has matured (BIP68/BIP112).

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_CSV, OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY,
    OP_HASH160, OP_IF,
};
use bitcoin::opcodes::{OP_FALSE, OP_TRUE};
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{Address, PublicKey, Script, ScriptBuf};

use crate::channel::state::SharedState;
use crate::errors::ChannelError;

/// Builds the funding redeem script for a channel
///
/// The script is a pure function of the two compressed public keys and the
/// refund timeout, so both parties reconstruct it byte-for-byte.
pub fn funding_script(sender: &PublicKey, receiver: &PublicKey, timeout: u16) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_int(2)
        .push_slice(sender.inner.serialize())
        .push_slice(receiver.inner.serialize())
        .push_int(2)
        .push_opcode(OP_CHECKMULTISIG)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(timeout))
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(sender.pubkey_hash().to_byte_array())
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Returns the channel's redeem script and its P2SH funding address
///
/// # Errors
/// * [`ChannelError::MissingField`] - if either public key is unset
pub fn funding_address(state: &SharedState) -> Result<(ScriptBuf, Address), ChannelError> {
    let (sender, receiver) = state.keys()?;
    let redeem = funding_script(sender, receiver, state.timeout);
    let address =
        Address::p2sh(&redeem, state.net).map_err(|e| ChannelError::Script(e.to_string()))?;
    Ok((redeem, address))
}

fn push_bytes(data: &[u8]) -> Result<PushBytesBuf, ChannelError> {
    PushBytesBuf::try_from(data.to_vec()).map_err(|e| ChannelError::Script(e.to_string()))
}

/// Assembles the scriptSig driving the cooperative IF branch
///
/// Layout: `OP_FALSE <senderSig> <receiverSig> OP_TRUE <redeemScript>`. The
/// leading OP_FALSE is the CHECKMULTISIG dummy element; the OP_TRUE selects
/// the IF branch.
pub fn closure_script_sig(
    sender_sig: &[u8],
    receiver_sig: &[u8],
    redeem: &Script,
) -> Result<ScriptBuf, ChannelError> {
    Ok(Builder::new()
        .push_opcode(OP_FALSE)
        .push_slice(push_bytes(sender_sig)?)
        .push_slice(push_bytes(receiver_sig)?)
        .push_opcode(OP_TRUE)
        .push_slice(push_bytes(redeem.as_bytes())?)
        .into_script())
}

/// Assembles the scriptSig driving the refund ELSE branch
///
/// Layout: `<sig> <senderPubKey> OP_FALSE <redeemScript>`.
pub fn refund_script_sig(
    sig: &[u8],
    sender: &PublicKey,
    redeem: &Script,
) -> Result<ScriptBuf, ChannelError> {
    Ok(Builder::new()
        .push_slice(push_bytes(sig)?)
        .push_slice(sender.inner.serialize())
        .push_opcode(OP_FALSE)
        .push_slice(push_bytes(redeem.as_bytes())?)
        .into_script())
}
