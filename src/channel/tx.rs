//! Channel transaction builders, signing and engine validation
//!
//! Closure and refund transactions are pure functions of the shared state:
//! identical states yield byte-identical transactions on both sides, which
//! is what lets the receiver reconstruct exactly the transaction the sender
//! signed.
//!
//! Signature validation does not verify an ECDSA signature against a
//! reconstructed sighash. Instead it executes the real bitcoin script
//! interpreter (libbitcoinconsensus) against the P2SH scriptPubKey of the
//! funding output, so the receiver accepts exactly the set of transactions
//! the network will accept.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, Script, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::channel::script;
use crate::channel::state::SharedState;
use crate::errors::ChannelError;

/// Builds the version-2 skeleton spending the funding output
///
/// One input, no outputs, no signatures yet. Version 2 is required for
/// BIP68/BIP112 relative lock-time semantics on the refund path.
pub fn spend_funding_tx(state: &SharedState) -> Result<Transaction, ChannelError> {
    let input = TxIn {
        previous_output: state.funding_outpoint()?,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    };

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![input],
        output: Vec::new(),
    })
}

/// Builds the unsigned closure transaction for the given balance
///
/// Pays `balance` to the P2PKH of the receiver's key and
/// `funding_amount - balance - fee` to the P2PKH of the sender's key.
/// Outputs are appended only for amounts strictly greater than zero, in
/// deterministic order: receiver first, sender second.
///
/// # Errors
/// * [`ChannelError::InsufficientCapacity`] - if `balance + fee` exceeds the
///   funding amount
pub fn closure_tx(state: &SharedState, balance: u64) -> Result<Transaction, ChannelError> {
    let (sender, receiver) = state.keys()?;

    let sender_amount = state
        .funding_amount
        .checked_sub(balance)
        .and_then(|rest| rest.checked_sub(state.fee))
        .ok_or(ChannelError::InsufficientCapacity {
            balance,
            amount: 0,
            fee: state.fee,
            funding: state.funding_amount,
        })?;

    let mut tx = spend_funding_tx(state)?;
    if balance > 0 {
        tx.output.push(TxOut {
            value: Amount::from_sat(balance),
            script_pubkey: ScriptBuf::new_p2pkh(&receiver.pubkey_hash()),
        });
    }
    if sender_amount > 0 {
        tx.output.push(TxOut {
            value: Amount::from_sat(sender_amount),
            script_pubkey: ScriptBuf::new_p2pkh(&sender.pubkey_hash()),
        });
    }
    Ok(tx)
}

/// Signs input 0 of a funding spend with SigHashAll
///
/// Returns the DER-encoded signature with the sighash-type byte appended,
/// ready to be pushed into a scriptSig. The redeem script is the script
/// code, as required for P2SH spends.
fn sign_input(
    tx: &Transaction,
    redeem: &Script,
    secret_key: &SecretKey,
) -> Result<Vec<u8>, ChannelError> {
    let mut cache = SighashCache::new(tx);
    let sighash = cache
        .legacy_signature_hash(0, redeem, EcdsaSighashType::All.to_u32())
        .map_err(|e| ChannelError::Sighash(e.to_string()))?;

    let secp = Secp256k1::new();
    let message = Message::from_digest(sighash.to_byte_array());
    let signature = secp.sign_ecdsa(&message, secret_key);

    let mut bytes = signature.serialize_der().to_vec();
    bytes.push(EcdsaSighashType::All.to_u32() as u8);
    Ok(bytes)
}

/// Signs the closure transaction for the given balance
///
/// Both parties use this over the same reconstructed transaction: the sender
/// to authorize a payment, the receiver to produce its half of the
/// cooperative spend.
pub fn sign_closure(
    state: &SharedState,
    balance: u64,
    secret_key: &SecretKey,
) -> Result<Vec<u8>, ChannelError> {
    let (sender, receiver) = state.keys()?;
    let redeem = script::funding_script(sender, receiver, state.timeout);
    let tx = closure_tx(state, balance)?;
    sign_input(&tx, &redeem, secret_key)
}

/// Assembles and serializes the fully signed closure transaction
pub fn closure_tx_signed(
    state: &SharedState,
    balance: u64,
    sender_sig: &[u8],
    receiver_sig: &[u8],
) -> Result<Vec<u8>, ChannelError> {
    let (sender, receiver) = state.keys()?;
    let redeem = script::funding_script(sender, receiver, state.timeout);

    let mut tx = closure_tx(state, balance)?;
    tx.input[0].script_sig = script::closure_script_sig(sender_sig, receiver_sig, &redeem)?;
    Ok(encode::serialize(&tx))
}

/// Builds the unsigned refund transaction
///
/// Pays `funding_amount - fee` back to the P2PKH of the sender's key and
/// sets the input's relative lock to the channel timeout, so the ELSE branch
/// only becomes spendable `timeout` blocks after the funding confirmed.
pub fn refund_tx(state: &SharedState) -> Result<Transaction, ChannelError> {
    let (sender, _) = state.keys()?;

    let amount = state
        .funding_amount
        .checked_sub(state.fee)
        .ok_or(ChannelError::FundingTooLow { funding: state.funding_amount, fee: state.fee })?;

    let mut tx = spend_funding_tx(state)?;
    tx.output.push(TxOut {
        value: Amount::from_sat(amount),
        script_pubkey: ScriptBuf::new_p2pkh(&sender.pubkey_hash()),
    });
    tx.input[0].sequence = Sequence::from_consensus(u32::from(state.timeout));
    Ok(tx)
}

/// Builds, signs and serializes the sender's refund transaction
///
/// Broadcast remains gated by the CSV timeout; the transaction is valid
/// script-wise as soon as it is built.
pub fn refund_tx_signed(
    state: &SharedState,
    secret_key: &SecretKey,
) -> Result<Vec<u8>, ChannelError> {
    let (sender, receiver) = state.keys()?;
    let (sender, receiver) = (*sender, *receiver);
    let redeem = script::funding_script(&sender, &receiver, state.timeout);

    let mut tx = refund_tx(state)?;
    let sig = sign_input(&tx, &redeem, secret_key)?;
    tx.input[0].script_sig = script::refund_script_sig(&sig, &sender, &redeem)?;
    Ok(encode::serialize(&tx))
}

/// Validates a raw spend of the funding output through the script engine
///
/// Deserializes the transaction, requires exactly one input and executes the
/// consensus script interpreter against the P2SH scriptPubKey of the funding
/// output. Any engine rejection maps to
/// [`ChannelError::InvalidSignature`] - this is the single authoritative
/// signature check on the receiver side.
pub fn validate_spend(state: &SharedState, raw: &[u8]) -> Result<(), ChannelError> {
    let (sender, receiver) = state.keys()?;
    let redeem = script::funding_script(sender, receiver, state.timeout);
    let pk_script = ScriptBuf::new_p2sh(&redeem.script_hash());

    let tx: Transaction =
        encode::deserialize(raw).map_err(|e| ChannelError::TxDecode(e.to_string()))?;
    if tx.input.len() != 1 {
        return Err(ChannelError::WrongInputCount);
    }

    let outpoint = state.funding_outpoint()?;
    let spent =
        TxOut { value: Amount::from_sat(state.funding_amount), script_pubkey: pk_script };

    tx.verify(|point| if *point == outpoint { Some(spent.clone()) } else { None })
        .map_err(|_| ChannelError::InvalidSignature)
}
