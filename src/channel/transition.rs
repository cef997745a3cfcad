//! Pure channel state transitions
//!
//! Each transition takes the current [`SharedState`] plus an event and
//! produces the next state, or fails without side effects if a precondition
//! is violated. Keeping the transitions value-returning makes the
//! orchestrator's compare-and-swap snapshots structural: the pre-state it
//! read is never mutated in place.
//!
//! Signature checks are the roles' responsibility: [`apply_open`] and
//! [`apply_send`] record the sender signature they are given and must only
//! be called after it has been validated through the script engine.

use bitcoin::{PublicKey, Txid};
use sha2::{Digest, Sha256};

use crate::channel::state::{check_supported_address, SharedState, Status};
use crate::errors::ChannelError;

/// The confirmed funding UTXO reported by the Open event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingOutput {
    /// Transaction id of the funding transaction
    pub txid: Txid,
    /// Output index of the funding output
    pub vout: u32,
    /// Value of the funding output in satoshis
    pub amount: u64,
    /// Height of the block that confirmed the funding transaction
    pub height: u64,
}

/// Accept transition: `NotStarted` to `PreInfoGathered`
///
/// Validates the sender-provided fields already present on the state (the
/// sender's compressed public key and both payout addresses) and records the
/// receiver's public key.
///
/// # Errors
/// * [`ChannelError::BadStatus`] - if the channel has already been accepted
/// * [`ChannelError::InvalidPublicKey`] - if either key is uncompressed or missing
/// * [`ChannelError::UnsupportedAddress`] / [`ChannelError::WrongNetwork`] -
///   if a payout address is unusable on the channel's network
pub fn apply_accept(
    state: &SharedState,
    receiver_pubkey: PublicKey,
) -> Result<SharedState, ChannelError> {
    if state.status != Status::NotStarted {
        return Err(ChannelError::BadStatus { status: state.status });
    }

    let sender_pubkey =
        state.sender_pubkey.ok_or(ChannelError::MissingField("sender_pubkey"))?;
    if !sender_pubkey.compressed || !receiver_pubkey.compressed {
        return Err(ChannelError::InvalidPublicKey);
    }

    let sender_output =
        state.sender_output.as_ref().ok_or(ChannelError::MissingField("sender_output"))?;
    check_supported_address(state.net, sender_output)?;
    let receiver_output =
        state.receiver_output.as_ref().ok_or(ChannelError::MissingField("receiver_output"))?;
    check_supported_address(state.net, receiver_output)?;

    let mut next = state.clone();
    next.receiver_pubkey = Some(receiver_pubkey);
    next.status = Status::PreInfoGathered;
    Ok(next)
}

/// Open transition: `PreInfoGathered` to `Open`
///
/// Records the confirmed funding UTXO and the sender's signature over the
/// zero-balance closure transaction. The funding fields are immutable from
/// here on.
///
/// # Errors
/// * [`ChannelError::BadStatus`] - if the channel is not waiting for funding
/// * [`ChannelError::FundingTooLow`] - if the funding output cannot cover the
///   close fee
pub fn apply_open(
    state: &SharedState,
    funding: FundingOutput,
    sender_sig: Vec<u8>,
) -> Result<SharedState, ChannelError> {
    if state.status != Status::PreInfoGathered {
        return Err(ChannelError::BadStatus { status: state.status });
    }
    if funding.amount < state.fee {
        return Err(ChannelError::FundingTooLow { funding: funding.amount, fee: state.fee });
    }

    let mut next = state.clone();
    next.funding_txid = Some(funding.txid);
    next.funding_vout = funding.vout;
    next.funding_amount = funding.amount;
    next.block_height = funding.height;
    next.sender_sig = sender_sig;
    next.status = Status::Open;
    Ok(next)
}

/// Send transition: `Open` to `Open` with an incremented balance
///
/// Commits a payment: increments the payment counter, raises the balance and
/// stores the sender's signature over the closure transaction for the new
/// balance. When the payment blob is given, the running payment-log hash is
/// extended with it.
///
/// # Errors
/// * [`ChannelError::BadStatus`] - if the channel is not open
/// * [`ChannelError::InvalidAmount`] / [`ChannelError::InsufficientCapacity`] -
///   from amount validation
pub fn apply_send(
    state: &SharedState,
    amount: u64,
    sender_sig: Vec<u8>,
    payment: Option<&[u8]>,
) -> Result<SharedState, ChannelError> {
    if state.status != Status::Open {
        return Err(ChannelError::BadStatus { status: state.status });
    }

    let new_balance = state.validate_amount(amount)?;
    let new_count = state.count.checked_add(1).ok_or(ChannelError::CountOverflow)?;

    let mut next = state.clone();
    next.balance = new_balance;
    next.count = new_count;
    next.sender_sig = sender_sig;
    if let Some(blob) = payment {
        next.payments_hash = payments_hash_chain(&state.payments_hash, blob);
    }
    Ok(next)
}

/// Close transition: `Open` or `Closing` to `Closing`
///
/// Closing is re-enterable so the receiver can rebuild and rebroadcast the
/// closure transaction after a failed broadcast.
pub fn apply_close(state: &SharedState) -> Result<SharedState, ChannelError> {
    match state.status {
        Status::Open | Status::Closing => {
            let mut next = state.clone();
            next.status = Status::Closing;
            Ok(next)
        }
        status => Err(ChannelError::BadStatus { status }),
    }
}

/// CloseMined transition: `Closing` to `Closed`
pub fn apply_close_mined(state: &SharedState) -> Result<SharedState, ChannelError> {
    if state.status != Status::Closing {
        return Err(ChannelError::BadStatus { status: state.status });
    }

    let mut next = state.clone();
    next.status = Status::Closed;
    Ok(next)
}

/// Extends the running payment-log hash with one payment blob
///
/// The chain is `H' = SHA256(H || len_le(blob) || blob)` starting from a
/// zero hash. The length prefix keeps blob boundaries unambiguous.
pub fn payments_hash_chain(prev: &[u8; 32], blob: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update((blob.len() as u64).to_le_bytes());
    hasher.update(blob);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::{
        accepted_state, new_state_with_sender, open_state, receiver_keys, test_funding,
    };

    #[test]
    fn test_apply_accept() {
        let state = new_state_with_sender();
        let (_, receiver_pubkey) = receiver_keys();

        let next = apply_accept(&state, receiver_pubkey).expect("accept should succeed");

        assert_eq!(next.status, Status::PreInfoGathered);
        assert_eq!(next.receiver_pubkey, Some(receiver_pubkey));
        // everything else is untouched
        assert_eq!(next.sender_pubkey, state.sender_pubkey);
        assert_eq!(next.balance, 0);
    }

    #[test]
    fn test_apply_accept_requires_not_started() {
        let state = accepted_state();
        let (_, receiver_pubkey) = receiver_keys();

        assert_eq!(
            apply_accept(&state, receiver_pubkey),
            Err(ChannelError::BadStatus { status: Status::PreInfoGathered })
        );
    }

    #[test]
    fn test_apply_accept_requires_sender_fields() {
        let mut state = new_state_with_sender();
        state.sender_pubkey = None;
        let (_, receiver_pubkey) = receiver_keys();

        assert_eq!(
            apply_accept(&state, receiver_pubkey),
            Err(ChannelError::MissingField("sender_pubkey"))
        );
    }

    #[test]
    fn test_apply_open() {
        let state = accepted_state();
        let funding = test_funding(1_000_000);

        let next = apply_open(&state, funding, vec![1, 2, 3]).expect("open should succeed");

        assert_eq!(next.status, Status::Open);
        assert_eq!(next.funding_txid, Some(funding.txid));
        assert_eq!(next.funding_vout, funding.vout);
        assert_eq!(next.funding_amount, 1_000_000);
        assert_eq!(next.block_height, funding.height);
        assert_eq!(next.sender_sig, vec![1, 2, 3]);
    }

    #[test]
    fn test_apply_open_rejects_funding_below_fee() {
        let state = accepted_state();
        let funding = test_funding(74_999);

        assert_eq!(
            apply_open(&state, funding, Vec::new()),
            Err(ChannelError::FundingTooLow { funding: 74_999, fee: 75_000 })
        );
    }

    #[test]
    fn test_apply_open_requires_pre_info_gathered() {
        let state = open_state(1_000_000);
        let funding = test_funding(1_000_000);

        assert_eq!(
            apply_open(&state, funding, Vec::new()),
            Err(ChannelError::BadStatus { status: Status::Open })
        );
    }

    #[test]
    fn test_apply_send_commits_balance_count_and_sig() {
        let state = open_state(1_000_000);

        let next =
            apply_send(&state, 100_000, vec![9, 9], Some(b"payment-1")).expect("send should succeed");

        assert_eq!(next.balance, 100_000);
        assert_eq!(next.count, 1);
        assert_eq!(next.sender_sig, vec![9, 9]);
        assert_ne!(next.payments_hash, state.payments_hash);

        let third = apply_send(&next, 50_000, vec![8], Some(b"payment-2")).expect("second send");
        assert_eq!(third.balance, 150_000);
        assert_eq!(third.count, 2);
    }

    #[test]
    fn test_apply_send_without_payment_keeps_hash() {
        let state = open_state(1_000_000);

        let next = apply_send(&state, 100_000, Vec::new(), None).expect("send should succeed");

        assert_eq!(next.payments_hash, state.payments_hash);
    }

    #[test]
    fn test_apply_send_requires_open() {
        let state = accepted_state();
        assert_eq!(
            apply_send(&state, 1, Vec::new(), None),
            Err(ChannelError::BadStatus { status: Status::PreInfoGathered })
        );
    }

    #[test]
    fn test_apply_close_and_close_mined() {
        let state = open_state(1_000_000);

        let closing = apply_close(&state).expect("close from open");
        assert_eq!(closing.status, Status::Closing);

        // Closing is re-enterable for rebroadcast.
        let closing_again = apply_close(&closing).expect("close from closing");
        assert_eq!(closing_again.status, Status::Closing);

        let closed = apply_close_mined(&closing_again).expect("close mined");
        assert_eq!(closed.status, Status::Closed);

        assert_eq!(
            apply_close(&closed),
            Err(ChannelError::BadStatus { status: Status::Closed })
        );
        assert_eq!(
            apply_send(&closed, 1, Vec::new(), None),
            Err(ChannelError::BadStatus { status: Status::Closed })
        );
    }

    #[test]
    fn test_payments_hash_chain_depends_on_order_and_length() {
        let zero = [0u8; 32];
        let a_then_b = payments_hash_chain(&payments_hash_chain(&zero, b"a"), b"b");
        let b_then_a = payments_hash_chain(&payments_hash_chain(&zero, b"b"), b"a");
        assert_ne!(a_then_b, b_then_a);

        // "ab" + "" must differ from "a" + "b": the length prefix keeps
        // blob boundaries apart.
        let ab_then_empty = payments_hash_chain(&payments_hash_chain(&zero, b"ab"), b"");
        assert_ne!(a_then_b, ab_then_empty);
    }
}
