//! Sender role
//!
//! The sender funds the channel and authorizes payments by signing closure
//! transactions for ever-higher receiver balances. It never verifies the
//! receiver's signature: its protection is the CSV refund path, which it can
//! take unilaterally if the receiver disappears.

use bitcoin::address::NetworkUnchecked;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, Network, PublicKey};

use crate::channel::state::{check_supported_address, ChannelParams, SharedState, Status};
use crate::channel::transition::{
    apply_accept, apply_close, apply_close_mined, apply_open, apply_send, FundingOutput,
};
use crate::channel::tx;
use crate::errors::ChannelError;

/// Sender side of a channel: the shared state plus the sender's private key
#[derive(Debug)]
pub struct Sender {
    state: SharedState,
    secret_key: SecretKey,
    /// Payment offered via `prepare_send` but not yet acknowledged
    pending: Option<(u64, Vec<u8>)>,
}

impl Sender {
    /// Starts a new channel from the sender side
    ///
    /// Derives the sender's compressed public key from the private key and
    /// records the payout address the receiver should pay change back to.
    ///
    /// # Errors
    /// * [`ChannelError::UnsupportedAddress`] / [`ChannelError::WrongNetwork`] -
    ///   if the payout address is unusable on `net`
    pub fn open_channel(
        net: Network,
        params: ChannelParams,
        secret_key: SecretKey,
        output_addr: Address<NetworkUnchecked>,
    ) -> Result<Self, ChannelError> {
        check_supported_address(net, &output_addr)?;

        let secp = Secp256k1::new();
        let pubkey = PublicKey::new(secret_key.public_key(&secp));

        let mut state = SharedState::new(net, params);
        state.sender_pubkey = Some(pubkey);
        state.sender_output = Some(output_addr);

        Ok(Self { state, secret_key, pending: None })
    }

    /// Records the receiver's key and payout address from the create response
    pub fn received_pub_key(
        &mut self,
        receiver_pubkey: PublicKey,
        receiver_output: Address<NetworkUnchecked>,
    ) -> Result<(), ChannelError> {
        check_supported_address(self.state.net, &receiver_output)?;

        let mut staged = self.state.clone();
        staged.receiver_output = Some(receiver_output);
        self.state = apply_accept(&staged, receiver_pubkey)?;
        Ok(())
    }

    /// Reports the confirmed funding output and signs the zero-balance closure
    ///
    /// # Returns
    /// The signature the receiver needs to open its side of the channel.
    pub fn funding_tx_mined(&mut self, funding: FundingOutput) -> Result<Vec<u8>, ChannelError> {
        let mut next = apply_open(&self.state, funding, Vec::new())?;
        let sig = tx::sign_closure(&next, 0, &self.secret_key)?;
        next.sender_sig = sig.clone();
        self.state = next;
        Ok(sig)
    }

    /// Signs the closure transaction for the balance after `amount` more
    ///
    /// Does not commit anything: the committed balance only moves once the
    /// receiver's acceptance is observed via [`Sender::send_accepted`]. Until
    /// then the payment is held as a shadow pending delta.
    pub fn prepare_send(&mut self, amount: u64) -> Result<Vec<u8>, ChannelError> {
        if self.state.status != Status::Open {
            return Err(ChannelError::BadStatus { status: self.state.status });
        }

        let new_balance = self.state.validate_amount(amount)?;
        let sig = tx::sign_closure(&self.state, new_balance, &self.secret_key)?;
        self.pending = Some((amount, sig.clone()));
        Ok(sig)
    }

    /// Commits the pending payment after the receiver acknowledged it
    ///
    /// # Errors
    /// * [`ChannelError::NoPendingSend`] - if no matching `prepare_send` is outstanding
    pub fn send_accepted(&mut self, amount: u64) -> Result<(), ChannelError> {
        match self.pending.take() {
            Some((pending_amount, sig)) if pending_amount == amount => {
                self.state = apply_send(&self.state, amount, sig, None)?;
                Ok(())
            }
            other => {
                self.pending = other;
                Err(ChannelError::NoPendingSend { amount })
            }
        }
    }

    /// Marks the channel closed after observing the closure transaction confirm
    pub fn close_mined(&mut self) -> Result<(), ChannelError> {
        let closing = apply_close(&self.state)?;
        self.state = apply_close_mined(&closing)?;
        Ok(())
    }

    /// Builds and signs the CSV refund transaction
    ///
    /// The raw transaction only becomes broadcastable once `timeout` blocks
    /// have passed since the funding confirmed.
    pub fn refund(&self) -> Result<Vec<u8>, ChannelError> {
        tx::refund_tx_signed(&self.state, &self.secret_key)
    }

    /// The sender's mirror of the shared state
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Amount offered but not yet acknowledged, if any
    pub fn pending_amount(&self) -> Option<u64> {
        self.pending.as_ref().map(|(amount, _)| *amount)
    }
}
