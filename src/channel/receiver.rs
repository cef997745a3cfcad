//! Receiver role
//!
//! The receiver is the trust-minimized side of the channel: it never commits
//! a payment without first reconstructing the closure transaction the sender
//! signed, co-signing it in memory and running the script engine over the
//! result. A committed state therefore always holds a signature the receiver
//! can use to close unilaterally.

use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::PublicKey;

use crate::channel::state::{SharedState, Status};
use crate::channel::transition::{
    apply_accept, apply_close, apply_close_mined, apply_open, apply_send, FundingOutput,
};
use crate::channel::tx;
use crate::errors::ChannelError;

/// Receiver side of a channel: the shared state plus the receiver's private key
#[derive(Debug)]
pub struct Receiver {
    state: SharedState,
    secret_key: SecretKey,
}

impl Receiver {
    /// Rebinds a persisted state to the receiver's re-derived private key
    pub fn new(state: SharedState, secret_key: SecretKey) -> Self {
        Self { state, secret_key }
    }

    /// Accepts a channel proposed by a sender
    ///
    /// `state` carries the sender's public key and both payout addresses;
    /// the receiver derives its own compressed public key into the state and
    /// moves it to [`Status::PreInfoGathered`].
    pub fn accept(state: SharedState, secret_key: SecretKey) -> Result<Self, ChannelError> {
        let secp = Secp256k1::new();
        let pubkey = PublicKey::new(secret_key.public_key(&secp));
        let state = apply_accept(&state, pubkey)?;
        Ok(Self { state, secret_key })
    }

    /// Opens the channel once the funding output is confirmed
    ///
    /// Reconstructs the zero-balance closure transaction, assembles it with
    /// the sender's signature and a locally produced receiver signature, and
    /// executes the script engine over it. Only on success are the funding
    /// fields and the signature committed.
    pub fn open(
        &mut self,
        funding: FundingOutput,
        sender_sig: Vec<u8>,
    ) -> Result<(), ChannelError> {
        let next = apply_open(&self.state, funding, sender_sig)?;
        self.check_sender_sig(&next, 0, &next.sender_sig)?;
        self.state = next;
        Ok(())
    }

    /// Checks a payment without committing it
    ///
    /// Runs the same validation as [`Receiver::send`]. Validation failures
    /// (bad amount, bad signature, channel not open) come back as `false`;
    /// only internal errors surface as `Err`.
    pub fn validate(&self, amount: u64, sender_sig: &[u8]) -> Result<bool, ChannelError> {
        if self.state.status != Status::Open {
            return Ok(false);
        }

        let new_balance = match self.state.validate_amount(amount) {
            Ok(balance) => balance,
            Err(ChannelError::InvalidAmount)
            | Err(ChannelError::InsufficientCapacity { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.check_sender_sig(&self.state, new_balance, sender_sig) {
            Ok(()) => Ok(true),
            Err(ChannelError::InvalidSignature) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Commits a payment
    ///
    /// Validates the amount against the channel capacity and the signature
    /// through the script engine, then atomically raises the balance,
    /// increments the payment counter and stores the signature. When the
    /// payment blob is given it is folded into the running payment-log hash.
    pub fn send(
        &mut self,
        amount: u64,
        sender_sig: Vec<u8>,
        payment: Option<&[u8]>,
    ) -> Result<(), ChannelError> {
        let next = apply_send(&self.state, amount, sender_sig, payment)?;
        self.check_sender_sig(&next, next.balance, &next.sender_sig)?;
        self.state = next;
        Ok(())
    }

    /// Produces the fully signed closure transaction for the current balance
    ///
    /// Moves the channel to [`Status::Closing`]. Closing is re-enterable, so
    /// the raw transaction can be rebuilt for rebroadcast.
    pub fn close(&mut self) -> Result<Vec<u8>, ChannelError> {
        let next = apply_close(&self.state)?;
        let receiver_sig = tx::sign_closure(&next, next.balance, &self.secret_key)?;
        let raw = tx::closure_tx_signed(&next, next.balance, &next.sender_sig, &receiver_sig)?;
        self.state = next;
        Ok(raw)
    }

    /// Marks the channel closed after the closure transaction confirmed
    pub fn close_mined(&mut self) -> Result<(), ChannelError> {
        self.state = apply_close_mined(&self.state)?;
        Ok(())
    }

    /// The receiver's mirror of the shared state
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Consumes the role, returning the state for persistence
    pub fn into_state(self) -> SharedState {
        self.state
    }

    /// Co-signs the closure at `balance` and runs the script engine over it
    fn check_sender_sig(
        &self,
        state: &SharedState,
        balance: u64,
        sender_sig: &[u8],
    ) -> Result<(), ChannelError> {
        let receiver_sig = tx::sign_closure(state, balance, &self.secret_key)?;
        let raw = tx::closure_tx_signed(state, balance, sender_sig, &receiver_sig)?;
        tx::validate_spend(state, &raw)
    }
}
