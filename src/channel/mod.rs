//! Channel module for unidirectional payment channels
//!
//! This module provides a deterministic state machine for unidirectional
//! payment channels between a sender (paying) and a receiver (being paid),
//! together with the bitcoin script and transaction layer both parties use
//! to authorize payments. The shared state is mirrored by both roles; every
//! payment is authorized by a sender signature over the closure transaction
//! for the new balance, and verified by executing the bitcoin script
//! interpreter against the reconstructed transaction.
//!
//! # Structure
//!
//! The module is organized into functional domains:
//! - `state`: the serializable [`SharedState`](state::SharedState) and its
//!   validation helpers
//! - `transition`: pure state transitions (accept, open, send, close)
//! - `script`: the funding redeem script and its two unlock scripts
//! - `tx`: bitcoin transaction builders, signing and engine validation
//! - `sender` / `receiver`: the role objects binding state to a private key

pub mod receiver;
pub mod script;
pub mod sender;
pub mod state;
pub mod transition;
pub mod tx;

#[cfg(test)]
pub mod test_utils;

pub use receiver::Receiver;
pub use script::{funding_address, funding_script};
pub use sender::Sender;
pub use state::{check_supported_address, ChannelParams, SharedState, Status};
pub use transition::{
    apply_accept, apply_close, apply_close_mined, apply_open, apply_send, FundingOutput,
};
pub use tx::{
    closure_tx, closure_tx_signed, refund_tx, refund_tx_signed, sign_closure, spend_funding_tx,
    validate_spend,
};
