#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Sluice
//!
//! A unidirectional bitcoin payment-channel core. A sender locks funds in a
//! P2SH output and then issues a growing sequence of signed closing
//! transactions that progressively reallocate the locked value toward a
//! receiver. Only two transactions ever reach the chain: the funding
//! transaction and the latest mutually-signed closure (or, if the receiver
//! disappears, the sender's CSV-locked refund).
//!
//! The crate is organized in layers, leaves first:
//!
//! - [`channel`]: the shared channel state, its pure transition functions,
//!   the funding script and the closure/refund transaction builders, and the
//!   sender/receiver role objects.
//! - [`keys`]: BIP32 child-key derivation for the receiver.
//! - [`store`]: the persistence contract (compare-and-swap on channel state
//!   plus an ordered payment log) and an in-memory implementation.
//! - [`node`]: the bitcoin node client contract (UTXO lookup, broadcast).
//! - [`hub`]: the receiver-side orchestrator tying the above together.
//!
//! Signature validation always runs the real bitcoin script interpreter
//! against the reconstructed transaction, so the receiver accepts exactly
//! the set of transactions the network will accept.

pub mod channel;
pub mod errors;
pub mod hub;
pub mod keys;
pub mod node;
pub mod store;
pub mod types;

pub use channel::state::{ChannelParams, SharedState, Status};
pub use channel::{Receiver, Sender};
pub use errors::{Error, Result};
pub use hub::{Directory, Hub, HubConfig, StaticDirectory};
pub use store::{MemoryStore, Record, Storage};
