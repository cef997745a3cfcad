//! Error types for the sluice library
//!
//! Errors are grouped by the subsystem that produces them. Pure state
//! machine and script errors live in [`ChannelError`]; the collaborators
//! behind the orchestrator each get their own enum so that callers can tell
//! a rejected transition apart from an upstream I/O failure.

use thiserror::Error;

use bitcoin::Network;

use crate::channel::state::Status;

/// The main error type for the sluice library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Channel state machine, script or signature errors
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Funding UTXO policy errors
    #[error(transparent)]
    Funding(#[from] FundingError),

    /// Key derivation errors
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Persistence store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Bitcoin node client errors
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Payment directory errors
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// No channel exists under the given id
    #[error("unknown channel id: {0}")]
    UnknownChannel(String),

    /// The payment directory does not know the payment target
    #[error("unknown payment target: {0}")]
    UnknownTarget(String),

    /// The payment envelope could not be decoded
    #[error("malformed payment envelope: {0}")]
    InvalidPayment(String),
}

/// Errors produced by the channel state machine and its script layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// Payment amounts must be strictly positive
    #[error("amount must be positive")]
    InvalidAmount,

    /// The payment would overflow the channel capacity
    #[error("insufficient channel capacity: balance {balance} + amount {amount} + fee {fee} exceeds funding {funding}")]
    InsufficientCapacity {
        /// Balance committed so far
        balance: u64,
        /// Requested payment amount
        amount: u64,
        /// Channel close fee
        fee: u64,
        /// Funding output value
        funding: u64,
    },

    /// The funding output cannot cover the channel close fee
    #[error("funding amount {funding} cannot cover the channel fee {fee}")]
    FundingTooLow {
        /// Funding output value
        funding: u64,
        /// Channel close fee
        fee: u64,
    },

    /// The script engine rejected the reconstructed closure transaction
    #[error("invalid signature: script engine rejected the closure transaction")]
    InvalidSignature,

    /// The operation is not allowed in the channel's current status
    #[error("operation not allowed while channel is {status:?}")]
    BadStatus {
        /// Status the channel was in when the operation was attempted
        status: Status,
    },

    /// Only P2PKH and P2SH output addresses are supported
    #[error("unsupported output address type")]
    UnsupportedAddress,

    /// The address does not belong to the channel's network
    #[error("address is not valid for network {net}")]
    WrongNetwork {
        /// Network the channel runs on
        net: Network,
    },

    /// Channel public keys must be compressed secp256k1 points
    #[error("invalid public key: expected a compressed point")]
    InvalidPublicKey,

    /// A state field required by the operation has not been set yet
    #[error("channel state is missing {0}")]
    MissingField(&'static str),

    /// Closure and refund transactions spend exactly one input
    #[error("transaction must spend exactly one input")]
    WrongInputCount,

    /// The payment counter cannot be incremented further
    #[error("payment counter overflow")]
    CountOverflow,

    /// `send_accepted` was called without a matching outstanding `prepare_send`
    #[error("no pending payment of {amount} to commit")]
    NoPendingSend {
        /// Amount the acknowledgement claimed
        amount: u64,
    },

    /// A script could not be assembled
    #[error("script assembly failed: {0}")]
    Script(String),

    /// The signature hash could not be computed
    #[error("sighash computation failed: {0}")]
    Sighash(String),

    /// A raw transaction could not be decoded
    #[error("transaction decode failed: {0}")]
    TxDecode(String),
}

/// Policy failures while checking the funding UTXO against the node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FundingError {
    /// The node does not know the funding output
    #[error("funding output not found")]
    UtxoMissing,

    /// Coinbase outputs are not accepted as channel funding
    #[error("coinbase outputs cannot fund a channel")]
    Coinbase,

    /// The funding output does not pay the expected channel address
    #[error("funding output does not pay the channel address")]
    WrongAddress,

    /// The funding transaction is not buried deep enough yet
    #[error("too few confirmations: {confirmations} < {required}")]
    TooFewConfirmations {
        /// Confirmations reported by the node
        confirmations: u32,
        /// Minimum confirmations required
        required: u32,
    },

    /// The funding transaction is too close to the refund timeout
    #[error("too many confirmations: {confirmations} > {allowed}")]
    TooManyConfirmations {
        /// Confirmations reported by the node
        confirmations: u32,
        /// Maximum confirmations allowed
        allowed: u32,
    },
}

/// Errors from BIP32 key derivation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    /// Key paths are non-hardened child indices below 2^31
    #[error("invalid key path index: {0}")]
    InvalidIndex(u32),

    /// The underlying BIP32 derivation failed
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Errors from the persistence store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The compare-and-swap pre-state did not match the stored state
    #[error("conflict: stored state does not match the expected pre-state")]
    Conflict,

    /// A record with this id already exists
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// No record exists under the given id
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store itself failed
    #[error("store error: {0}")]
    Io(String),
}

/// Errors from the bitcoin node client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeError {
    /// The node RPC failed
    #[error("node rpc error: {0}")]
    Rpc(String),
}

/// Errors from the payment directory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DirectoryError {
    /// The directory lookup itself failed (distinct from an unknown target)
    #[error("directory lookup failed: {0}")]
    Io(String),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
