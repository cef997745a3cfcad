//! Core type definitions and protocol constants
//!
//! This module collects the constants shared across the channel state
//! machine and the receiver orchestrator.

// ============================================================================
// Channel Domain
// ============================================================================

/// Channel identifiers: 32 random bytes rendered as url-safe base64 without
/// padding (43 characters)
pub type ChannelId = String;

/// Number of random bytes behind a channel id
pub const CHANNEL_ID_LEN: usize = 32;

/// Schema version written into every new [`crate::SharedState`]
pub const STATE_VERSION: u32 = 1;

/// Default CSV refund timeout in blocks (~24 hours at 10 minutes per block)
pub const DEFAULT_TIMEOUT_BLOCKS: u16 = 144;

/// Default miner fee for the on-chain close, in satoshis. Fixed per channel
/// at creation.
pub const DEFAULT_FEE_SATS: u64 = 75_000;

// ============================================================================
// Funding Policy
// ============================================================================

/// Minimum confirmations before a funding output is accepted
pub const MIN_FUNDING_CONF: u32 = 6;

/// Block margin kept between the funding depth and the refund timeout.
/// Funding buried deeper than `timeout - CLOSE_WINDOW_BLOCKS` is refused,
/// because the receiver would have too little time left to close before the
/// sender's refund path unlocks.
pub const CLOSE_WINDOW_BLOCKS: u16 = 24;
