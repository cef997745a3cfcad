//! Payment envelope decoding and construction
//!
//! The payment blob is the atom of the payment log: the hub stores and
//! hashes it verbatim and only needs two facts out of it, the amount and
//! the logical target. Decoding sits behind [`PaymentDecoder`] so embedders
//! can swap the envelope format; [`JsonDecoder`] handles the canonical JSON
//! shape `{ "amount": .., "target": .., "nonce": .., ...application }`.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// The facts the hub needs from a decoded payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    /// Payment amount in satoshis
    pub amount: u64,
    /// Logical payment target, authorized via the directory
    pub target: String,
}

/// Pluggable payment-envelope decoder
pub trait PaymentDecoder {
    /// Extracts amount and target from a raw payment blob
    ///
    /// # Errors
    /// * [`Error::InvalidPayment`] - if the blob cannot be decoded
    fn decode(&self, raw: &[u8]) -> Result<PaymentDetails>;
}

/// The canonical JSON payment envelope
///
/// Senders serialize this to produce the payment blob. Application fields
/// may be added alongside; the decoder ignores what it does not know, and
/// the log keeps the blob byte-for-byte either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEnvelope {
    /// Payment amount in satoshis
    pub amount: i64,
    /// Logical payment target
    pub target: String,
    /// Sender-chosen nonce keeping equal payments distinct in the log
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nonce: Vec<u8>,
}

impl PaymentEnvelope {
    /// Serializes the envelope into its canonical byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::InvalidPayment(e.to_string()))
    }
}

/// JSON implementation of [`PaymentDecoder`]
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl PaymentDecoder for JsonDecoder {
    fn decode(&self, raw: &[u8]) -> Result<PaymentDetails> {
        let envelope: PaymentEnvelope =
            serde_json::from_slice(raw).map_err(|e| Error::InvalidPayment(e.to_string()))?;

        if envelope.amount < 0 {
            return Err(Error::InvalidPayment("amount must not be negative".into()));
        }

        // A zero amount decodes fine and is rejected downstream by the
        // channel's amount validation.
        Ok(PaymentDetails { amount: envelope.amount as u64, target: envelope.target })
    }
}
