//! Receiver key derivation
//!
//! Channel keys are non-hardened BIP32 children of a single parent extended
//! key. The child index is the `key_path` stored with each channel record,
//! so the private key is never persisted: it is re-derived from
//! `(parent, key_path)` on every load, and the receiver pubkey recorded in
//! the shared state is regenerable the same way.

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::{Network, PublicKey};

use crate::errors::KeyError;

/// Derives per-channel keys from a parent extended private key
pub struct KeySource {
    master: Xpriv,
    secp: Secp256k1<All>,
}

impl KeySource {
    /// Wraps a parent extended private key
    ///
    /// The parent must not be shared: anyone holding it can derive every
    /// channel key.
    pub fn new(master: Xpriv) -> Self {
        Self { master, secp: Secp256k1::new() }
    }

    /// Builds a key source from raw seed bytes (useful for tests)
    pub fn from_seed(net: Network, seed: &[u8]) -> Result<Self, KeyError> {
        let master =
            Xpriv::new_master(net, seed).map_err(|e| KeyError::Derivation(e.to_string()))?;
        Ok(Self::new(master))
    }

    /// Derives the keypair for a channel's `key_path`
    ///
    /// # Errors
    /// * [`KeyError::InvalidIndex`] - if the index is in the hardened range
    pub fn derive(&self, key_path: u32) -> Result<(SecretKey, PublicKey), KeyError> {
        let child =
            ChildNumber::from_normal_idx(key_path).map_err(|_| KeyError::InvalidIndex(key_path))?;
        let derived = self
            .master
            .derive_priv(&self.secp, &[child])
            .map_err(|e| KeyError::Derivation(e.to_string()))?;

        let secret_key = derived.private_key;
        let pubkey = PublicKey::new(secret_key.public_key(&self.secp));
        Ok((secret_key, pubkey))
    }
}
