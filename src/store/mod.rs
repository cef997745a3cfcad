//! Channel persistence contract
//!
//! The store serializes all writes to a channel through a compare-and-swap:
//! the caller reads the pre-state, runs a pure transition in memory and asks
//! the store to commit the post-state, atomically appending the payment blob
//! when one is given. A write whose pre-state no longer matches the stored
//! state is rejected with [`StoreError::Conflict`] and changes nothing.

use serde::{Deserialize, Serialize};

use crate::channel::state::SharedState;
use crate::errors::StoreError;
use crate::types::ChannelId;

mod memory;

pub use memory::MemoryStore;

/// A persisted channel record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Channel id: 32 random bytes as url-safe base64 without padding
    pub id: ChannelId,
    /// HD key index the receiver key is derived at
    pub key_path: u32,
    /// The channel's shared state
    pub state: SharedState,
}

/// The persistence contract the orchestrator runs against
///
/// Implementations must be safe for concurrent callers; all methods take
/// `&self`.
pub trait Storage {
    /// Hands out the next HD key index. Indices are monotonically increasing
    /// and never re-issued.
    fn reserve_key_path(&self) -> Result<u32, StoreError>;

    /// Persists a new record, failing if the id already exists
    fn create(&self, record: Record) -> Result<(), StoreError>;

    /// Fetches a record by channel id
    fn get(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Lists all channel records
    fn list(&self) -> Result<Vec<Record>, StoreError>;

    /// Atomically swaps a channel's state and optionally appends a payment
    ///
    /// Commits `post` and appends `payment` (when given) if and only if the
    /// stored state equals `pre`.
    ///
    /// # Errors
    /// * [`StoreError::Conflict`] - if the stored state does not match `pre`
    /// * [`StoreError::NotFound`] - if no record exists under `id`
    fn update(
        &self,
        id: &str,
        pre: &SharedState,
        post: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<(), StoreError>;

    /// Returns a channel's payment blobs in append order
    fn list_payments(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

impl<T: Storage + ?Sized> Storage for &T {
    fn reserve_key_path(&self) -> Result<u32, StoreError> {
        (**self).reserve_key_path()
    }

    fn create(&self, record: Record) -> Result<(), StoreError> {
        (**self).create(record)
    }

    fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        (**self).list()
    }

    fn update(
        &self,
        id: &str,
        pre: &SharedState,
        post: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        (**self).update(id, pre, post, payment)
    }

    fn list_payments(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).list_payments(id)
    }
}

impl<T: Storage + ?Sized> Storage for std::sync::Arc<T> {
    fn reserve_key_path(&self) -> Result<u32, StoreError> {
        (**self).reserve_key_path()
    }

    fn create(&self, record: Record) -> Result<(), StoreError> {
        (**self).create(record)
    }

    fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        (**self).list()
    }

    fn update(
        &self,
        id: &str,
        pre: &SharedState,
        post: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        (**self).update(id, pre, post, payment)
    }

    fn list_payments(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).list_payments(id)
    }
}
