//! In-memory store
//!
//! A `Mutex`-guarded map implementation of [`Storage`]. Tests and embedders
//! without durability needs use it directly; it is also the reference for
//! the atomicity the contract demands (state swap and payment append happen
//! under one lock).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::channel::state::SharedState;
use crate::errors::StoreError;
use crate::store::{Record, Storage};

#[derive(Default)]
struct Inner {
    next_key_path: u32,
    records: HashMap<String, Record>,
    payments: HashMap<String, Vec<Vec<u8>>>,
}

/// Thread-safe in-memory [`Storage`] implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Io("store mutex poisoned".into()))
    }
}

impl Storage for MemoryStore {
    fn reserve_key_path(&self) -> Result<u32, StoreError> {
        let mut inner = self.lock()?;
        let path = inner.next_key_path;
        inner.next_key_path = path
            .checked_add(1)
            .ok_or_else(|| StoreError::Io("key path space exhausted".into()))?;
        Ok(path)
    }

    fn create(&self, record: Record) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn update(
        &self,
        id: &str,
        pre: &SharedState,
        post: &SharedState,
        payment: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        let record =
            inner.records.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if &record.state != pre {
            return Err(StoreError::Conflict);
        }

        record.state = post.clone();
        if let Some(blob) = payment {
            inner.payments.entry(id.to_string()).or_default().push(blob.to_vec());
        }
        Ok(())
    }

    fn list_payments(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let inner = self.lock()?;
        if !inner.records.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(inner.payments.get(id).cloned().unwrap_or_default())
    }
}
