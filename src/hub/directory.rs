//! Payment-target directory contract
//!
//! The directory decides which logical payment targets the receiver is
//! willing to collect for. An I/O failure is distinct from an unknown
//! target: the former aborts the operation, the latter makes the payment
//! invalid.

use std::collections::HashSet;

use crate::errors::DirectoryError;

/// Authorizes logical payment targets
pub trait Directory {
    /// Whether payments to `target` are accepted
    fn has_target(&self, target: &str) -> Result<bool, DirectoryError>;
}

impl<T: Directory + ?Sized> Directory for &T {
    fn has_target(&self, target: &str) -> Result<bool, DirectoryError> {
        (**self).has_target(target)
    }
}

impl<T: Directory + ?Sized> Directory for std::sync::Arc<T> {
    fn has_target(&self, target: &str) -> Result<bool, DirectoryError> {
        (**self).has_target(target)
    }
}

/// A fixed in-memory target set
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    targets: HashSet<String>,
}

impl StaticDirectory {
    /// Builds a directory from a list of accepted targets
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { targets: targets.into_iter().map(Into::into).collect() }
    }
}

impl Directory for StaticDirectory {
    fn has_target(&self, target: &str) -> Result<bool, DirectoryError> {
        Ok(self.targets.contains(target))
    }
}
