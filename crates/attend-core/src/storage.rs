//! Storage capabilities consumed by the attendance service.
//!
//! The gallery and the event log are read in full on every call; nothing
//! here is cached.

use crate::range::DateRange;
use crate::types::{AttendanceEntry, Embedding, IdentityRecord, NewIdentity, ScanEvent};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity code already enrolled: {0}")]
    DuplicateCode(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage backend: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Enrolled identities (the gallery).
pub trait IdentityStore {
    /// Insert a new identity; returns its id.
    ///
    /// Fails with [`StoreError::DuplicateCode`] if `identity.code` is taken,
    /// leaving the existing record untouched.
    fn add(&mut self, identity: &NewIdentity, embedding: &Embedding) -> Result<i64, StoreError>;

    /// Delete an identity. Returns `false` if no record had that id.
    fn delete(&mut self, id: i64) -> Result<bool, StoreError>;

    /// Every enrolled identity, ordered by id.
    fn list_all(&self) -> Result<Vec<IdentityRecord>, StoreError>;
}

/// Append-only log of scan events.
pub trait EventLog {
    fn append(&mut self, event: &ScanEvent) -> Result<(), StoreError>;

    /// Events whose calendar date lies in `range`, joined with identity
    /// name and department.
    fn query(&self, range: &DateRange) -> Result<Vec<AttendanceEntry>, StoreError>;
}
