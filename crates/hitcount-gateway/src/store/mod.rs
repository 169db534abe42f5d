//! Backing store contract.
//!
//! The engine never keeps authoritative state in-process: every counter and
//! rate-limit bucket lives behind a [`KvStore`]. Implementations must make
//! each method a single atomic step; the engine relies on `incr_by` for
//! concurrent hits and never does read-modify-write on its own.

pub mod memory;
pub mod testutil;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use hitcount_core::HitcountError;

pub use memory::{MemoryServer, MemoryStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("wrong value type for key {0}")]
    WrongType(String),
    #[error("increment would overflow")]
    Overflow,
    #[error("no such database: {0}")]
    NoSuchDatabase(usize),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for HitcountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => HitcountError::StoreUnavailable(msg),
            StoreError::Overflow => HitcountError::BadRequest("counter value out of range".into()),
            other => HitcountError::Internal(other.to_string()),
        }
    }
}

/// What `incr_by` does when the key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrMode {
    /// Create with value `delta`, optionally with an expiry.
    Upsert { ttl: Option<Duration> },
    /// Leave absent keys alone and return `None`.
    ExistingOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    Always,
    IfExists,
    IfAbsent,
}

/// Expiry handling for `set_int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Keep whatever expiry the key has (none if the key is new).
    Keep,
    /// Replace the expiry.
    Set(Duration),
    /// Keep an existing key's expiry; new keys get this one.
    KeepOrSet(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOutcome {
    pub applied: bool,
    pub previous: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    Missing,
    Persistent,
    Expires(Duration),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically add `delta`; returns the new value, or `None` when the key
    /// is absent under [`IncrMode::ExistingOnly`].
    async fn incr_by(&self, key: &str, delta: i64, mode: IncrMode) -> StoreResult<Option<i64>>;

    async fn set_int(
        &self,
        key: &str,
        value: i64,
        cond: SetCondition,
        expiry: Expiry,
    ) -> StoreResult<SetOutcome>;

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>>;

    async fn set_text(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    async fn get_text(&self, key: &str) -> StoreResult<Option<String>>;

    /// Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn ttl(&self, key: &str) -> StoreResult<TtlState>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Number of live keys in this keyspace.
    async fn key_count(&self) -> StoreResult<usize>;

    async fn ping(&self) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn KvStore>;
