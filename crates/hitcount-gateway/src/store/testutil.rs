//! Store doubles for exercising failure paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Expiry, IncrMode, KvStore, MemoryStore, SetCondition, SetOutcome, StoreError, StoreResult,
    TtlState,
};

/// A [`MemoryStore`] that can be switched into an "unreachable" state at runtime,
/// or made to drop a given number of text writes.
#[derive(Default)]
pub struct UnavailableStore {
    inner: MemoryStore,
    down: AtomicBool,
    passing_text_writes: AtomicUsize,
    failing_text_writes: AtomicUsize,
}

impl UnavailableStore {
    /// Starts out unreachable.
    pub fn down() -> Self {
        let s = Self::default();
        s.set_down(true);
        s
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// The next `n` `set_text` calls fail; everything else keeps working.
    pub fn fail_text_writes(&self, n: usize) {
        self.fail_text_writes_after(0, n);
    }

    /// Let `pass` `set_text` calls through, then fail the following `n`.
    pub fn fail_text_writes_after(&self, pass: usize, n: usize) {
        self.passing_text_writes.store(pass, Ordering::SeqCst);
        self.failing_text_writes.store(n, Ordering::SeqCst);
    }

    /// Direct access to the wrapped keyspace, bypassing failure injection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for UnavailableStore {
    async fn incr_by(&self, key: &str, delta: i64, mode: IncrMode) -> StoreResult<Option<i64>> {
        self.check()?;
        self.inner.incr_by(key, delta, mode).await
    }

    async fn set_int(
        &self,
        key: &str,
        value: i64,
        cond: SetCondition,
        expiry: Expiry,
    ) -> StoreResult<SetOutcome> {
        self.check()?;
        self.inner.set_int(key, value, cond, expiry).await
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        self.check()?;
        self.inner.get_int(key).await
    }

    async fn set_text(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.check()?;
        let passed = self
            .passing_text_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if passed {
            return self.inner.set_text(key, value, ttl).await;
        }
        let failed = self
            .failing_text_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("write dropped".into()));
        }
        self.inner.set_text(key, value, ttl).await
    }

    async fn get_text(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.get_text(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<TtlState> {
        self.check()?;
        self.inner.ttl(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.check()?;
        self.inner.expire(key, ttl).await
    }

    async fn key_count(&self) -> StoreResult<usize> {
        self.check()?;
        self.inner.key_count().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}
