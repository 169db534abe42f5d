//! In-process backing store with numbered databases.
//!
//! `MemoryServer` owns a fixed number of independent keyspaces ("databases",
//! addressed by slot number); `select` hands out a cheap cloneable
//! [`MemoryStore`] bound to one of them. Counters and rate-limit buckets live
//! in different slots.
//!
//! Atomicity: every mutating call runs inside a single `DashMap::entry`
//! (shard write lock held for the whole step, never across an `.await`).
//!
//! Expiry: reads treat expired entries as absent and remove them lazily; a
//! background sweeper started with [`MemoryServer::spawn_sweeper`] reclaims
//! keys nobody touches. Deadlines use `tokio::time::Instant` so tests can
//! drive them with a paused clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Expiry, IncrMode, KvStore, SetCondition, SetOutcome, StoreError, StoreResult, TtlState};

#[derive(Debug, Clone)]
enum Value {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Handle to one database of a [`MemoryServer`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<DashMap<String, Slot>>,
}

impl MemoryStore {
    /// A standalone keyspace (not attached to a server).
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired keys. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, slot| slot.is_live(now));
        before.saturating_sub(self.map.len())
    }

    /// Run `f` on a live slot; drops the slot if it has expired.
    fn read<T>(&self, key: &str, f: impl FnOnce(&Slot) -> T) -> Option<T> {
        let now = Instant::now();
        {
            let slot = self.map.get(key)?;
            if slot.is_live(now) {
                return Some(f(&slot));
            }
        }
        self.map.remove_if(key, |_, s| !s.is_live(now));
        None
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn incr_by(&self, key: &str, delta: i64, mode: IncrMode) -> StoreResult<Option<i64>> {
        let now = Instant::now();
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut o) if o.get().is_live(now) => match &mut o.get_mut().value {
                Value::Int(n) => {
                    *n = n.checked_add(delta).ok_or(StoreError::Overflow)?;
                    Ok(Some(*n))
                }
                Value::Text(_) => Err(StoreError::WrongType(key.to_string())),
            },
            Entry::Occupied(mut o) => match mode {
                IncrMode::Upsert { ttl } => {
                    o.insert(Slot::new(Value::Int(delta), ttl, now));
                    Ok(Some(delta))
                }
                IncrMode::ExistingOnly => {
                    o.remove();
                    Ok(None)
                }
            },
            Entry::Vacant(v) => match mode {
                IncrMode::Upsert { ttl } => {
                    v.insert(Slot::new(Value::Int(delta), ttl, now));
                    Ok(Some(delta))
                }
                IncrMode::ExistingOnly => Ok(None),
            },
        }
    }

    async fn set_int(
        &self,
        key: &str,
        value: i64,
        cond: SetCondition,
        expiry: Expiry,
    ) -> StoreResult<SetOutcome> {
        let now = Instant::now();
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut o) if o.get().is_live(now) => {
                let previous = match o.get().value {
                    Value::Int(n) => n,
                    Value::Text(_) => return Err(StoreError::WrongType(key.to_string())),
                };
                if cond == SetCondition::IfAbsent {
                    return Ok(SetOutcome { applied: false, previous: Some(previous) });
                }
                let slot = o.get_mut();
                slot.value = Value::Int(value);
                if let Expiry::Set(ttl) = expiry {
                    slot.expires_at = Some(now + ttl);
                }
                Ok(SetOutcome { applied: true, previous: Some(previous) })
            }
            entry => {
                if cond == SetCondition::IfExists {
                    if let Entry::Occupied(o) = entry {
                        o.remove();
                    }
                    return Ok(SetOutcome { applied: false, previous: None });
                }
                let ttl = match expiry {
                    Expiry::Keep => None,
                    Expiry::Set(ttl) | Expiry::KeepOrSet(ttl) => Some(ttl),
                };
                entry.insert(Slot::new(Value::Int(value), ttl, now));
                Ok(SetOutcome { applied: true, previous: None })
            }
        }
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        match self.read(key, |s| s.value.clone()) {
            None => Ok(None),
            Some(Value::Int(n)) => Ok(Some(n)),
            Some(Value::Text(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_text(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let slot = Slot::new(Value::Text(value.to_string()), ttl, Instant::now());
        self.map.insert(key.to_string(), slot);
        Ok(())
    }

    async fn get_text(&self, key: &str) -> StoreResult<Option<String>> {
        match self.read(key, |s| s.value.clone()) {
            None => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s)),
            Some(Value::Int(_)) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .map
            .remove(key)
            .map(|(_, slot)| slot.is_live(now))
            .unwrap_or(false))
    }

    async fn ttl(&self, key: &str) -> StoreResult<TtlState> {
        let now = Instant::now();
        Ok(self
            .read(key, |s| match s.expires_at {
                None => TtlState::Persistent,
                Some(at) => TtlState::Expires(at.saturating_duration_since(now)),
            })
            .unwrap_or(TtlState::Missing))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        match self.map.get_mut(key) {
            Some(mut slot) if slot.is_live(now) => {
                slot.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn key_count(&self) -> StoreResult<usize> {
        let now = Instant::now();
        Ok(self.map.iter().filter(|r| r.value().is_live(now)).count())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// A set of numbered databases, in the manner of a single key-value server.
#[derive(Clone)]
pub struct MemoryServer {
    databases: Arc<Vec<MemoryStore>>,
}

impl MemoryServer {
    pub fn new(databases: usize) -> Self {
        Self {
            databases: Arc::new((0..databases.max(1)).map(|_| MemoryStore::new()).collect()),
        }
    }

    pub fn databases(&self) -> usize {
        self.databases.len()
    }

    pub fn select(&self, slot: usize) -> StoreResult<MemoryStore> {
        self.databases
            .get(slot)
            .cloned()
            .ok_or(StoreError::NoSuchDatabase(slot))
    }

    /// Sweep every database once.
    pub fn sweep_expired(&self) -> usize {
        self.databases.iter().map(MemoryStore::sweep_expired).sum()
    }

    /// Periodically drop expired keys until `shutdown` flips to true (or its sender is gone).
    pub fn spawn_sweeper(&self, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = server.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "swept expired keys");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("store sweeper stopped");
                            return;
                        }
                    }
                }
            }
        })
    }
}
