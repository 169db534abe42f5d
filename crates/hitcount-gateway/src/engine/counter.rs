//! Counter store: atomic counter operations over a [`KvStore`].
//!
//! Layout inside the counter keyspace:
//! - `C:{ns}:{key}`: the value
//! - `K:{ns}:{key}`: admin key (text), same TTL as the value
//! - `M:{ns}:{key}`: creation metadata (JSON text), same TTL as the value
//!
//! Counters created implicitly by `hit` have neither admin key nor metadata.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use hitcount_core::limits::BASE_TTL_PERIOD;
use hitcount_core::{CounterKey, HitcountError, Result};

use crate::engine::notifier::ChangeNotifier;
use crate::store::{Expiry, IncrMode, SetCondition, SharedStore, TtlState};

const ADMIN_KEY_LEN: usize = 32;

pub(crate) fn value_slot(key: &CounterKey) -> String {
    format!("C:{}:{}", key.namespace(), key.key())
}

pub(crate) fn admin_slot(key: &CounterKey) -> String {
    format!("K:{}:{}", key.namespace(), key.key())
}

fn meta_slot(key: &CounterKey) -> String {
    format!("M:{}:{}", key.namespace(), key.key())
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Random alphanumeric admin secret.
pub fn generate_admin_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ADMIN_KEY_LEN)
        .map(char::from)
        .collect()
}

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "crisp", "eager", "fancy", "gentle", "happy", "jolly",
    "lively", "lucky", "mellow", "nimble", "proud", "quiet", "rapid", "shiny", "silent", "sunny",
    "swift", "tidy", "vivid", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "beacon", "comet", "falcon", "forest", "harbor", "lantern", "meadow", "otter",
    "panda", "pebble", "quartz", "raven", "river", "rocket", "sparrow", "summit", "tiger",
    "tulip", "walrus", "willow", "zephyr",
];

/// Readable random counter name, e.g. `brave-otter-0412`. Always a valid key.
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("counter");
    format!("{adjective}-{noun}-{:04}", rng.gen_range(0..10_000))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CounterMeta {
    created: u64,
    ttl_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    pub initial: i64,
    pub ttl: Duration,
    pub overwrite: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            initial: 0,
            ttl: BASE_TTL_PERIOD,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Created {
    pub key: CounterKey,
    pub value: i64,
    pub ttl: Duration,
    pub admin_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterInfo {
    pub key: CounterKey,
    pub value: Option<i64>,
    pub ttl_remaining: Option<Duration>,
    /// Unix seconds; only known for counters made by `create`.
    pub created: Option<u64>,
}

impl CounterInfo {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }
}

/// Static knobs resolved from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct CounterPolicy {
    /// Whether `hit` on an unknown key creates it.
    pub implicit_create: bool,
}

impl Default for CounterPolicy {
    fn default() -> Self {
        Self { implicit_create: true }
    }
}

pub struct CounterStore {
    store: SharedStore,
    notifier: Arc<ChangeNotifier>,
    policy: CounterPolicy,
}

fn check_ttl(ttl: Duration) -> Result<Duration> {
    if ttl.is_zero() {
        return Err(HitcountError::InvalidTtl("ttl must be positive".into()));
    }
    if ttl > BASE_TTL_PERIOD {
        return Err(HitcountError::InvalidTtl(format!(
            "ttl must not exceed {}s",
            BASE_TTL_PERIOD.as_secs()
        )));
    }
    Ok(ttl)
}

impl CounterStore {
    pub fn new(store: SharedStore, notifier: Arc<ChangeNotifier>, policy: CounterPolicy) -> Self {
        Self { store, notifier, policy }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub async fn create(&self, key: &CounterKey, opts: CreateOptions) -> Result<Created> {
        let ttl = check_ttl(opts.ttl)?;
        let cond = if opts.overwrite { SetCondition::Always } else { SetCondition::IfAbsent };

        let out = self
            .store
            .set_int(&value_slot(key), opts.initial, cond, Expiry::Set(ttl))
            .await?;
        if !out.applied {
            return Err(HitcountError::AlreadyExists);
        }

        let admin_key = match self.write_credentials(key, ttl).await {
            Ok(admin_key) => admin_key,
            Err(e) => {
                self.rollback_create(key).await;
                return Err(e);
            }
        };
        self.notifier.publish(key, opts.initial);
        tracing::debug!(%key, initial = opts.initial, ttl_secs = ttl.as_secs(), "counter created");

        Ok(Created {
            key: key.clone(),
            value: opts.initial,
            ttl,
            admin_key,
        })
    }

    /// Admin key and metadata for a freshly committed value.
    async fn write_credentials(&self, key: &CounterKey, ttl: Duration) -> Result<String> {
        let admin_key = generate_admin_key();
        self.store.set_text(&admin_slot(key), &admin_key, Some(ttl)).await?;

        let meta = CounterMeta { created: unix_now(), ttl_secs: ttl.as_secs() };
        let meta = serde_json::to_string(&meta)
            .map_err(|e| HitcountError::Internal(format!("meta encode failed: {e}")))?;
        self.store.set_text(&meta_slot(key), &meta, Some(ttl)).await?;
        Ok(admin_key)
    }

    /// Undo a partial create so a retry does not hit `AlreadyExists`.
    async fn rollback_create(&self, key: &CounterKey) {
        for slot in [value_slot(key), admin_slot(key), meta_slot(key)] {
            if let Err(e) = self.store.delete(&slot).await {
                tracing::warn!(%key, slot = slot.as_str(), error = %e, "create rollback failed");
            }
        }
    }

    /// Atomically add `delta`. Creates the counter (value `delta`, default TTL)
    /// when implicit creation is enabled.
    pub async fn hit(&self, key: &CounterKey, delta: i64) -> Result<i64> {
        let mode = if self.policy.implicit_create {
            IncrMode::Upsert { ttl: Some(BASE_TTL_PERIOD) }
        } else {
            IncrMode::ExistingOnly
        };

        let value = self
            .store
            .incr_by(&value_slot(key), delta, mode)
            .await?
            .ok_or(HitcountError::NotFound)?;

        self.notifier.publish(key, value);
        Ok(value)
    }

    pub async fn get(&self, key: &CounterKey) -> Result<i64> {
        self.store
            .get_int(&value_slot(key))
            .await?
            .ok_or(HitcountError::NotFound)
    }

    /// Set an absolute value; returns the previous one (`None` for an upserted counter).
    pub async fn set(&self, key: &CounterKey, value: i64, upsert: bool) -> Result<Option<i64>> {
        let (cond, expiry) = if upsert {
            (SetCondition::Always, Expiry::KeepOrSet(BASE_TTL_PERIOD))
        } else {
            (SetCondition::IfExists, Expiry::Keep)
        };

        let out = self.store.set_int(&value_slot(key), value, cond, expiry).await?;
        if !out.applied {
            return Err(HitcountError::NotFound);
        }

        self.notifier.publish(key, value);
        Ok(out.previous)
    }

    /// Value back to 0 with the TTL policy the counter was created with.
    pub async fn reset(&self, key: &CounterKey) -> Result<()> {
        let ttl = self.ttl_policy(key).await?;

        let out = self
            .store
            .set_int(&value_slot(key), 0, SetCondition::IfExists, Expiry::Set(ttl))
            .await?;
        if !out.applied {
            return Err(HitcountError::NotFound);
        }
        self.store.expire(&admin_slot(key), ttl).await?;
        self.store.expire(&meta_slot(key), ttl).await?;

        self.notifier.publish(key, 0);
        Ok(())
    }

    /// Idempotent.
    pub async fn delete(&self, key: &CounterKey) -> Result<()> {
        let existed = self.store.delete(&value_slot(key)).await?;
        self.store.delete(&admin_slot(key)).await?;
        self.store.delete(&meta_slot(key)).await?;
        if existed {
            tracing::debug!(%key, "counter deleted");
        }
        Ok(())
    }

    pub async fn info(&self, key: &CounterKey) -> Result<CounterInfo> {
        let value = self.store.get_int(&value_slot(key)).await?;
        if value.is_none() {
            return Ok(CounterInfo {
                key: key.clone(),
                value: None,
                ttl_remaining: None,
                created: None,
            });
        }

        let ttl_remaining = match self.store.ttl(&value_slot(key)).await? {
            TtlState::Expires(d) => Some(d),
            TtlState::Persistent | TtlState::Missing => None,
        };
        let created = self.meta(key).await?.map(|m| m.created);

        Ok(CounterInfo {
            key: key.clone(),
            value,
            ttl_remaining,
            created,
        })
    }

    async fn meta(&self, key: &CounterKey) -> Result<Option<CounterMeta>> {
        let Some(raw) = self.store.get_text(&meta_slot(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(m) => Ok(Some(m)),
            Err(e) => {
                tracing::warn!(%key, error = %e, "unreadable counter metadata");
                Ok(None)
            }
        }
    }

    async fn ttl_policy(&self, key: &CounterKey) -> Result<Duration> {
        Ok(self
            .meta(key)
            .await?
            .map(|m| Duration::from_secs(m.ttl_secs))
            .filter(|d| !d.is_zero())
            .unwrap_or(BASE_TTL_PERIOD))
    }
}
