use std::time::Duration;

use serde::Deserialize;
use hitcount_core::error::{HitcountError, Result};

use crate::engine::{CounterPolicy, RateLimitPolicy, StreamConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub counters: CounterSection,

    #[serde(default)]
    pub rate_limit: RateLimitSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub analytics: AnalyticsSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            store: StoreSection::default(),
            counters: CounterSection::default(),
            rate_limit: RateLimitSection::default(),
            stream: StreamSection::default(),
            analytics: AnalyticsSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HitcountError::UnsupportedVersion);
        }
        self.gateway.validate()?;
        self.store.validate()?;
        self.rate_limit.validate()?;
        self.stream.validate()?;
        Ok(())
    }

    /// Apply `HITCOUNT_*` overrides. `lookup` is usually `std::env::var(..).ok()`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("HITCOUNT_LISTEN") {
            self.gateway.listen = v;
        }
        if let Some(v) = lookup("HITCOUNT_COUNTER_DB") {
            self.store.counter_db = parse_env("HITCOUNT_COUNTER_DB", &v)?;
        }
        if let Some(v) = lookup("HITCOUNT_RATE_LIMIT_DB") {
            self.store.rate_limit_db = Some(parse_env("HITCOUNT_RATE_LIMIT_DB", &v)?);
        }
        if let Some(v) = lookup("HITCOUNT_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_bool("HITCOUNT_RATE_LIMIT_ENABLED", &v)?;
        }
        if let Some(v) = lookup("HITCOUNT_RATE_LIMIT_BUDGET") {
            self.rate_limit.budget = parse_env("HITCOUNT_RATE_LIMIT_BUDGET", &v)?;
        }
        if let Some(v) = lookup("HITCOUNT_RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = parse_env("HITCOUNT_RATE_LIMIT_WINDOW_SECS", &v)?;
        }
        if let Some(v) = lookup("HITCOUNT_ANALYTICS_ENABLED") {
            self.analytics.enabled = parse_bool("HITCOUNT_ANALYTICS_ENABLED", &v)?;
        }
        Ok(())
    }

    pub fn counter_policy(&self) -> CounterPolicy {
        CounterPolicy { implicit_create: self.counters.implicit_create }
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            enabled: self.rate_limit.enabled,
            budget: self.rate_limit.budget,
            window: Duration::from_secs(self.rate_limit.window_secs),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            keepalive: Duration::from_millis(self.stream.keepalive_ms),
            idle_timeout: Duration::from_millis(self.stream.idle_timeout_ms),
            buffer: self.stream.buffer,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, v: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| HitcountError::BadRequest(format!("{name}: invalid value {v:?}")))
}

fn parse_bool(name: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HitcountError::BadRequest(format!("{name}: expected a boolean, got {v:?}"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Reported by `/stats`; distinguishes replicas.
    #[serde(default = "default_instance")]
    pub instance: String,

    #[serde(default = "default_docs_url")]
    pub docs_url: String,

    /// Key rate limits by the first `X-Forwarded-For` hop instead of the peer address.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            instance: default_instance(),
            docs_url: default_docs_url(),
            trust_forwarded_for: false,
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(HitcountError::BadRequest(
                "gateway.listen must be a valid socket address".into(),
            ));
        }
        if self.instance.trim().is_empty() {
            return Err(HitcountError::BadRequest("gateway.instance must not be empty".into()));
        }
        if self.docs_url.trim().is_empty() {
            return Err(HitcountError::BadRequest("gateway.docs_url must not be empty".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_instance() -> String {
    "local".into()
}
fn default_docs_url() -> String {
    "https://example.invalid/docs".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_databases")]
    pub databases: usize,

    #[serde(default)]
    pub counter_db: usize,

    /// Defaults to `counter_db + 1`.
    #[serde(default)]
    pub rate_limit_db: Option<usize>,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            databases: default_databases(),
            counter_db: 0,
            rate_limit_db: None,
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl StoreSection {
    pub fn rate_limit_db(&self) -> usize {
        self.rate_limit_db.unwrap_or(self.counter_db + 1)
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=64).contains(&self.databases) {
            return Err(HitcountError::BadRequest(
                "store.databases must be between 2 and 64".into(),
            ));
        }
        if self.counter_db >= self.databases || self.rate_limit_db() >= self.databases {
            return Err(HitcountError::BadRequest(
                "store.counter_db and store.rate_limit_db must be below store.databases".into(),
            ));
        }
        if self.counter_db == self.rate_limit_db() {
            return Err(HitcountError::BadRequest(
                "store.rate_limit_db must differ from store.counter_db".into(),
            ));
        }
        if !(100..=60_000).contains(&self.sweep_interval_ms) {
            return Err(HitcountError::BadRequest(
                "store.sweep_interval_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_databases() -> usize {
    16
}
fn default_sweep_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterSection {
    #[serde(default = "default_true")]
    pub implicit_create: bool,
}

impl Default for CounterSection {
    fn default() -> Self {
        Self { implicit_create: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_budget")]
    pub budget: u64,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: false,
            budget: default_budget(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitSection {
    pub fn validate(&self) -> Result<()> {
        if self.budget == 0 {
            return Err(HitcountError::BadRequest("rate_limit.budget must be at least 1".into()));
        }
        if !(1..=86_400).contains(&self.window_secs) {
            return Err(HitcountError::BadRequest(
                "rate_limit.window_secs must be between 1 and 86400".into(),
            ));
        }
        Ok(())
    }
}

fn default_budget() -> u64 {
    30
}
fn default_window_secs() -> u64 {
    3
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            keepalive_ms: default_keepalive_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            buffer: default_buffer(),
        }
    }
}

impl StreamSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120_000).contains(&self.keepalive_ms) {
            return Err(HitcountError::BadRequest(
                "stream.keepalive_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(1000..=600_000).contains(&self.idle_timeout_ms) {
            return Err(HitcountError::BadRequest(
                "stream.idle_timeout_ms must be between 1000 and 600000".into(),
            ));
        }
        if !(1..=1024).contains(&self.buffer) {
            return Err(HitcountError::BadRequest(
                "stream.buffer must be between 1 and 1024".into(),
            ));
        }
        Ok(())
    }
}

fn default_keepalive_ms() -> u64 {
    5000
}
fn default_idle_timeout_ms() -> u64 {
    30000
}
fn default_buffer() -> usize {
    16
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsSection {
    /// Emit one structured access-log event per request (target `analytics`).
    #[serde(default)]
    pub enabled: bool,
}
