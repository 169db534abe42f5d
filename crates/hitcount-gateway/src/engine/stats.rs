//! Service-level request volume. Housekeeping only; nothing reads it to make decisions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

pub struct StatsAggregator {
    started: Instant,
    total: AtomicU64,
    by_route: DashMap<String, AtomicU64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub version: &'static str,
    pub instance: String,
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub requests_by_route: BTreeMap<String, u64>,
    pub db_keys: Option<usize>,
    pub active_streams: usize,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            by_route: DashMap::new(),
        }
    }

    pub fn record(&self, route: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if let Some(c) = self.by_route.get(route) {
            c.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.by_route
            .entry(route.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, instance: &str, db_keys: Option<usize>, active_streams: usize) -> StatsSnapshot {
        StatsSnapshot {
            version: env!("CARGO_PKG_VERSION"),
            instance: instance.to_string(),
            uptime_secs: self.uptime().as_secs(),
            total_requests: self.total(),
            requests_by_route: self
                .by_route
                .iter()
                .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
                .collect(),
            db_keys,
            active_streams,
        }
    }
}

/// `1h2m3s`-style rendering for the health endpoint.
pub fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
