//! Shared application state for the hitcount gateway.
//!
//! Built once at startup from a resolved [`GatewayConfig`] and two store
//! handles (counter keyspace, rate-limit keyspace). Cloning is cheap.

use std::sync::Arc;

use tokio::sync::watch;

use hitcount_core::error::Result;

use crate::config::GatewayConfig;
use crate::engine::{
    AdminKeyAuthorizer, Authorizer, ChangeNotifier, CounterStore, RateLimiter, StatsAggregator,
    StreamSessionManager,
};
use crate::obs::GatewayMetrics;
use crate::store::{MemoryServer, SharedStore};

/// Events one slow stream subscriber may fall behind by before skipping ahead.
const NOTIFIER_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    counter_store: SharedStore,
    counters: Arc<CounterStore>,
    limiter: RateLimiter,
    authorizer: Arc<dyn Authorizer>,
    streams: StreamSessionManager,
    stats: StatsAggregator,
    metrics: Arc<GatewayMetrics>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Select the configured databases from `server` and wire the engine.
    pub fn new(cfg: GatewayConfig, server: &MemoryServer) -> Result<Self> {
        let counter_db = server.select(cfg.store.counter_db)?;
        let rate_limit_db = server.select(cfg.store.rate_limit_db())?;
        tracing::info!(
            counter_db = cfg.store.counter_db,
            rate_limit_db = cfg.store.rate_limit_db(),
            "store databases selected"
        );
        Self::with_stores(cfg, Arc::new(counter_db), Arc::new(rate_limit_db))
    }

    /// Wire the engine over explicit store handles.
    pub fn with_stores(
        cfg: GatewayConfig,
        counter_store: SharedStore,
        rate_limit_store: SharedStore,
    ) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(GatewayMetrics::default());
        let notifier = Arc::new(ChangeNotifier::new(NOTIFIER_CAPACITY));
        let counters = Arc::new(CounterStore::new(
            Arc::clone(&counter_store),
            notifier,
            cfg.counter_policy(),
        ));
        let limiter = RateLimiter::new(rate_limit_store, cfg.rate_limit_policy());
        let authorizer: Arc<dyn Authorizer> =
            Arc::new(AdminKeyAuthorizer::new(Arc::clone(&counter_store)));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let streams = StreamSessionManager::new(
            Arc::clone(&counters),
            Arc::clone(&metrics),
            cfg.stream_config(),
            shutdown_rx,
        );

        if cfg.rate_limit.enabled {
            tracing::info!(
                budget = cfg.rate_limit.budget,
                window_secs = cfg.rate_limit.window_secs,
                "rate limiting enabled"
            );
        }
        if cfg.analytics.enabled {
            tracing::info!("analytics enabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                counter_store,
                counters,
                limiter,
                authorizer,
                streams,
                stats: StatsAggregator::new(),
                metrics,
                shutdown,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn counters(&self) -> &CounterStore {
        &self.inner.counters
    }

    pub fn counter_store(&self) -> &SharedStore {
        &self.inner.counter_store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn authorizer(&self) -> &dyn Authorizer {
        self.inner.authorizer.as_ref()
    }

    pub fn streams(&self) -> &StreamSessionManager {
        &self.inner.streams
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.inner.stats
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// A receiver that flips to `true` when shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Close all live streams and mark the gateway as draining.
    pub fn begin_shutdown(&self) {
        self.inner.metrics.set_draining();
        let _ = self.inner.shutdown.send(true);
        tracing::info!("shutdown started, closing streams");
    }
}
