//! Live value stream sessions.
//!
//! Lifecycle: `Connecting -> Streaming -> Closed`.
//! - Connecting: subscribe first, then read the current value, so a change
//!   racing the open is seen at least once. A missing counter rejects the
//!   stream before any output. The current value is queued as event #1.
//! - Streaming: one spawned task per connection. On a change event or a
//!   keep-alive tick it reads the current value and pushes it to the
//!   connection's bounded queue.
//! - Closed: receiver dropped (client gone), shutdown signal, counter
//!   vanished, store failure, or a push that stays blocked past the idle
//!   timeout. The subscription and the active-stream gauge are released by
//!   drop on every exit path.
//!
//! There is no resume: a reconnect starts a fresh session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tracing::Instrument;

use hitcount_core::protocol::StreamEvent;
use hitcount_core::{CounterKey, HitcountError, Result};

use crate::engine::counter::CounterStore;
use crate::engine::notifier::Subscription;
use crate::obs::GatewayMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientGone,
    Shutdown,
    CounterGone,
    StoreError,
    WriteTimeout,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::ClientGone => "client_gone",
            CloseReason::Shutdown => "shutdown",
            CloseReason::CounterGone => "counter_gone",
            CloseReason::StoreError => "store_error",
            CloseReason::WriteTimeout => "write_timeout",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub keepalive: Duration,
    /// How long a push may stay blocked on a client that is not reading.
    pub idle_timeout: Duration,
    /// Per-connection queue depth.
    pub buffer: usize,
}

/// An opened stream: the event queue for the transport, the session task, and
/// a view of the session's lifecycle state.
pub struct OpenedStream {
    pub events: mpsc::Receiver<StreamEvent>,
    pub task: JoinHandle<CloseReason>,
    pub state: watch::Receiver<SessionState>,
}

pub struct StreamSessionManager {
    counters: Arc<CounterStore>,
    metrics: Arc<GatewayMetrics>,
    cfg: StreamConfig,
    shutdown: watch::Receiver<bool>,
}

impl StreamSessionManager {
    pub fn new(
        counters: Arc<CounterStore>,
        metrics: Arc<GatewayMetrics>,
        cfg: StreamConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { counters, metrics, cfg, shutdown }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.cfg
    }

    pub async fn open(&self, key: CounterKey) -> Result<OpenedStream> {
        if *self.shutdown.borrow() {
            return Err(HitcountError::StoreUnavailable("server shutting down".into()));
        }

        let subscription = self.counters.notifier().subscribe(&key);
        let value = self.counters.get(&key).await?;

        let (tx, rx) = mpsc::channel(self.cfg.buffer.max(1));
        tx.try_send(StreamEvent::new(value))
            .map_err(|_| HitcountError::Internal("stream queue rejected first event".into()))?;

        let (state, state_rx) = watch::channel(SessionState::Connecting);
        let session = StreamSession {
            key: key.clone(),
            state,
            last_value: value,
            counters: Arc::clone(&self.counters),
            subscription,
            tx,
            shutdown: self.shutdown.clone(),
            cfg: self.cfg,
            _active: ActiveStream::new(Arc::clone(&self.metrics)),
            metrics: Arc::clone(&self.metrics),
        };

        let span = tracing::info_span!("stream", %key);
        let task = tokio::spawn(session.run().instrument(span));
        Ok(OpenedStream { events: rx, task, state: state_rx })
    }
}

/// Holds the active-stream gauge up for the lifetime of a session.
struct ActiveStream {
    metrics: Arc<GatewayMetrics>,
}

impl ActiveStream {
    fn new(metrics: Arc<GatewayMetrics>) -> Self {
        metrics.streams_active.inc(&[]);
        Self { metrics }
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.metrics.streams_active.dec(&[]);
    }
}

enum Wake {
    Changed,
    KeepAlive,
}

struct StreamSession {
    key: CounterKey,
    state: watch::Sender<SessionState>,
    last_value: i64,
    counters: Arc<CounterStore>,
    subscription: Subscription,
    tx: mpsc::Sender<StreamEvent>,
    shutdown: watch::Receiver<bool>,
    cfg: StreamConfig,
    metrics: Arc<GatewayMetrics>,
    _active: ActiveStream,
}

impl StreamSession {
    async fn run(mut self) -> CloseReason {
        self.state.send_replace(SessionState::Streaming);
        tracing::debug!(first = self.last_value, "stream open");

        let reason = self.stream_loop().await;

        self.state.send_replace(SessionState::Closed);
        self.metrics.stream_closes.inc(&[("reason", reason.as_str())]);
        tracing::debug!(reason = reason.as_str(), "stream closed");
        reason
    }

    async fn stream_loop(&mut self) -> CloseReason {
        let keepalive = self.cfg.keepalive;
        let mut tick = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                _ = self.tx.closed() => return CloseReason::ClientGone,

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return CloseReason::Shutdown;
                    }
                    continue;
                }

                ev = self.subscription.recv() => match ev {
                    Some(_) => Wake::Changed,
                    None => return CloseReason::Shutdown,
                },

                _ = tick.tick() => Wake::KeepAlive,
            };

            let value = match self.counters.get(&self.key).await {
                Ok(v) => v,
                Err(HitcountError::NotFound) => return CloseReason::CounterGone,
                Err(e) => {
                    tracing::warn!(error = %e, "stream read failed");
                    return CloseReason::StoreError;
                }
            };

            match timeout(self.cfg.idle_timeout, self.tx.send(StreamEvent::new(value))).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return CloseReason::ClientGone,
                Err(_) => return CloseReason::WriteTimeout,
            }

            let kind = match wake {
                Wake::Changed => "change",
                Wake::KeepAlive => "keepalive",
            };
            self.metrics.stream_events.inc(&[("kind", kind)]);
            tracing::trace!(value, previous = self.last_value, kind, "stream event");
            self.last_value = value;
        }
    }
}
