#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use hitcount_core::protocol::StreamEvent;
use hitcount_core::{validate, ClientCode, CounterKey, HitcountError};
use hitcount_gateway::engine::{
    ChangeNotifier, CloseReason, CounterPolicy, CounterStore, CreateOptions, OpenedStream,
    SessionState, StreamConfig, StreamSessionManager,
};
use hitcount_gateway::obs::GatewayMetrics;
use hitcount_gateway::store::MemoryStore;

struct Harness {
    counters: Arc<CounterStore>,
    metrics: Arc<GatewayMetrics>,
    streams: StreamSessionManager,
    shutdown: watch::Sender<bool>,
}

fn harness(cfg: StreamConfig) -> Harness {
    let counters = Arc::new(CounterStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ChangeNotifier::new(16)),
        CounterPolicy::default(),
    ));
    let metrics = Arc::new(GatewayMetrics::default());
    let (shutdown, rx) = watch::channel(false);
    let streams =
        StreamSessionManager::new(Arc::clone(&counters), Arc::clone(&metrics), cfg, rx);
    Harness { counters, metrics, streams, shutdown }
}

fn slow_keepalive() -> StreamConfig {
    StreamConfig {
        keepalive: Duration::from_secs(3600),
        idle_timeout: Duration::from_secs(30),
        buffer: 16,
    }
}

fn key() -> CounterKey {
    validate("test", "live").unwrap()
}

#[tokio::test]
async fn first_event_is_current_value() {
    let h = harness(slow_keepalive());
    h.counters.create(&key(), CreateOptions { initial: 4, ..Default::default() }).await.unwrap();
    h.counters.hit(&key(), 1).await.unwrap();

    let mut opened = h.streams.open(key()).await.unwrap();
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(5)));
}

#[tokio::test]
async fn changes_are_delivered_in_order() {
    let h = harness(slow_keepalive());
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    let mut opened = h.streams.open(key()).await.unwrap();
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(0)));

    h.counters.hit(&key(), 1).await.unwrap();
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(1)));

    h.counters.set(&key(), 10, false).await.unwrap();
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(10)));
}

#[tokio::test]
async fn missing_counter_is_rejected_before_any_output() {
    let h = harness(slow_keepalive());

    let err = h.streams.open(key()).await.err().expect("must reject");
    assert!(matches!(err, HitcountError::NotFound));
    assert_eq!(h.counters.notifier().subscriber_count(&key()), 0);
    assert_eq!(h.metrics.streams_active.get(&[]), 0);
}

#[tokio::test]
async fn client_disconnect_releases_the_subscription() {
    let h = harness(slow_keepalive());
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    let OpenedStream { events, task, .. } = h.streams.open(key()).await.unwrap();
    assert_eq!(h.counters.notifier().subscriber_count(&key()), 1);
    assert_eq!(h.metrics.streams_active.get(&[]), 1);

    drop(events);
    assert_eq!(task.await.unwrap(), CloseReason::ClientGone);

    assert_eq!(h.counters.notifier().subscriber_count(&key()), 0);
    assert_eq!(h.counters.notifier().watched_keys(), 0);
    assert_eq!(h.metrics.streams_active.get(&[]), 0);
    assert_eq!(h.metrics.stream_closes.get(&[("reason", "client_gone")]), 1);
}

#[tokio::test]
async fn lifecycle_runs_connecting_streaming_closed() {
    let h = harness(slow_keepalive());
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    let OpenedStream { events, task, mut state } = h.streams.open(key()).await.unwrap();
    assert_eq!(*state.borrow(), SessionState::Connecting);

    state.wait_for(|s| *s == SessionState::Streaming).await.unwrap();

    drop(events);
    assert_eq!(task.await.unwrap(), CloseReason::ClientGone);
    assert_eq!(*state.borrow(), SessionState::Closed);
}

#[tokio::test]
async fn shutdown_closes_live_streams_and_refuses_new_ones() {
    let h = harness(slow_keepalive());
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    let OpenedStream { mut events, task, .. } = h.streams.open(key()).await.unwrap();
    h.shutdown.send(true).unwrap();

    assert_eq!(task.await.unwrap(), CloseReason::Shutdown);
    assert_eq!(events.recv().await, Some(StreamEvent::new(0)));
    assert_eq!(events.recv().await, None);

    let err = h.streams.open(key()).await.err().expect("must refuse");
    assert_eq!(err.client_code(), ClientCode::Unavailable);
}

#[tokio::test(start_paused = true)]
async fn keepalive_repeats_the_current_value() {
    let h = harness(StreamConfig {
        keepalive: Duration::from_secs(1),
        idle_timeout: Duration::from_secs(30),
        buffer: 16,
    });
    h.counters.create(&key(), CreateOptions { initial: 3, ..Default::default() }).await.unwrap();

    let mut opened = h.streams.open(key()).await.unwrap();
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(3)));
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(3)));
    assert_eq!(opened.events.recv().await, Some(StreamEvent::new(3)));
}

#[tokio::test(start_paused = true)]
async fn deleted_counter_ends_the_stream() {
    let h = harness(StreamConfig {
        keepalive: Duration::from_secs(1),
        idle_timeout: Duration::from_secs(30),
        buffer: 16,
    });
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    let OpenedStream { events, task, .. } = h.streams.open(key()).await.unwrap();
    h.counters.delete(&key()).await.unwrap();

    assert_eq!(task.await.unwrap(), CloseReason::CounterGone);
    drop(events);
}

#[tokio::test(start_paused = true)]
async fn stalled_reader_times_out() {
    let h = harness(StreamConfig {
        keepalive: Duration::from_secs(1),
        idle_timeout: Duration::from_secs(2),
        buffer: 1,
    });
    h.counters.create(&key(), CreateOptions::default()).await.unwrap();

    // never read: the first event fills the queue
    let OpenedStream { events, task, .. } = h.streams.open(key()).await.unwrap();

    assert_eq!(task.await.unwrap(), CloseReason::WriteTimeout);
    assert_eq!(h.metrics.stream_closes.get(&[("reason", "write_timeout")]), 1);
    assert_eq!(h.metrics.streams_active.get(&[]), 0);
    drop(events);
}
