#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use hitcount_gateway::engine::{Admission, RateLimitPolicy, RateLimiter};
use hitcount_gateway::store::testutil::UnavailableStore;
use hitcount_gateway::store::{IncrMode, KvStore, MemoryStore, SharedStore, TtlState};

const WINDOW: Duration = Duration::from_secs(10);

fn limiter(store: SharedStore, budget: u64) -> RateLimiter {
    RateLimiter::new(store, RateLimitPolicy { enabled: true, budget, window: WINDOW })
}

#[tokio::test(start_paused = true)]
async fn budget_exhaustion_then_new_window() {
    let rl = limiter(Arc::new(MemoryStore::new()), 3);

    for remaining in [2, 1, 0] {
        assert_eq!(rl.admit("203.0.113.9").await, Admission::Allowed { remaining });
    }
    assert_eq!(rl.admit("203.0.113.9").await, Admission::Denied { retry_after: WINDOW });

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(
        rl.admit("203.0.113.9").await,
        Admission::Denied { retry_after: Duration::from_secs(6) }
    );

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(rl.admit("203.0.113.9").await, Admission::Allowed { remaining: 2 });
}

#[tokio::test(start_paused = true)]
async fn buckets_are_per_fingerprint() {
    let rl = limiter(Arc::new(MemoryStore::new()), 1);

    assert!(rl.admit("10.0.0.1").await.is_allowed());
    assert!(!rl.admit("10.0.0.1").await.is_allowed());
    assert!(rl.admit("10.0.0.2").await.is_allowed());
}

#[tokio::test(start_paused = true)]
async fn bucket_without_expiry_is_repaired() {
    let store = Arc::new(MemoryStore::new());
    store
        .incr_by("R:10.0.0.1", 5, IncrMode::Upsert { ttl: None })
        .await
        .unwrap();
    let rl = limiter(store.clone(), 3);

    assert_eq!(rl.admit("10.0.0.1").await, Admission::Denied { retry_after: WINDOW });
    assert_eq!(store.ttl("R:10.0.0.1").await.unwrap(), TtlState::Expires(WINDOW));

    tokio::time::advance(WINDOW).await;
    assert!(rl.admit("10.0.0.1").await.is_allowed());
}

#[tokio::test(start_paused = true)]
async fn sparse_client_on_bucket_without_expiry_is_never_denied() {
    let store = Arc::new(MemoryStore::new());
    store
        .incr_by("R:10.0.0.1", 1, IncrMode::Upsert { ttl: None })
        .await
        .unwrap();
    let rl = limiter(store.clone(), 3);

    assert_eq!(rl.admit("10.0.0.1").await, Admission::Allowed { remaining: 1 });
    assert_eq!(store.ttl("R:10.0.0.1").await.unwrap(), TtlState::Expires(WINDOW));

    for _ in 0..10 {
        tokio::time::advance(2 * WINDOW).await;
        assert_eq!(rl.admit("10.0.0.1").await, Admission::Allowed { remaining: 2 });
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_bucket_carries_its_expiry() {
    let store = Arc::new(MemoryStore::new());
    let rl = limiter(store.clone(), 3);

    assert!(rl.admit("10.0.0.1").await.is_allowed());
    assert_eq!(store.ttl("R:10.0.0.1").await.unwrap(), TtlState::Expires(WINDOW));
}

#[tokio::test]
async fn store_outage_fails_open() {
    let store = Arc::new(UnavailableStore::down());
    let rl = limiter(store.clone(), 1);

    for _ in 0..5 {
        assert_eq!(rl.admit("10.0.0.1").await, Admission::Allowed { remaining: 1 });
    }

    store.set_down(false);
    assert!(rl.admit("10.0.0.1").await.is_allowed());
    assert!(!rl.admit("10.0.0.1").await.is_allowed());
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let store = Arc::new(MemoryStore::new());
    let rl = RateLimiter::new(
        store.clone(),
        RateLimitPolicy { enabled: false, budget: 1, window: WINDOW },
    );

    for _ in 0..10 {
        assert!(rl.admit("10.0.0.1").await.is_allowed());
    }
    assert_eq!(store.key_count().await.unwrap(), 0);
}
