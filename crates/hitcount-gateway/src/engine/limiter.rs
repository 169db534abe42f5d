//! Per-client fixed-window request budget.
//!
//! Each fingerprint owns a bucket `R:{fingerprint}` in a store slot that holds
//! nothing else. The increment that creates a bucket also sets its expiry in
//! the same atomic step; the window ends when the store expires the bucket, so
//! no sweep or timer is needed here. A bucket found without an expiry gets one
//! on the next request, admitted or not.
//!
//! Fails open: when the store cannot be reached the request is admitted and
//! a warning is logged.

use std::time::Duration;

use crate::store::{IncrMode, SharedStore, StoreResult, TtlState};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    /// Requests admitted per window.
    pub budget: u64,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u64 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

pub struct RateLimiter {
    store: SharedStore,
    policy: RateLimitPolicy,
}

fn bucket_slot(fingerprint: &str) -> String {
    format!("R:{fingerprint}")
}

impl RateLimiter {
    pub fn new(store: SharedStore, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub async fn admit(&self, fingerprint: &str) -> Admission {
        if !self.policy.enabled {
            return Admission::Allowed { remaining: self.policy.budget };
        }
        match self.try_admit(fingerprint).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(fingerprint, error = %e, "rate limit store unavailable, failing open");
                Admission::Allowed { remaining: self.policy.budget }
            }
        }
    }

    async fn try_admit(&self, fingerprint: &str) -> StoreResult<Admission> {
        let slot = bucket_slot(fingerprint);
        let window = self.policy.window;

        let count = self
            .store
            .incr_by(&slot, 1, IncrMode::Upsert { ttl: Some(window) })
            .await?
            .unwrap_or(1);

        // a fresh bucket got its expiry with the increment
        let remaining_window = if count == 1 {
            window
        } else {
            self.window_left(&slot).await?
        };

        let count = u64::try_from(count).unwrap_or(0);
        if count <= self.policy.budget {
            return Ok(Admission::Allowed { remaining: self.policy.budget - count });
        }
        Ok(Admission::Denied {
            retry_after: remaining_window.max(Duration::from_secs(1)),
        })
    }

    /// Time until the bucket's window closes; arms a missing expiry.
    async fn window_left(&self, slot: &str) -> StoreResult<Duration> {
        match self.store.ttl(slot).await? {
            TtlState::Expires(d) => Ok(d),
            TtlState::Persistent => {
                tracing::debug!(slot, "rate limit bucket had no expiry, arming it");
                self.store.expire(slot, self.policy.window).await?;
                Ok(self.policy.window)
            }
            TtlState::Missing => Ok(Duration::ZERO),
        }
    }
}

/// Whole seconds for a `Retry-After` header (rounded up, min 1).
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
