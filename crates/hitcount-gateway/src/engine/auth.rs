//! Authorization capability for mutating endpoints.
//!
//! The engine only asks "may this caller mutate this counter?". The admin-key
//! implementation answers it by comparing the bearer token with the secret
//! stored next to the counter at creation.

use async_trait::async_trait;

use hitcount_core::{CounterKey, Result};

use crate::engine::counter::admin_slot;
use crate::store::SharedStore;

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(&self, key: &CounterKey, bearer: Option<&str>) -> Result<bool>;
}

pub struct AdminKeyAuthorizer {
    store: SharedStore,
}

impl AdminKeyAuthorizer {
    /// `store` must be the counter keyspace.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl Authorizer for AdminKeyAuthorizer {
    async fn is_authorized(&self, key: &CounterKey, bearer: Option<&str>) -> Result<bool> {
        let Some(token) = bearer.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        let Some(expected) = self.store.get_text(&admin_slot(key)).await? else {
            return Ok(false);
        };
        Ok(constant_time_eq(token.as_bytes(), expected.as_bytes()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
