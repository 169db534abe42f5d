//! Request middleware.
//!
//! - `rate_limit`: per-client fixed-window admission, layered on counter routes only.
//! - `track`: per-route stats, request metrics, and the optional access log.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;

use hitcount_core::HitcountError;

use crate::app_state::AppState;
use crate::engine::limiter::retry_after_secs;
use crate::engine::Admission;
use crate::transport::error::ApiError;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REMAINING: &str = "x-ratelimit-remaining";

/// Client fingerprint for rate limiting: peer IP, or the first forwarded hop when trusted.
pub fn fingerprint(req: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let fp = fingerprint(&req, app.cfg().gateway.trust_forwarded_for);

    match app.limiter().admit(&fp).await {
        Admission::Allowed { remaining } => {
            app.metrics().rate_limit_decisions.inc(&[("decision", "allowed")]);
            let mut res = next.run(req).await;
            if app.limiter().policy().enabled {
                res.headers_mut().insert(REMAINING, HeaderValue::from(remaining));
            }
            res
        }
        Admission::Denied { retry_after } => {
            app.metrics().rate_limit_decisions.inc(&[("decision", "denied")]);
            tracing::debug!(client = %fp, ?retry_after, "rate limited");
            ApiError(HitcountError::RateLimited {
                retry_after_secs: retry_after_secs(retry_after),
            })
            .into_response()
        }
    }
}

/// `/hit/:namespace/*key` -> `hit`; unmatched requests -> `other`.
pub fn route_family(matched: Option<&MatchedPath>) -> &str {
    matched
        .map(MatchedPath::as_str)
        .and_then(|p| p.trim_start_matches('/').split('/').next())
        .filter(|first| !first.is_empty())
        .unwrap_or("other")
}

pub async fn track(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let route = route_family(req.extensions().get::<MatchedPath>()).to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    let elapsed = started.elapsed();
    let status = res.status();
    app.stats().record(&route);
    app.metrics()
        .http_requests
        .inc(&[("route", route.as_str()), ("status", status.as_str())]);
    app.metrics().http_duration.observe(&[("route", route.as_str())], elapsed);

    if app.cfg().analytics.enabled {
        tracing::info!(
            target: "analytics",
            %method,
            path = path.as_str(),
            route = route.as_str(),
            status = status.as_u16(),
            latency_us = elapsed.as_micros() as u64,
            "request"
        );
    }
    res
}
