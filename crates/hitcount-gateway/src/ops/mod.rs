//! Operational HTTP endpoints.
//!
//! - `/healthcheck` : liveness plus uptime
//! - `/readyz`      : readiness (503 when draining or the counter store is down)
//! - `/stats`       : request volume, keyspace size, live streams
//! - `/metrics`     : Prometheus text format
//! - `/docs`        : permanent redirect to the API docs

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::engine::stats::{format_uptime, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct HealthReply {
    pub status: &'static str,
    pub uptime: String,
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok",
        uptime: format_uptime(state.stats().uptime()),
    })
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining");
    }
    match state.counter_store().ping().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    let db_keys = state.counter_store().key_count().await.ok();
    let active = state.counters().notifier().total_subscribers();
    Json(state.stats().snapshot(&state.cfg().gateway.instance, db_keys, active))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let notifier = state.counters().notifier();
    let mut extra = vec![
        ("hitcount_watched_keys", notifier.watched_keys() as u64),
        ("hitcount_stream_subscribers", notifier.total_subscribers() as u64),
    ];
    if let Ok(n) = state.counter_store().key_count().await {
        extra.push(("hitcount_db_keys", n as u64));
    }
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn docs(State(state): State<AppState>) -> Redirect {
    Redirect::permanent(&state.cfg().gateway.docs_url)
}
