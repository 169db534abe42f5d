//! Axum router wiring.
//!
//! Counter routes sit behind the rate limiter; ops routes do not. Everything,
//! including the docs fallback, goes through request tracking.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::ops;
use crate::transport::{http, middleware, sse};

pub fn build_router(state: AppState) -> Router {
    let counters = Router::new()
        .route("/get/:namespace/*key", get(http::get_value))
        .route("/hit/:namespace/*key", get(http::hit))
        .route("/stream/:namespace/*key", get(sse::stream_value))
        .route("/info/:namespace/*key", get(http::info))
        .route("/create", get(http::create_random).post(http::create_random))
        .route("/create/:namespace/*key", get(http::create).post(http::create))
        .route("/set/:namespace/*key", post(http::set))
        .route("/reset/:namespace/*key", post(http::reset))
        .route("/update/:namespace/*key", post(http::update))
        .route("/delete/:namespace/*key", post(http::delete))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    let ops = Router::new()
        .route("/healthcheck", get(ops::healthcheck))
        .route("/readyz", get(ops::readyz))
        .route("/stats", get(ops::stats))
        .route("/metrics", get(ops::metrics))
        .route("/docs", get(ops::docs));

    counters
        .merge(ops)
        .fallback(ops::docs)
        .layer(from_fn_with_state(state.clone(), middleware::track))
        .with_state(state)
}
