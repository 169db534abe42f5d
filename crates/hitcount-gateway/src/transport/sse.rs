//! `GET /stream/:namespace/*key` as Server-Sent Events.
//!
//! The session task owns the subscription; this side only drains its queue.
//! When the client goes away axum drops the body stream, which drops the
//! queue receiver and lets the session observe `ClientGone`.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures_util::stream::{self, Stream};

use crate::app_state::AppState;
use crate::transport::error::ApiError;
use crate::transport::http::counter_key;

pub async fn stream_value(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let opened = app.streams().open(key).await?;

    let events = stream::unfold(opened.events, |mut rx| async move {
        let ev = rx.recv().await?;
        let event = match Event::default().json_data(ev) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "stream event encode failed");
                Event::default().comment("encode failed")
            }
        };
        Some((Ok(event), rx))
    });

    Ok(Sse::new(events))
}
