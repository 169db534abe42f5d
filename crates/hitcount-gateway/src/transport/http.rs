//! Counter endpoints.
//!
//! Every handler validates `(namespace, key)` first; mutating endpoints other
//! than `hit`/`create` also require the counter's admin key as a bearer token.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use hitcount_core::limits::{BASE_TTL_PERIOD, DEFAULT_NAMESPACE};
use hitcount_core::protocol::{CreatedReply, InfoReply, StatusReply, ValueReply};
use hitcount_core::{validate, CounterKey, HitcountError, Result};

use crate::app_state::AppState;
use crate::engine::auth::parse_bearer;
use crate::engine::counter::{random_name, unix_now, Created};
use crate::engine::CreateOptions;
use crate::transport::error::ApiError;

/// Fresh names drawn before giving up on a crowded default namespace.
const RANDOM_NAME_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    /// Initial value.
    #[serde(default)]
    pub initializer: Option<i64>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    #[serde(default)]
    pub value: Option<i64>,
}

impl ValueQuery {
    fn require(&self) -> Result<i64> {
        self.value
            .ok_or_else(|| HitcountError::BadRequest("missing query parameter: value".into()))
    }
}

pub(crate) fn counter_key(namespace: &str, key: &str) -> std::result::Result<CounterKey, ApiError> {
    Ok(validate(namespace, key.trim_start_matches('/'))?)
}

/// Count the op outcome, then hand the result back.
fn observed<T>(app: &AppState, op: &'static str, res: Result<T>) -> std::result::Result<T, ApiError> {
    let outcome = match &res {
        Ok(_) => "ok",
        Err(e) => e.client_code().as_str(),
    };
    app.metrics().counter_ops.inc(&[("op", op), ("outcome", outcome)]);
    res.map_err(ApiError::from)
}

async fn require_admin(app: &AppState, key: &CounterKey, headers: &HeaderMap) -> Result<()> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer);
    if app.authorizer().is_authorized(key, bearer).await? {
        Ok(())
    } else {
        Err(HitcountError::AuthFailed)
    }
}

fn create_options(q: &CreateQuery) -> CreateOptions {
    CreateOptions {
        initial: q.initializer.unwrap_or(0),
        ttl: q.ttl.map(Duration::from_secs).unwrap_or(BASE_TTL_PERIOD),
        overwrite: false,
    }
}

fn created_reply(c: Created) -> (StatusCode, Json<CreatedReply>) {
    (
        StatusCode::CREATED,
        Json(CreatedReply {
            namespace: c.key.namespace().to_string(),
            key: c.key.key().to_string(),
            value: c.value,
            admin_key: c.admin_key,
        }),
    )
}

pub async fn get_value(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> std::result::Result<Json<ValueReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let value = observed(&app, "get", app.counters().get(&key).await)?;
    Ok(Json(ValueReply { value }))
}

pub async fn hit(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> std::result::Result<Json<ValueReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let value = observed(&app, "hit", app.counters().hit(&key, 1).await)?;
    Ok(Json(ValueReply { value }))
}

pub async fn create(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(q): Query<CreateQuery>,
) -> std::result::Result<(StatusCode, Json<CreatedReply>), ApiError> {
    let key = counter_key(&namespace, &key)?;
    let created = observed(&app, "create", app.counters().create(&key, create_options(&q)).await)?;
    Ok(created_reply(created))
}

/// Create a counter with a random key in the default namespace.
pub async fn create_random(
    State(app): State<AppState>,
    Query(q): Query<CreateQuery>,
) -> std::result::Result<(StatusCode, Json<CreatedReply>), ApiError> {
    let opts = create_options(&q);
    let mut res = Err(HitcountError::AlreadyExists);
    for _ in 0..RANDOM_NAME_ATTEMPTS {
        let key = counter_key(DEFAULT_NAMESPACE, &random_name())?;
        res = app.counters().create(&key, opts).await;
        if !matches!(res, Err(HitcountError::AlreadyExists)) {
            break;
        }
    }
    let created = observed(&app, "create", res)?;
    Ok(created_reply(created))
}

pub async fn info(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> std::result::Result<Json<InfoReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let info = observed(&app, "info", app.counters().info(&key).await)?;

    let expires_in = info.ttl_remaining.map(|d| d.as_secs());
    Ok(Json(InfoReply {
        namespace: key.namespace().to_string(),
        key: key.key().to_string(),
        exists: info.exists(),
        value: info.value,
        expires_in,
        expires_at: expires_in.map(|s| unix_now() + s),
        created: info.created,
    }))
}

pub async fn set(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(q): Query<ValueQuery>,
    headers: HeaderMap,
) -> std::result::Result<Json<ValueReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let value = q.require()?;
    require_admin(&app, &key, &headers).await?;
    observed(&app, "set", app.counters().set(&key, value, false).await)?;
    Ok(Json(ValueReply { value }))
}

pub async fn reset(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> std::result::Result<Json<ValueReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    require_admin(&app, &key, &headers).await?;
    observed(&app, "reset", app.counters().reset(&key).await)?;
    Ok(Json(ValueReply { value: 0 }))
}

/// Add an arbitrary (possibly negative) delta.
pub async fn update(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(q): Query<ValueQuery>,
    headers: HeaderMap,
) -> std::result::Result<Json<ValueReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    let delta = q.require()?;
    require_admin(&app, &key, &headers).await?;
    let value = observed(&app, "update", app.counters().hit(&key, delta).await)?;
    Ok(Json(ValueReply { value }))
}

pub async fn delete(
    State(app): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> std::result::Result<Json<StatusReply>, ApiError> {
    let key = counter_key(&namespace, &key)?;
    require_admin(&app, &key, &headers).await?;
    observed(&app, "delete", app.counters().delete(&key).await)?;
    Ok(Json(StatusReply::ok()))
}
