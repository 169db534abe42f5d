//! Error -> HTTP response mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use hitcount_core::protocol::ErrorReply;
use hitcount_core::{ClientCode, HitcountError, ValidationError};

use crate::store::StoreError;

#[derive(Debug)]
pub struct ApiError(pub HitcountError);

impl From<HitcountError> for ApiError {
    fn from(e: HitcountError) -> Self {
        Self(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(e.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

pub fn status_of(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::BadRequest | ClientCode::UnsupportedVersion => StatusCode::BAD_REQUEST,
        ClientCode::AuthFailed => StatusCode::UNAUTHORIZED,
        ClientCode::NotFound => StatusCode::NOT_FOUND,
        ClientCode::AlreadyExists => StatusCode::CONFLICT,
        ClientCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ClientCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        if code == ClientCode::Internal {
            tracing::error!(error = %self.0, "request failed");
        }

        let mut res = (status_of(code), Json(ErrorReply::from(&self.0))).into_response();
        if let HitcountError::RateLimited { retry_after_secs } = self.0 {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        res
    }
}
