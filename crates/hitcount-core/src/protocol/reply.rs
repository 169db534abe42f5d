//! JSON reply bodies returned by the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::error::HitcountError;

/// `{"value": N}` for get/hit/set/update/reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueReply {
    pub value: i64,
}

/// Returned once by `create`; `admin_key` is not retrievable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedReply {
    pub namespace: String,
    pub key: String,
    pub value: i64,
    pub admin_key: String,
}

/// Counter introspection. `value` and the `expires_*` fields are null when the counter does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoReply {
    pub namespace: String,
    pub key: String,
    pub exists: bool,
    pub value: Option<i64>,
    /// Remaining lifetime in whole seconds.
    pub expires_in: Option<u64>,
    /// Absolute expiry as unix seconds.
    pub expires_at: Option<u64>,
    /// Creation time as unix seconds, when known.
    pub created: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
}

impl StatusReply {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub message: String,
}

impl From<&HitcountError> for ErrorReply {
    fn from(e: &HitcountError) -> Self {
        Self {
            error: e.client_code().as_str().to_string(),
            message: e.to_string(),
        }
    }
}
