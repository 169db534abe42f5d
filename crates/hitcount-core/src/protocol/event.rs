//! Stream event payload.
//!
//! One event per SSE `data:` line. Consumers must tolerate the same value
//! arriving twice (change events and keep-alives can coincide).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub value: i64,
}

impl StreamEvent {
    pub fn new(value: i64) -> Self {
        Self { value }
    }
}
