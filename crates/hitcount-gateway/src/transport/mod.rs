//! HTTP transport.
//!
//! Request/response counter endpoints, the SSE value stream, and the request
//! middleware (rate limiting, stats and access logging). Handlers validate
//! counter identity once and hand typed keys to the engine.

pub mod error;
pub mod http;
pub mod middleware;
pub mod sse;

pub use error::ApiError;
