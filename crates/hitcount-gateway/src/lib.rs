//! hitcount gateway library entry.
//!
//! Wires the store, the counter/rate-limit engine, the HTTP transport, and
//! ops endpoints into one service. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod engine;
pub mod obs;
pub mod ops;
pub mod router;
pub mod store;
pub mod transport;
