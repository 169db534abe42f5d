//! hitcount core: counter identity rules, wire types, and the error surface.
//!
//! This crate is transport- and runtime-agnostic so it can be shared by the
//! gateway, client tooling and tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `HitcountError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod key;
pub mod limits;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, HitcountError, Result};
pub use key::{validate, CounterKey, ValidationError};
