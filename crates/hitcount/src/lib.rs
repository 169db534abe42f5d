//! Top-level facade crate for hitcount.
//!
//! Re-exports the core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use hitcount_core::*;
}

pub mod gateway {
    pub use hitcount_gateway::*;
}
