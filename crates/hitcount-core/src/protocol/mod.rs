//! Wire types shared by the gateway and clients.
//!
//! - `reply`: JSON bodies for request/response endpoints.
//! - `event`: the per-event payload of the live value stream.

pub mod event;
pub mod reply;

pub use event::StreamEvent;
pub use reply::{CreatedReply, ErrorReply, InfoReply, StatusReply, ValueReply};
