//! Counter & rate-limit engine.
//!
//! Every component takes its store handle (and collaborators) through its
//! constructor; there are no process-wide singletons. The notifier's
//! subscriber table is the only shared mutable in-process state.

pub mod auth;
pub mod counter;
pub mod limiter;
pub mod notifier;
pub mod stats;
pub mod stream;

pub use auth::{AdminKeyAuthorizer, Authorizer};
pub use counter::{CounterInfo, CounterPolicy, CounterStore, CreateOptions, Created};
pub use limiter::{Admission, RateLimitPolicy, RateLimiter};
pub use notifier::{ChangeNotifier, Subscription};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use stream::{CloseReason, OpenedStream, SessionState, StreamConfig, StreamSessionManager};
