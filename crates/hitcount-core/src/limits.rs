//! Identity and expiry bounds shared by the validator and the counter store.

use std::time::Duration;

/// Minimum namespace/key length, in characters, after normalization.
pub const MIN_LENGTH: usize = 3;

/// Maximum namespace/key length, in characters, after normalization.
pub const MAX_LENGTH: usize = 64;

/// Default counter lifetime (10 years). Also the upper bound for a per-create TTL.
pub const BASE_TTL_PERIOD: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

/// Namespace used when a counter is created without an explicit identity.
pub const DEFAULT_NAMESPACE: &str = "default";
