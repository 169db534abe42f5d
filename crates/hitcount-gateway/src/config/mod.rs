//! Gateway config loader (strict parsing, then environment overrides).

pub mod schema;

use std::fs;
use std::path::Path;

use hitcount_core::error::{HitcountError, Result};

pub use schema::{
    AnalyticsSection, CounterSection, GatewayConfig, GatewaySection, RateLimitSection,
    StoreSection, StreamSection,
};

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| HitcountError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| HitcountError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the startup config once: file (if present) or defaults, then env overrides.
pub fn resolve(path: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Result<GatewayConfig> {
    let mut cfg = match path {
        Some(p) if Path::new(p).exists() => load_from_file(p)?,
        Some(p) => {
            tracing::info!(path = p, "config file not found, using defaults");
            GatewayConfig::default()
        }
        None => GatewayConfig::default(),
    };
    cfg.apply_env(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}
