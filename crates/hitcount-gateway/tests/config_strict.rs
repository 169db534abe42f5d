#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;

use hitcount_gateway::config::{self, GatewayConfig};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8080"
rate_limit:
  enabled: true
  budgt: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.store.counter_db, 0);
    assert_eq!(cfg.store.rate_limit_db(), 1);
    assert!(cfg.counters.implicit_create);
    assert!(!cfg.rate_limit.enabled);
    assert!(!cfg.analytics.enabled);
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn counter_and_rate_limit_db_must_differ() {
    let bad = r#"
version: 1
store:
  counter_db: 3
  rate_limit_db: 3
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn out_of_range_values_are_rejected() {
    for bad in [
        "version: 1\nrate_limit: { budget: 0 }\n",
        "version: 1\nrate_limit: { window_secs: 0 }\n",
        "version: 1\nstream: { buffer: 0 }\n",
        "version: 1\nstore: { databases: 1 }\n",
        "version: 1\nstore: { counter_db: 15 }\n",
        "version: 1\ngateway: { listen: \"not an address\" }\n",
    ] {
        assert!(config::load_from_str(bad).is_err(), "accepted: {bad}");
    }
}

#[test]
fn env_overrides_apply_on_top_of_file() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("HITCOUNT_RATE_LIMIT_ENABLED", "true"),
        ("HITCOUNT_RATE_LIMIT_BUDGET", "5"),
        ("HITCOUNT_COUNTER_DB", "4"),
        ("HITCOUNT_ANALYTICS_ENABLED", "1"),
    ]);
    let mut cfg = GatewayConfig::default();
    cfg.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
    cfg.validate().unwrap();

    assert!(cfg.rate_limit.enabled);
    assert_eq!(cfg.rate_limit.budget, 5);
    assert_eq!(cfg.store.counter_db, 4);
    assert_eq!(cfg.store.rate_limit_db(), 5);
    assert!(cfg.analytics.enabled);
}

#[test]
fn malformed_env_override_is_an_error() {
    let mut cfg = GatewayConfig::default();
    let err = cfg
        .apply_env(|k| (k == "HITCOUNT_RATE_LIMIT_ENABLED").then(|| "sometimes".to_string()))
        .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn resolve_without_file_uses_defaults() {
    let cfg = config::resolve(Some("/nonexistent/hitcount.yaml"), |_| None).unwrap();
    assert_eq!(cfg.gateway.listen, "0.0.0.0:8080");
    assert_eq!(cfg.rate_limit.budget, 30);
    assert_eq!(cfg.rate_limit.window_secs, 3);
}
