use std::collections::HashMap;

use hatchetest_errors::HatchetestError;

use crate::{split_host_port, AppConfig};

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_defaults_when_environment_is_empty() {
    let config = AppConfig::from_vars(HashMap::new()).unwrap();

    assert_eq!(config, AppConfig::default());
    assert_eq!(config.port, 8080);
    assert_eq!(config.host, "localhost");
    assert_eq!(config.log_level, "info");
    assert_eq!(config.hatchet_host_port, "localhost:7070");
    assert_eq!(config.hatchet_tls_strategy, "tls");
    assert!(config.hatchet_token.is_empty());
    assert!(config.database_url.is_empty());
}

#[test]
fn test_environment_overrides() {
    let config = AppConfig::from_vars(vars(&[
        ("PORT", "9090"),
        ("HOST", "0.0.0.0"),
        ("LOG_LEVEL", "debug"),
        ("HATCHET_CLIENT_SERVER_URL", "http://localhost:8888"),
        ("HATCHET_CLIENT_HOST_PORT", "engine:7077"),
        ("HATCHET_CLIENT_TOKEN", "eyJa.eyJb.c"),
        ("HATCHET_CLIENT_TLS_STRATEGY", "none"),
        ("DATABASE_URL", "postgres://localhost/hatchet"),
    ]))
    .unwrap();

    assert_eq!(config.port, 9090);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.hatchet_server_url, "http://localhost:8888");
    assert_eq!(config.hatchet_host_port, "engine:7077");
    assert_eq!(config.hatchet_token, "eyJa.eyJb.c");
    assert_eq!(config.hatchet_tls_strategy, "none");
    assert_eq!(config.database_url, "postgres://localhost/hatchet");
    assert_eq!(config.bind_address(), "0.0.0.0:9090");
}

#[test]
fn test_invalid_port_is_rejected() {
    let result = AppConfig::from_vars(vars(&[("PORT", "not-a-port")]));
    assert!(matches!(result, Err(HatchetestError::Configuration(_))));
}

#[test]
fn test_validate_requires_token() {
    let config = AppConfig {
        hatchet_server_url: "http://localhost:8888".to_string(),
        ..AppConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(HatchetestError::MissingSetting("HATCHET_CLIENT_TOKEN"))
    ));
}

#[test]
fn test_validate_requires_server_url() {
    let config = AppConfig {
        hatchet_token: "eyJa.eyJb.c".to_string(),
        ..AppConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(HatchetestError::MissingSetting("HATCHET_CLIENT_SERVER_URL"))
    ));
}

#[test]
fn test_validate_rejects_malformed_host_port() {
    let config = AppConfig {
        hatchet_token: "eyJa.eyJb.c".to_string(),
        hatchet_server_url: "http://localhost:8888".to_string(),
        hatchet_host_port: "localhost".to_string(),
        ..AppConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(HatchetestError::InvalidHostPort { .. })
    ));
}

#[test]
fn test_validate_accepts_complete_config() {
    let config = AppConfig {
        hatchet_token: "eyJa.eyJb.c".to_string(),
        hatchet_server_url: "http://localhost:8888".to_string(),
        ..AppConfig::default()
    };
    assert!(config.validate().is_ok());
    assert_eq!(
        config.hatchet_address().unwrap(),
        ("localhost".to_string(), 7070)
    );
}

#[test]
fn test_split_host_port() {
    assert_eq!(
        split_host_port("localhost:7077").unwrap(),
        ("localhost".to_string(), 7077)
    );
    assert_eq!(
        split_host_port("[::1]:7077").unwrap(),
        ("::1".to_string(), 7077)
    );
    assert_eq!(split_host_port(":7077").unwrap(), (String::new(), 7077));

    assert!(split_host_port("localhost").is_err());
    assert!(split_host_port("localhost:abc").is_err());
    assert!(split_host_port("localhost:70000").is_err());
    assert!(split_host_port("::1:7077").is_err());
    assert!(split_host_port("[::1:7077").is_err());
}
