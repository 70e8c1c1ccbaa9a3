//! Configuration loading tests
//!
//! Verifies the priority order: command line > environment > file > defaults.

use mix_listener::config::{ConfigBuilder, ConfigOverrides, MuxConfig, ENV_PREFIX};
use mix_listener::{MuxError, Network};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const ENV_VARS: [&str; 5] = ["LISTEN", "PROTOCOLS", "ROUTES", "QUEUE_CAPACITY", "NETWORK"];

fn clear_env() {
    for name in ENV_VARS {
        env::remove_var(format!("{}{}", ENV_PREFIX, name));
    }
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config file");
    file
}

#[test]
#[serial]
fn test_defaults_only() {
    clear_env();

    let config = ConfigBuilder::new().with_defaults().build().unwrap();
    assert_eq!(config, MuxConfig::default());
}

#[test]
#[serial]
fn test_config_priority() {
    clear_env();

    let file = config_file(
        r#"{
            "listen": "127.0.0.1:7000",
            "protocols": ["http", "flex"],
            "routes": { "http": "127.0.0.1:8000" },
            "queue_capacity": 8,
            "backlog": 64
        }"#,
    );

    env::set_var(format!("{}LISTEN", ENV_PREFIX), "127.0.0.1:7001");
    env::set_var(format!("{}QUEUE_CAPACITY", ENV_PREFIX), "16");
    env::set_var(format!("{}ROUTES", ENV_PREFIX), "flex=127.0.0.1:9000");

    let config = ConfigBuilder::new()
        .with_defaults()
        .with_file(file.path())
        .with_env(ENV_PREFIX)
        .with_cli(ConfigOverrides {
            listen: Some("127.0.0.1:7002".to_string()),
            ..Default::default()
        })
        .build();
    clear_env();
    let config = config.unwrap();

    // Command line beats environment and file
    assert_eq!(config.listen, "127.0.0.1:7002");
    // Environment beats file
    assert_eq!(config.queue_capacity, 16);
    // File beats defaults
    assert_eq!(config.backlog, 64);
    assert_eq!(config.protocols, vec!["http", "flex"]);
    // Routes from file and environment are merged
    assert_eq!(config.routes.get("http").map(String::as_str), Some("127.0.0.1:8000"));
    assert_eq!(config.routes.get("flex").map(String::as_str), Some("127.0.0.1:9000"));
}

#[test]
#[serial]
fn test_env_protocol_list_and_network() {
    clear_env();
    env::set_var(format!("{}PROTOCOLS", ENV_PREFIX), "flex, socks5");
    env::set_var(format!("{}NETWORK", ENV_PREFIX), "tcp4");
    env::set_var(format!("{}LISTEN", ENV_PREFIX), "127.0.0.1:7003");

    let config = ConfigBuilder::new().with_defaults().with_env(ENV_PREFIX).build();
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.protocols, vec!["flex", "socks5"]);
    assert_eq!(config.network, Network::Tcp4);
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    env::set_var(format!("{}QUEUE_CAPACITY", ENV_PREFIX), "lots");

    let result = ConfigBuilder::new().with_defaults().with_env(ENV_PREFIX).build();
    clear_env();

    assert!(matches!(result, Err(MuxError::Config(_))));
}

#[test]
#[serial]
fn test_missing_required_file() {
    clear_env();

    let result = ConfigBuilder::new()
        .with_defaults()
        .with_file("does-not-exist/mix-listener.json")
        .build();
    assert!(matches!(result, Err(MuxError::Config(_))));

    let config = ConfigBuilder::new()
        .with_defaults()
        .with_optional_file("does-not-exist/mix-listener.json")
        .build()
        .unwrap();
    assert_eq!(config, MuxConfig::default());
}

#[test]
#[serial]
fn test_malformed_file() {
    clear_env();
    let file = config_file("{ not json");

    let result = ConfigBuilder::new().with_defaults().with_file(file.path()).build();
    assert!(matches!(result, Err(MuxError::Config(_))));
}

#[test]
#[serial]
fn test_validation_can_be_skipped() {
    clear_env();
    let file = config_file(r#"{ "protocols": ["gopher"] }"#);

    let strict = ConfigBuilder::new().with_defaults().with_file(file.path()).build();
    assert!(matches!(strict, Err(MuxError::BuiltinNotFound(_))));

    let lenient = ConfigBuilder::new()
        .with_defaults()
        .with_file(file.path())
        .without_validation()
        .build()
        .unwrap();
    assert_eq!(lenient.protocols, vec!["gopher"]);
}

#[test]
#[serial]
fn test_invalid_log_level_uses_default() {
    clear_env();
    let file = config_file(r#"{ "log_level": "chatty" }"#);

    let config = ConfigBuilder::new().with_defaults().with_file(file.path()).build().unwrap();
    assert_eq!(config.log_level, "info");
}
