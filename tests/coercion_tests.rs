//! Integration tests for typed getters over mixed sources.
//!
//! Environment and flag values always arrive as strings; file values keep
//! their parsed types. Both must read the same through the typed getters.

use layerconf::{Config, ConfigError, ConfigFormat, ConfigOptions, MapEnv};
use std::sync::Arc;
use std::time::Duration;

fn config_with_env(vars: &[(&str, &str)]) -> Config {
    Config::with_options(ConfigOptions {
        env_provider: Arc::new(MapEnv::new(vars.iter().copied())),
        ..ConfigOptions::default()
    })
}

const FILE: &str = r#"
[server]
port = 8080
debug = true
ratio = 0.5
timeout = "1m30s"
hosts = ["a", "b"]

[labels]
team = "core"
tier = 1
"#;

fn file_config(vars: &[(&str, &str)]) -> Config {
    let config = config_with_env(vars);
    config.read_config_str(FILE, ConfigFormat::Toml).unwrap();
    config
}

#[test]
fn test_file_values_keep_types() {
    let config = file_config(&[]);
    assert_eq!(config.get_int("server.port").unwrap(), 8080);
    assert_eq!(config.get_string("server.port").unwrap(), "8080");
    assert!(config.get_bool("server.debug").unwrap());
    assert_eq!(config.get_float("server.ratio").unwrap(), 0.5);
    assert_eq!(
        config.get_duration("server.timeout").unwrap(),
        Duration::from_secs(90)
    );
    assert_eq!(config.get_string_slice("server.hosts").unwrap(), vec!["a", "b"]);

    let labels = config.get_string_map_string("labels").unwrap();
    assert_eq!(labels["tier"], "1");
}

#[test]
fn test_environment_strings_coerce() {
    let config = file_config(&[
        ("APP_SERVER_PORT", "9090"),
        ("APP_SERVER_DEBUG", "off"),
        ("APP_SERVER_RATIO", "0.75"),
        ("APP_SERVER_TIMEOUT", "250ms"),
        ("APP_SERVER_HOSTS", "x, y, z"),
    ]);
    config.set_env_prefix("APP");
    config.automatic_env();

    assert_eq!(config.get_u16("server.port").unwrap(), 9090);
    assert!(!config.get_bool("server.debug").unwrap());
    assert_eq!(config.get_float("server.ratio").unwrap(), 0.75);
    assert_eq!(
        config.get_duration("server.timeout").unwrap(),
        Duration::from_millis(250)
    );
    assert_eq!(
        config.get_string_slice("server.hosts").unwrap(),
        vec!["x", "y", "z"]
    );
}

#[test]
fn test_bare_number_duration_is_seconds() {
    let config = config_with_env(&[]);
    config.set("retry", 3).unwrap();
    config.set("backoff", "1.5").unwrap();
    assert_eq!(config.get_duration("retry").unwrap(), Duration::from_secs(3));
    assert_eq!(
        config.get_duration("backoff").unwrap(),
        Duration::from_millis(1500)
    );
}

#[test]
fn test_mismatch_reports_key_and_value() {
    let config = file_config(&[]);
    match config.get_bool("server.hosts").unwrap_err() {
        ConfigError::TypeMismatch {
            key,
            expected,
            found,
        } => {
            assert_eq!(key, "server.hosts");
            assert_eq!(expected, "bool");
            assert_eq!(found, "sequence");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(config.get_u16("labels.team").is_err());
    assert!(config.get_string_map("server.port").is_err());
}

#[test]
fn test_missing_keys_default_or_fail() {
    let config = file_config(&[]);
    assert_eq!(config.get_duration("server.idle").unwrap(), Duration::ZERO);
    assert!(!config.get_bool("server.idle").unwrap());
    assert!(matches!(
        config.get_as_strict::<Duration>("server.idle"),
        Err(ConfigError::KeyNotFound(key)) if key == "server.idle"
    ));
    assert_eq!(
        config.get_as_strict::<u32>("SERVER.PORT").unwrap(),
        8080
    );
}
