//! Integration tests for precedence resolution.
//!
//! Covers the five tiers (override, flag, environment, file, default),
//! structural merging of nested keys across tiers, and reads racing writes.

use layerconf::{Config, ConfigFormat, ConfigOptions, MapEnv};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Helper to create a Config reading from an in-memory environment.
fn config_with_env(vars: &[(&str, &str)]) -> (Config, Arc<MapEnv>) {
    let env = Arc::new(MapEnv::new(vars.iter().copied()));
    let config = Config::with_options(ConfigOptions {
        env_provider: env.clone(),
        ..ConfigOptions::default()
    });
    (config, env)
}

fn flag_map(pairs: &[(&str, &str)]) -> Arc<HashMap<String, String>> {
    Arc::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn test_port_override_beats_environment() {
    let (config, _env) = config_with_env(&[("APP_PORT", "7070")]);

    config.set_default("port", 8080).unwrap();
    assert_eq!(config.get_int("port").unwrap(), 8080);

    config.set("port", 9090).unwrap();
    assert_eq!(config.get_int("port").unwrap(), 9090);

    config.bind_env("port", &["APP_PORT"]).unwrap();
    assert_eq!(config.get_int("port").unwrap(), 9090);

    config.unset("port").unwrap();
    assert_eq!(config.get_int("port").unwrap(), 7070);
}

#[test]
fn test_db_map_merges_file_and_environment() {
    let (config, _env) = config_with_env(&[("DB_PORT", "5432")]);
    config
        .read_config_str("db:\n  host: localhost\n", ConfigFormat::Yaml)
        .unwrap();
    config.bind_env("db.port", &["DB_PORT"]).unwrap();

    let db = config.get_string_map("db").unwrap();
    assert_eq!(
        serde_json::Value::Object(db),
        json!({"host": "localhost", "port": "5432"})
    );
    assert_eq!(config.get_u16("db.port").unwrap(), 5432);

    let strings = config.get_string_map_string("db").unwrap();
    assert_eq!(strings.get("port").map(String::as_str), Some("5432"));
}

#[test]
fn test_all_five_tiers() {
    let (config, _env) = config_with_env(&[("LEVEL", "environment")]);
    config.set_default("level", "default").unwrap();
    config
        .read_config_str(r#"{"level": "file"}"#, ConfigFormat::Json)
        .unwrap();
    config.bind_env("level", &[]).unwrap();
    config
        .bind_flag("level", "level", flag_map(&[("level", "flag")]))
        .unwrap();
    config.set("level", "override").unwrap();

    assert_eq!(config.get_string("level").unwrap(), "override");
    config.unset("level").unwrap();
    assert_eq!(config.get_string("level").unwrap(), "flag");
}

#[test]
fn test_keys_are_case_insensitive() {
    let (config, _env) = config_with_env(&[]);
    config
        .read_config_str("Server:\n  Host: example.org\n", ConfigFormat::Yaml)
        .unwrap();

    let expected = Some(json!("example.org"));
    assert_eq!(config.get("server.host"), expected);
    assert_eq!(config.get("SERVER.HOST"), expected);
    assert_eq!(config.get("Server.host"), expected);
    assert_eq!(config.all_keys(), vec!["server.host"]);
}

#[test]
fn test_structural_merge_across_tiers() {
    let (config, _env) = config_with_env(&[]);
    config.set_default("p.x", 1).unwrap();
    config.set("p.y", 2).unwrap();

    assert_eq!(config.get("p"), Some(json!({"x": 1, "y": 2})));
    assert_eq!(
        serde_json::Value::Object((*config.all_settings()).clone()),
        json!({"p": {"x": 1, "y": 2}})
    );
}

#[test]
fn test_literal_dotted_key_wins_in_files() {
    let (config, _env) = config_with_env(&[]);
    config
        .read_config_str(
            r#"{"redis": {"host": "nested"}, "redis.host": "literal"}"#,
            ConfigFormat::Json,
        )
        .unwrap();
    assert_eq!(config.get_string("redis.host").unwrap(), "literal");
}

#[test]
fn test_automatic_env_with_prefix() {
    let (config, env) = config_with_env(&[("MYAPP_CACHE_TTL", "90s"), ("CACHE_TTL", "1s")]);
    config.set_default("cache.ttl", "30s").unwrap();
    assert_eq!(config.get_duration("cache.ttl").unwrap().as_secs(), 30);

    config.set_env_prefix("myapp");
    config.automatic_env();
    assert_eq!(config.get_duration("cache.ttl").unwrap().as_secs(), 90);

    env.remove("MYAPP_CACHE_TTL");
    assert_eq!(config.get_duration("cache.ttl").unwrap().as_secs(), 90);
    config.reload_env().unwrap();
    assert_eq!(config.get_duration("cache.ttl").unwrap().as_secs(), 30);
}

#[test]
fn test_empty_env_is_unset_unless_allowed() {
    let (config, _env) = config_with_env(&[("APP_NAME", "")]);
    config.set_default("name", "fallback").unwrap();
    config.bind_env("name", &["APP_NAME"]).unwrap();
    assert_eq!(config.get_string("name").unwrap(), "fallback");

    config.allow_empty_env(true);
    assert_eq!(config.get_string("name").unwrap(), "");
}

#[test]
fn test_clap_flags_only_when_passed() {
    let command = clap::Command::new("app")
        .arg(clap::Arg::new("port").long("port").default_value("7070"))
        .arg(clap::Arg::new("host").long("host"));

    let (config, _env) = config_with_env(&[]);
    let matches = command
        .clone()
        .try_get_matches_from(["app", "--host", "flaghost"])
        .unwrap();
    config.set_default("host", "localhost").unwrap();
    config.bind_flags(Arc::new(matches)).unwrap();

    // Untouched flag: its default is the last resort only.
    assert_eq!(config.get_int("port").unwrap(), 7070);
    assert!(!config.is_set("port"));
    config.set_default("port", 8080).unwrap();
    assert_eq!(config.get_int("port").unwrap(), 8080);

    assert_eq!(config.get_string("host").unwrap(), "flaghost");
}

#[test]
fn test_bound_flag_does_not_expose_other_arguments() {
    let command = clap::Command::new("app")
        .arg(
            clap::Arg::new("verbose")
                .long("verbose")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("config_path")
                .long("config-path")
                .action(clap::ArgAction::Append),
        )
        .arg(
            clap::Arg::new("set")
                .long("set")
                .action(clap::ArgAction::Append),
        );
    let matches = command
        .try_get_matches_from(["app", "--verbose", "--config-path", "/tmp", "--set", "a=1"])
        .unwrap();

    let (config, _env) = config_with_env(&[]);
    config
        .bind_flag("log.verbose", "verbose", Arc::new(matches))
        .unwrap();
    config.set("a", 1).unwrap();

    assert_eq!(config.all_keys(), vec!["a", "log.verbose"]);
    assert!(!config.is_set("config_path"));
    assert!(config.get("set").is_none());
    assert!(config.get_bool("log.verbose").unwrap());
}

#[test]
fn test_read_after_write_across_threads() {
    let (config, _env) = config_with_env(&[]);
    let config = Arc::new(config);

    for round in 0..50 {
        config.set("counter", round).unwrap();
        let reader = {
            let config = config.clone();
            thread::spawn(move || config.get_int("counter").unwrap())
        };
        assert_eq!(reader.join().unwrap(), round);
        assert_eq!(config.all_settings().get("counter"), Some(&json!(round)));
    }
}
