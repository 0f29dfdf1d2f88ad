//! Integration tests for config file discovery, loading and export.

use layerconf::{Config, ConfigError, ConfigFormat, ConfigOptions, MapEnv};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn config_with_env(vars: &[(&str, &str)]) -> Config {
    Config::with_options(ConfigOptions {
        env_provider: Arc::new(MapEnv::new(vars.iter().copied())),
        ..ConfigOptions::default()
    })
}

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_read_in_config_yaml_with_env_binding() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.yaml", "db:\n  host: localhost\n");

    let config = config_with_env(&[("DB_PORT", "5432")]);
    config.add_config_path(dir.path().to_str().unwrap());
    config.set_config_name("a");
    config.read_in_config().unwrap();
    config.bind_env("db.port", &["DB_PORT"]).unwrap();

    assert_eq!(config.config_file_used(), Some(dir.path().join("a.yaml")));
    let db = config.get_string_map_string("db").unwrap();
    assert_eq!(db.len(), 2);
    assert_eq!(db["host"], "localhost");
    assert_eq!(db["port"], "5432");
}

#[test]
fn test_search_paths_in_order() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(second.path(), "config.toml", "source = \"second\"\n");

    let config = config_with_env(&[]);
    config.add_config_path(first.path().to_str().unwrap());
    config.add_config_path(second.path().to_str().unwrap());
    config.read_in_config().unwrap();
    assert_eq!(config.get_string("source").unwrap(), "second");

    write(first.path(), "config.json", r#"{"source": "first"}"#);
    config.read_in_config().unwrap();
    assert_eq!(config.get_string("source").unwrap(), "first");
    assert_eq!(
        config.config_file_used(),
        Some(first.path().join("config.json"))
    );
}

#[test]
fn test_declared_type_allows_bare_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "appconfig", "[server]\nport = 8443\n");

    let config = config_with_env(&[]);
    config.add_config_path(dir.path().to_str().unwrap());
    config.set_config_name("appconfig");
    config.set_config_type("toml");
    config.read_in_config().unwrap();
    assert_eq!(config.get_u16("server.port").unwrap(), 8443);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = config_with_env(&[]);
    config.add_config_path(dir.path().to_str().unwrap());

    match config.read_in_config().unwrap_err() {
        ConfigError::ConfigFileNotFound { name, locations } => {
            assert_eq!(name, "config");
            assert_eq!(locations, vec![dir.path().to_path_buf()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(config.config_file_used(), None);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[a]\nb=1\n").unwrap();

    let config = config_with_env(&[]);
    config.set_config_file(&path);
    assert!(matches!(
        config.read_in_config(),
        Err(ConfigError::UnsupportedConfigType(ext)) if ext == "ini"
    ));
}

#[test]
fn test_parse_error_keeps_previous_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"name": "good"}"#).unwrap();

    let config = config_with_env(&[]);
    config.set_config_file(&path);
    config.read_in_config().unwrap();

    fs::write(&path, r#"{"name": "#).unwrap();
    match config.read_in_config().unwrap_err() {
        ConfigError::ConfigParse { path: Some(p), .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(config.get_string("name").unwrap(), "good");
}

#[test]
fn test_non_mapping_top_level_is_rejected() {
    let config = config_with_env(&[]);
    assert!(matches!(
        config.read_config_str("- a\n- b\n", ConfigFormat::Yaml),
        Err(ConfigError::ConfigParse { .. })
    ));
}

#[test]
fn test_write_and_read_back_each_format() {
    let dir = TempDir::new().unwrap();
    let config = config_with_env(&[]);
    config.set_default("server.port", 8080).unwrap();
    config.set("server.host", "0.0.0.0").unwrap();
    config.set("features", json!(["a", "b"])).unwrap();

    for ext in ["json", "yaml", "toml"] {
        let path = dir.path().join(format!("out.{ext}"));
        config.write_config_as(&path).unwrap();

        let reread = config_with_env(&[]);
        reread.set_config_file(&path);
        reread.read_in_config().unwrap();
        assert_eq!(reread.all_settings(), config.all_settings(), "format {ext}");
    }
}

#[test]
fn test_safe_write_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.yaml");
    let config = config_with_env(&[]);
    config.set("a", 1).unwrap();

    config.safe_write_config_as(&path).unwrap();
    config.set("a", 2).unwrap();
    assert!(matches!(
        config.safe_write_config_as(&path),
        Err(ConfigError::Write { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");

    config.write_config_as(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "a: 2\n");
}

#[test]
fn test_write_config_replaces_file_in_use() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "name: before\n").unwrap();

    let config = config_with_env(&[]);
    config.set_config_file(&path);
    config.read_in_config().unwrap();
    config.set("name", "after").unwrap();
    config.write_config().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "name: after\n");
}

#[test]
fn test_write_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let config = config_with_env(&[]);
    assert!(matches!(
        config.write_config_as(dir.path().join("out.ini")),
        Err(ConfigError::UnsupportedConfigType(_))
    ));
}
