//! Config file codecs.
//!
//! Each format parses into, and writes from, the nested string-keyed mapping
//! that sources store. Parsing does not normalize keys; the file source does.

use crate::error::{ConfigError, ConfigResult};
use crate::merge::Map;
use serde_json::Value;
use std::path::Path;

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub const ALL: [ConfigFormat; 3] = [ConfigFormat::Json, ConfigFormat::Yaml, ConfigFormat::Toml];

    /// Format for a file extension or declared config type (`yml` → YAML).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Format implied by a path's extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedConfigType(path.display().to_string()))?;
        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedConfigType(ext.to_string()))
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ConfigFormat::Json => &["json"],
            ConfigFormat::Yaml => &["yaml", "yml"],
            ConfigFormat::Toml => &["toml"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
        }
    }

    /// Parse file contents into a mapping.
    ///
    /// An empty document is an empty mapping; any other non-mapping top-level
    /// value is a parse error.
    pub fn parse(self, content: &str) -> ConfigResult<Map> {
        let value: Value = match self {
            ConfigFormat::Json => {
                if content.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(content).map_err(|e| ConfigError::parse(None, self.as_str(), e))?
                }
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::parse(None, self.as_str(), e))?
            }
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::parse(None, self.as_str(), e))?
            }
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ConfigError::parse(
                None,
                self.as_str(),
                format!("top-level value must be a mapping, found {}", type_name(&other)),
            )),
        }
    }

    /// Render a mapping in this format.
    pub fn serialize(self, map: &Map) -> Result<String, String> {
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(map)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::to_string(map).map_err(|e| e.to_string()),
            // TOML has no null; drop those entries.
            ConfigFormat::Toml => toml::to_string_pretty(&strip_nulls(map)).map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| ConfigError::UnsupportedConfigType(s.to_string()))
    }
}

/// Short type name for diagnostics.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn strip_nulls(map: &Map) -> Map {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = match v {
                Value::Object(inner) => Value::Object(strip_nulls(inner)),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_extension() {
        assert_eq!(ConfigFormat::from_extension("YML"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
        assert!(matches!(
            "ini".parse::<ConfigFormat>(),
            Err(ConfigError::UnsupportedConfigType(_))
        ));
        assert_eq!(".json".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("/etc/app/config.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
        assert!(ConfigFormat::from_path(Path::new("config.ini")).is_err());
    }

    #[test]
    fn test_parse_each_format() {
        let yaml = ConfigFormat::Yaml.parse("db:\n  host: localhost\n  port: 5432\n").unwrap();
        let json = ConfigFormat::Json
            .parse(r#"{"db": {"host": "localhost", "port": 5432}}"#)
            .unwrap();
        let toml = ConfigFormat::Toml
            .parse("[db]\nhost = \"localhost\"\nport = 5432\n")
            .unwrap();
        assert_eq!(yaml, json);
        assert_eq!(json, toml);
    }

    #[test]
    fn test_empty_document_is_empty_map() {
        assert!(ConfigFormat::Yaml.parse("").unwrap().is_empty());
        assert!(ConfigFormat::Json.parse("  \n").unwrap().is_empty());
        assert!(ConfigFormat::Toml.parse("").unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_top_level_is_parse_error() {
        let err = ConfigFormat::Yaml.parse("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParse { .. }));
        let err = ConfigFormat::Json.parse("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParse { .. }));
    }

    #[test]
    fn test_toml_serialize_drops_nulls() {
        let map = match json!({"a": 1, "b": null, "c": {"d": null, "e": "x"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let out = ConfigFormat::Toml.serialize(&map).unwrap();
        let back = ConfigFormat::Toml.parse(&out).unwrap();
        assert_eq!(Value::Object(back), json!({"a": 1, "c": {"e": "x"}}));
    }
}
