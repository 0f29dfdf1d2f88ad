//! Error types for configuration resolution.
//!
//! Lookup misses are not errors in the default API; they only surface as
//! [`ConfigError::KeyNotFound`] through the strict accessors.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything that can go wrong while resolving, loading or writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The key path is empty or contains an empty segment.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// No config file matched the configured name, paths and extensions.
    #[error("config file \"{name}\" not found in {locations:?}")]
    ConfigFileNotFound {
        name: String,
        locations: Vec<PathBuf>,
    },

    /// The config type (explicit or from the file extension) has no codec.
    #[error("unsupported config type \"{0}\"")]
    UnsupportedConfigType(String),

    /// The file contents could not be parsed into a nested mapping.
    #[error("failed to parse {format} config{}: {message}", display_path(.path))]
    ConfigParse {
        path: Option<PathBuf>,
        format: String,
        message: String,
    },

    /// Strict lookup of a key that no source provides.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The resolved value cannot be converted to the requested type.
    #[error("cannot read '{key}' as {expected}: found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    /// The backing file could not be read.
    #[error("config source unavailable at {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing or writing the merged view failed.
    #[error("failed to write config to {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    /// Watching was requested but cannot be set up.
    #[error("cannot watch config: {0}")]
    WatchUnavailable(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" at {}", path.display()),
        None => String::new(),
    }
}

impl ConfigError {
    pub fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(path: Option<PathBuf>, format: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::ConfigParse {
            path,
            format: format.into(),
            message: err.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Attach the file a parse error came from.
    pub(crate) fn with_path(self, file: &std::path::Path) -> Self {
        match self {
            ConfigError::ConfigParse {
                path: None,
                format,
                message,
            } => ConfigError::ConfigParse {
                path: Some(file.to_path_buf()),
                format,
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mentions_path() {
        let err = ConfigError::parse(Some(PathBuf::from("app.yaml")), "yaml", "bad indent");
        let msg = err.to_string();
        assert!(msg.contains("app.yaml"));
        assert!(msg.contains("bad indent"));
    }

    #[test]
    fn test_parse_error_without_path() {
        let err = ConfigError::parse(None, "json", "eof");
        assert_eq!(err.to_string(), "failed to parse json config: eof");
    }
}
