//! layerconf
//!
//! Layered application configuration. Settings come from explicit
//! overrides, command-line flags, environment variables, a config file
//! (JSON, YAML or TOML) and defaults, and are read through case-insensitive
//! dotted keys. The config file can be watched and reloaded in place.

pub mod binding;
pub mod cli;
pub mod coerce;
pub mod config;
pub mod error;
pub mod format;
pub mod key;
pub mod logging;
pub mod merge;
mod resolve;
pub mod sources;
pub mod watcher;

pub use binding::BindingTable;
pub use coerce::{FromValue, Mismatch};
pub use config::{ChangeCallback, Config, ConfigOptions};
pub use error::{ConfigError, ConfigResult};
pub use format::ConfigFormat;
pub use key::KeyPath;
pub use merge::Map;
pub use sources::{EnvProvider, FlagValue, FlagValues, MapEnv, SourceKind, SystemEnv};
pub use watcher::{ChangeSubscription, ConfigChangeEvent, WatchMode, WatchState};
