//! The configuration handle.
//!
//! [`Config`] owns the source registry, the config file settings and the
//! watcher. Reads go straight to the source snapshots and never block on
//! writers; every mutation is serialized by the registry lock.

use crate::binding::BindingTable;
use crate::coerce::FromValue;
use crate::error::{ConfigError, ConfigResult};
use crate::format::ConfigFormat;
use crate::key::{DEFAULT_DELIMITER, KeyPath};
use crate::merge::{self, Map};
use crate::resolve::Registry;
use crate::sources::{EnvProvider, FileSettings, FlagValues, Reload, SourceKind, SystemEnv};
use crate::watcher::{
    self, ChangeSubscription, ConfigChangeEvent, StateCell, WatchHandle, WatchMode, WatchState,
    WatchTarget,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Callback invoked after every reload attempt of a watched file.
pub type ChangeCallback = Arc<dyn Fn(&ConfigChangeEvent) + Send + Sync>;

/// Construction options for [`Config`].
#[derive(Clone)]
pub struct ConfigOptions {
    /// Separator between key segments.
    pub key_delimiter: char,
    /// Where environment variables come from.
    pub env_provider: Arc<dyn EnvProvider>,
    /// How `watch_config` detects file changes.
    pub watch_mode: WatchMode,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            key_delimiter: DEFAULT_DELIMITER,
            env_provider: Arc::new(SystemEnv),
            watch_mode: WatchMode::default(),
        }
    }
}

impl std::fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("key_delimiter", &self.key_delimiter)
            .field("watch_mode", &self.watch_mode)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the watcher thread.
struct Shared {
    registry: Registry,
    files: Mutex<FileSettings>,
    callbacks: Mutex<Vec<ChangeCallback>>,
    events: watch::Sender<Option<ConfigChangeEvent>>,
    watch_state: Arc<StateCell>,
}

impl Shared {
    fn file_in_use(&self) -> ConfigResult<(PathBuf, ConfigFormat)> {
        match self.registry.file.origin() {
            Some(origin) => Ok((origin.path, origin.format)),
            None => {
                let files = lock(&self.files);
                Err(ConfigError::ConfigFileNotFound {
                    name: files.config_name().to_string(),
                    locations: files.search_paths.clone(),
                })
            }
        }
    }
}

impl WatchTarget for Shared {
    fn loaded_digest(&self, path: &Path) -> Option<String> {
        self.registry
            .file
            .origin()
            .filter(|origin| origin.path == path)
            .map(|origin| origin.digest)
    }

    fn reload(&self, path: &Path, contents: ConfigResult<String>) -> Option<ConfigChangeEvent> {
        let result = {
            let _guard = self.registry.lock();
            match self.registry.file.origin() {
                Some(origin) if origin.path == path => Some(contents.and_then(|contents| {
                    self.registry.file.apply(&contents, origin.format, Some(path))?;
                    Ok(self.registry.commit("config file changed"))
                })),
                _ => None,
            }
        };
        let Some(result) = result else {
            debug!(path = %path.display(), "config file no longer in use, skipping reload");
            return None;
        };

        Some(match result {
            Ok(generation) => {
                info!(path = %path.display(), generation, "config file reloaded");
                ConfigChangeEvent::Reloaded {
                    path: path.to_path_buf(),
                    generation,
                    settings: self.registry.all_settings(),
                    at: Utc::now(),
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "config reload failed, keeping previous contents");
                ConfigChangeEvent::ReloadFailed {
                    path: path.to_path_buf(),
                    error: Arc::new(error),
                    at: Utc::now(),
                }
            }
        })
    }

    fn notify(&self, event: &ConfigChangeEvent) {
        let callbacks = lock(&self.callbacks).clone();
        debug!(callbacks = callbacks.len(), failed = event.is_failure(), "dispatching config change");
        for callback in &callbacks {
            callback(event);
        }
        self.events.send_replace(Some(event.clone()));
    }
}

/// A layered configuration: overrides, flags, environment, a config file
/// and defaults, resolved by precedence.
///
/// ```no_run
/// use layerconf::Config;
///
/// let config = Config::new();
/// config.set_default("server.port", 8080).unwrap();
/// config.add_config_path("/etc/myapp");
/// config.set_config_name("config");
/// config.read_in_config().unwrap();
/// config.automatic_env();
///
/// let port: u16 = config.get_u16("server.port").unwrap();
/// ```
pub struct Config {
    shared: Arc<Shared>,
    delimiter: char,
    watch_mode: WatchMode,
    watch: Mutex<Option<WatchHandle>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        let (events, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                registry: Registry::new(options.key_delimiter, options.env_provider),
                files: Mutex::new(FileSettings::default()),
                callbacks: Mutex::new(Vec::new()),
                events,
                watch_state: Arc::new(StateCell::default()),
            }),
            delimiter: options.key_delimiter,
            watch_mode: options.watch_mode,
            watch: Mutex::new(None),
        }
    }

    fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    fn parse_key(&self, key: &str) -> ConfigResult<KeyPath> {
        KeyPath::parse_with(key, self.delimiter)
    }

    /// Parse `key` and follow aliases to the canonical key.
    fn canonical(&self, key: &str) -> ConfigResult<KeyPath> {
        let key = self.parse_key(key)?;
        Ok(self.registry().bindings().resolve_alias(&key))
    }

    // ---- writes ----

    /// Set the value used when no other source has `key`.
    pub fn set_default(&self, key: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let key = self.canonical(key)?;
        let registry = self.registry();
        let _guard = registry.lock();
        registry.defaults.set(&key, value.into());
        registry.commit("set_default");
        Ok(())
    }

    /// Override `key`; wins over every other source.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let key = self.canonical(key)?;
        let registry = self.registry();
        let _guard = registry.lock();
        registry.overrides.set(&key, value.into());
        registry.commit("set");
        Ok(())
    }

    /// Remove an override set with [`Config::set`].
    pub fn unset(&self, key: &str) -> ConfigResult<()> {
        let key = self.canonical(key)?;
        let registry = self.registry();
        let _guard = registry.lock();
        if registry.overrides.unset(&key).is_some() {
            registry.commit("unset");
        }
        Ok(())
    }

    // ---- environment ----

    /// Bind `key` to environment variables, tried in order. With no names
    /// the derived name (`PREFIX_KEY_PATH`) is bound.
    pub fn bind_env(&self, key: &str, names: &[&str]) -> ConfigResult<()> {
        let key = self.canonical(key)?;
        let registry = self.registry();
        let _guard = registry.lock();
        registry.update_bindings(|bindings| {
            if names.is_empty() {
                let derived = bindings.derived_env_name(&key);
                bindings.bind(key.clone(), SourceKind::Environment, derived);
            } else {
                for name in names {
                    bindings.bind(key.clone(), SourceKind::Environment, *name);
                }
            }
        });
        registry.env.activate();
        registry.commit("bind_env");
        Ok(())
    }

    /// Prefix for derived environment variable names. Upper-cased.
    pub fn set_env_prefix(&self, prefix: &str) {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.update_bindings(|bindings| bindings.set_env_prefix(prefix));
        registry.env.activate();
        registry.commit("set_env_prefix");
    }

    /// Look every key up in the environment under its derived name.
    pub fn automatic_env(&self) {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.env.enable_automatic();
        registry.commit("automatic_env");
    }

    /// Treat set-but-empty variables as values instead of as unset.
    pub fn allow_empty_env(&self, allow: bool) {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.env.set_allow_empty(allow);
        registry.commit("allow_empty_env");
    }

    /// Capture the environment again.
    pub fn reload_env(&self) -> ConfigResult<()> {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.env.reload()?;
        registry.commit("reload_env");
        Ok(())
    }

    // ---- flags and aliases ----

    /// Bind `key` to the flag `flag_name` of `flags`.
    pub fn bind_flag(
        &self,
        key: &str,
        flag_name: &str,
        flags: Arc<dyn FlagValues>,
    ) -> ConfigResult<()> {
        let key = self.canonical(key)?;
        let registry = self.registry();
        let _guard = registry.lock();
        registry.update_bindings(|bindings| bindings.bind(key, SourceKind::Flag, flag_name));
        registry.flags.add_provider(flags, Some(flag_name));
        registry.commit("bind_flag");
        Ok(())
    }

    /// Bind every flag of `flags` to the key spelled by its name.
    pub fn bind_flags(&self, flags: Arc<dyn FlagValues>) -> ConfigResult<()> {
        let names = flags.names();
        let registry = self.registry();
        let _guard = registry.lock();
        registry.update_bindings(|bindings| {
            for name in &names {
                match KeyPath::parse_with(name, self.delimiter) {
                    Ok(key) => bindings.bind(key, SourceKind::Flag, name.as_str()),
                    Err(e) => warn!(flag = %name, error = %e, "skipping flag"),
                }
            }
        });
        registry.flags.add_provider(flags, None);
        registry.commit("bind_flags");
        Ok(())
    }

    /// Capture the bound flag values again.
    pub fn reload_flags(&self) -> ConfigResult<()> {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.flags.reload()?;
        registry.commit("reload_flags");
        Ok(())
    }

    /// Make reads and writes of `alias` act on `target`.
    pub fn register_alias(&self, alias: &str, target: &str) -> ConfigResult<()> {
        let alias = self.parse_key(alias)?;
        let target = self.parse_key(target)?;
        let registry = self.registry();
        let _guard = registry.lock();
        registry.update_bindings(|bindings| bindings.register_alias(alias, target))?;
        registry.commit("register_alias");
        Ok(())
    }

    // ---- config file ----

    /// Add a directory to search for the config file. `$HOME` and `~` are
    /// expanded.
    pub fn add_config_path(&self, path: &str) {
        lock(&self.shared.files).add_search_path(path);
    }

    /// File name to search for, without extension. Defaults to `config`.
    pub fn set_config_name(&self, name: &str) {
        lock(&self.shared.files).config_name = Some(name.to_string());
    }

    /// Format of the config file, overriding its extension.
    pub fn set_config_type(&self, config_type: &str) {
        lock(&self.shared.files).config_type = Some(config_type.to_string());
    }

    /// Use `path` as the config file, skipping the search.
    pub fn set_config_file(&self, path: impl Into<PathBuf>) {
        lock(&self.shared.files).config_file = Some(path.into());
    }

    /// Find and load the config file.
    ///
    /// A running watcher moves to the new file when the file in use changes.
    pub fn read_in_config(&self) -> ConfigResult<()> {
        let (path, format) = lock(&self.shared.files).locate()?;
        {
            let registry = self.registry();
            let _guard = registry.lock();
            registry.file.load_file(&path, format)?;
            registry.commit("read_in_config");
        }

        let stale = {
            let mut watch = lock(&self.watch);
            if watch.as_ref().is_some_and(|handle| handle.path() != path) {
                watch.take()
            } else {
                None
            }
        };
        if let Some(handle) = stale {
            info!(from = %handle.path().display(), to = %path.display(), "config file changed, restarting watcher");
            handle.stop();
            self.watch_config()?;
        }
        Ok(())
    }

    /// Load config file contents from a string.
    pub fn read_config_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<()> {
        let registry = self.registry();
        let _guard = registry.lock();
        registry.file.apply(content, format, None)?;
        registry.commit("read_config_str");
        Ok(())
    }

    /// The config file loaded by `read_in_config`, if any.
    pub fn config_file_used(&self) -> Option<PathBuf> {
        self.registry().file.origin().map(|origin| origin.path)
    }

    // ---- reads ----

    /// Resolved value for `key`. Invalid and missing keys are `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = self.parse_key(key).ok()?;
        self.registry().get(&key)
    }

    /// Resolved value for `key`, failing when no source has it.
    pub fn get_strict(&self, key: &str) -> ConfigResult<Value> {
        let path = self.parse_key(key)?;
        self.registry()
            .get(&path)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Resolved value converted to `T`; missing keys give `T::default()`.
    pub fn get_as<T: FromValue>(&self, key: &str) -> ConfigResult<T> {
        let path = self.parse_key(key)?;
        match self.registry().get(&path) {
            Some(value) => convert(key, &value),
            None => Ok(T::default()),
        }
    }

    /// Like [`Config::get_as`], but a missing key is an error.
    pub fn get_as_strict<T: FromValue>(&self, key: &str) -> ConfigResult<T> {
        convert(key, &self.get_strict(key)?)
    }

    pub fn get_string(&self, key: &str) -> ConfigResult<String> {
        self.get_as(key)
    }

    pub fn get_int(&self, key: &str) -> ConfigResult<i64> {
        self.get_as(key)
    }

    pub fn get_i32(&self, key: &str) -> ConfigResult<i32> {
        self.get_as(key)
    }

    pub fn get_u16(&self, key: &str) -> ConfigResult<u16> {
        self.get_as(key)
    }

    pub fn get_u32(&self, key: &str) -> ConfigResult<u32> {
        self.get_as(key)
    }

    pub fn get_u64(&self, key: &str) -> ConfigResult<u64> {
        self.get_as(key)
    }

    pub fn get_bool(&self, key: &str) -> ConfigResult<bool> {
        self.get_as(key)
    }

    pub fn get_float(&self, key: &str) -> ConfigResult<f64> {
        self.get_as(key)
    }

    pub fn get_duration(&self, key: &str) -> ConfigResult<Duration> {
        self.get_as(key)
    }

    pub fn get_string_slice(&self, key: &str) -> ConfigResult<Vec<String>> {
        self.get_as(key)
    }

    pub fn get_string_map(&self, key: &str) -> ConfigResult<Map> {
        self.get_as(key)
    }

    pub fn get_string_map_string(&self, key: &str) -> ConfigResult<HashMap<String, String>> {
        self.get_as(key)
    }

    /// True when some source holds `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.parse_key(key)
            .is_ok_and(|key| self.registry().is_set(&key))
    }

    /// Every setting, merged across sources.
    pub fn all_settings(&self) -> Arc<Map> {
        self.registry().all_settings()
    }

    /// Every leaf key of [`Config::all_settings`], dotted and sorted.
    pub fn all_keys(&self) -> Vec<String> {
        merge::leaf_keys(&self.all_settings())
    }

    /// Deserialize all settings into `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        let settings = Value::Object((*self.all_settings()).clone());
        deserialize("", settings)
    }

    /// Deserialize the subtree at `key` into `T`.
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        deserialize(key, self.get_strict(key)?)
    }

    /// Changes with every write, reload or binding.
    pub fn generation(&self) -> u64 {
        self.registry().generation()
    }

    /// The current binding table.
    pub fn bindings(&self) -> Arc<BindingTable> {
        self.registry().bindings()
    }

    // ---- watching ----

    /// Watch the config file in use and reload it when it changes.
    ///
    /// Calling it again while watching does nothing.
    pub fn watch_config(&self) -> ConfigResult<()> {
        let mut watch = lock(&self.watch);
        if watch.is_some() {
            return Ok(());
        }
        let Some(origin) = self.registry().file.origin() else {
            return Err(ConfigError::WatchUnavailable(
                "no config file in use; read one with read_in_config first".into(),
            ));
        };
        let target: Arc<dyn WatchTarget> = self.shared.clone();
        *watch = Some(watcher::spawn(
            origin.path,
            self.watch_mode,
            self.shared.watch_state.clone(),
            target,
        )?);
        Ok(())
    }

    /// Register a callback for every reload attempt of the watched file.
    pub fn on_config_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigChangeEvent) + Send + Sync + 'static,
    {
        lock(&self.shared.callbacks).push(Arc::new(callback));
    }

    /// Stop watching. No callback fires after this returns.
    pub fn unwatch(&self) {
        let handle = lock(&self.watch).take();
        if let Some(handle) = handle {
            debug!(path = %handle.path().display(), "unwatching config file");
            handle.stop();
        }
    }

    pub fn watch_state(&self) -> WatchState {
        self.shared.watch_state.get()
    }

    /// Change events for async consumers.
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(self.shared.events.subscribe())
    }

    /// Re-read the config file in use now and notify callbacks on success.
    pub fn reload_config(&self) -> ConfigResult<u64> {
        let (path, _) = self.shared.file_in_use()?;
        let generation = {
            let registry = self.registry();
            let _guard = registry.lock();
            registry.file.reload()?;
            registry.commit("reload_config")
        };
        let event = ConfigChangeEvent::Reloaded {
            path,
            generation,
            settings: self.all_settings(),
            at: Utc::now(),
        };
        self.shared.notify(&event);
        Ok(generation)
    }

    // ---- export ----

    /// Write all settings back to the config file in use.
    pub fn write_config(&self) -> ConfigResult<()> {
        let (path, format) = self.shared.file_in_use()?;
        self.write_to(&path, format)
    }

    /// Write all settings to `path`, replacing it if it exists. The format
    /// comes from the extension, else from the declared config type.
    pub fn write_config_as(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let format = self.export_format(path)?;
        self.write_to(path, format)
    }

    /// Like [`Config::write_config_as`], but never replaces an existing file.
    pub fn safe_write_config_as(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ConfigError::write(path, "file already exists"));
        }
        self.write_config_as(path)
    }

    fn export_format(&self, path: &Path) -> ConfigResult<ConfigFormat> {
        match ConfigFormat::from_path(path) {
            Ok(format) => Ok(format),
            Err(err) => match &lock(&self.shared.files).config_type {
                Some(declared) if path.extension().is_none() => declared.parse(),
                _ => Err(err),
            },
        }
    }

    fn write_to(&self, path: &Path, format: ConfigFormat) -> ConfigResult<()> {
        let rendered = format
            .serialize(&self.all_settings())
            .map_err(|e| ConfigError::write(path, e))?;
        std::fs::write(path, rendered).map_err(|e| ConfigError::write(path, e))?;
        info!(path = %path.display(), %format, "wrote config");
        Ok(())
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.unwatch();
    }
}

fn convert<T: FromValue>(key: &str, value: &Value) -> ConfigResult<T> {
    T::from_value(value).map_err(|mismatch| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: mismatch.expected,
        found: mismatch.found,
    })
}

fn deserialize<T: DeserializeOwned>(key: &str, value: Value) -> ConfigResult<T> {
    serde_json::from_value(value).map_err(|e| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>(),
        found: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MapEnv;
    use serde::Deserialize;
    use serde_json::json;

    fn config_with_env(vars: &[(&str, &str)]) -> Config {
        Config::with_options(ConfigOptions {
            env_provider: Arc::new(MapEnv::new(vars.iter().copied())),
            ..ConfigOptions::default()
        })
    }

    #[test]
    fn test_get_as_missing_key_is_zero_value() {
        let config = config_with_env(&[]);
        assert_eq!(config.get_int("missing").unwrap(), 0);
        assert_eq!(config.get_string("missing").unwrap(), "");
        assert!(config.get_string_slice("missing").unwrap().is_empty());
        assert!(matches!(
            config.get_as_strict::<i64>("missing"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_type_mismatch_names_key() {
        let config = config_with_env(&[]);
        config.set("port", "eighty").unwrap();
        match config.get_int("port").unwrap_err() {
            ConfigError::TypeMismatch { key, expected, .. } => {
                assert_eq!(key, "port");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_key() {
        let config = config_with_env(&[]);
        assert!(matches!(
            config.set("a..b", 1),
            Err(ConfigError::InvalidKey { .. })
        ));
        assert_eq!(config.get("a..b"), None);
        assert!(!config.is_set(""));
    }

    #[test]
    fn test_unset_reveals_lower_tier() {
        let config = config_with_env(&[]);
        config.set_default("mode", "default").unwrap();
        config.set("mode", "override").unwrap();
        config.unset("mode").unwrap();
        assert_eq!(config.get_string("mode").unwrap(), "default");
    }

    #[test]
    fn test_generation_moves_on_writes() {
        let config = config_with_env(&[]);
        let start = config.generation();
        config.set_default("a", 1).unwrap();
        config.set("a", 2).unwrap();
        assert_eq!(config.generation(), start + 2);
        config.unset("never-set").unwrap();
        assert_eq!(config.generation(), start + 2);
    }

    #[test]
    fn test_alias_writes_through() {
        let config = config_with_env(&[]);
        config.register_alias("loud", "verbose").unwrap();
        config.set("loud", true).unwrap();
        assert!(config.get_bool("verbose").unwrap());
        assert_eq!(config.all_keys(), vec!["verbose"]);
    }

    #[test]
    fn test_alias_loop_through_existing_alias_is_rejected() {
        let config = config_with_env(&[]);
        config.register_alias("a", "c").unwrap();
        config.register_alias("b", "a").unwrap();
        assert!(matches!(
            config.register_alias("a", "b"),
            Err(ConfigError::InvalidKey { .. })
        ));

        config.set("c", 1).unwrap();
        assert_eq!(config.get("a"), Some(json!(1)));
        assert_eq!(config.get("b"), Some(json!(1)));
    }

    #[test]
    fn test_unmarshal() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Db {
            host: String,
            port: u16,
        }
        #[derive(Debug, Deserialize, PartialEq)]
        struct Settings {
            db: Db,
        }

        let config = config_with_env(&[]);
        config
            .read_config_str("[db]\nhost = \"localhost\"\nport = 5432\n", ConfigFormat::Toml)
            .unwrap();
        let settings: Settings = config.unmarshal().unwrap();
        assert_eq!(settings.db.port, 5432);
        let db: Db = config.unmarshal_key("DB").unwrap();
        assert_eq!(db.host, "localhost");
        assert!(config.unmarshal_key::<Db>("cache").is_err());
    }

    #[test]
    fn test_watch_requires_file() {
        let config = config_with_env(&[]);
        assert!(matches!(
            config.watch_config(),
            Err(ConfigError::WatchUnavailable(_))
        ));
        assert_eq!(config.watch_state(), WatchState::Idle);
        assert!(matches!(
            config.reload_config(),
            Err(ConfigError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_bind_env_without_names_uses_derived_name() {
        let config = config_with_env(&[("APP_DB_PORT", "6543")]);
        config.set_env_prefix("app");
        config.bind_env("db.port", &[]).unwrap();
        assert_eq!(config.get("db.port"), Some(json!("6543")));
        assert_eq!(config.all_keys(), vec!["db.port"]);
    }
}
