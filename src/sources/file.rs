//! Config file discovery and the File tier.
//!
//! A config file is found by combining the search directories, the config
//! name and the supported extensions (first match wins), or named directly
//! with `set_config_file`. The file's format comes from the declared config
//! type, else from its extension.

use super::{Reload, Snapshot, Source, SourceKind};
use crate::binding::BindingTable;
use crate::error::{ConfigError, ConfigResult};
use crate::format::ConfigFormat;
use crate::key::KeyPath;
use crate::merge::{self, Map};
use crate::watcher::content_digest;
use arc_swap::{ArcSwap, ArcSwapOption};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Extensions tried during discovery, in order.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "toml"];

/// Default config name when none is set.
const DEFAULT_CONFIG_NAME: &str = "config";

/// Where and how to look for the config file.
#[derive(Debug, Clone, Default)]
pub struct FileSettings {
    /// Directories searched in the order they were added.
    pub search_paths: Vec<PathBuf>,
    /// File name without extension.
    pub config_name: Option<String>,
    /// Declared format, overriding the extension.
    pub config_type: Option<String>,
    /// Explicit file, bypassing discovery.
    pub config_file: Option<PathBuf>,
}

impl FileSettings {
    /// Add a search directory; `$HOME` and `~` prefixes are expanded.
    pub fn add_search_path(&mut self, path: &str) {
        let path = expand_home(path);
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    pub fn config_name(&self) -> &str {
        self.config_name.as_deref().unwrap_or(DEFAULT_CONFIG_NAME)
    }

    fn declared_format(&self) -> ConfigResult<Option<ConfigFormat>> {
        match &self.config_type {
            Some(ext) => ext.parse().map(Some),
            None => Ok(None),
        }
    }

    /// Candidate files in lookup order.
    pub fn candidates(&self) -> ConfigResult<Vec<PathBuf>> {
        if let Some(file) = &self.config_file {
            return Ok(vec![file.clone()]);
        }

        let name = self.config_name();
        let declared = self.declared_format()?;
        let extensions: Vec<&str> = match declared {
            Some(format) => format.extensions().to_vec(),
            None => SUPPORTED_EXTENSIONS.to_vec(),
        };

        let mut candidates = Vec::new();
        for dir in &self.search_paths {
            for ext in &extensions {
                candidates.push(dir.join(format!("{name}.{ext}")));
            }
            // With a declared type the file may go without an extension.
            if declared.is_some() {
                candidates.push(dir.join(name));
            }
        }
        Ok(candidates)
    }

    /// Find the config file and the format to parse it with.
    pub fn locate(&self) -> ConfigResult<(PathBuf, ConfigFormat)> {
        let declared = self.declared_format()?;
        let found = self
            .candidates()?
            .into_iter()
            .find(|candidate| candidate.is_file());

        let Some(path) = found else {
            return Err(ConfigError::ConfigFileNotFound {
                name: match &self.config_file {
                    Some(file) => file.display().to_string(),
                    None => self.config_name().to_string(),
                },
                locations: match &self.config_file {
                    Some(file) => vec![file.clone()],
                    None => self.search_paths.clone(),
                },
            });
        };

        let format = match declared {
            Some(format) => format,
            None => ConfigFormat::from_path(&path)?,
        };
        Ok((path, format))
    }
}

/// Expand a leading `$HOME` or `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("$HOME")
        .or_else(|| path.strip_prefix('~'));
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        _ => PathBuf::from(path),
    }
}

/// The file a [`FileSource`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOrigin {
    pub path: PathBuf,
    pub format: ConfigFormat,
    /// Hex SHA-256 of the contents that were loaded.
    pub digest: String,
}

/// The File tier: the parsed contents of one config file.
pub struct FileSource {
    delimiter: char,
    current: ArcSwap<Snapshot<Map>>,
    origin: ArcSwapOption<FileOrigin>,
}

impl FileSource {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            current: ArcSwap::from_pointee(Snapshot::new(Map::new(), 0)),
            origin: ArcSwapOption::empty(),
        }
    }

    /// The file currently backing this source, if any.
    pub fn origin(&self) -> Option<FileOrigin> {
        self.origin.load_full().map(|origin| (*origin).clone())
    }

    /// Read and parse `path`, swapping in its contents on success.
    pub(crate) fn load_file(&self, path: &Path, format: ConfigFormat) -> ConfigResult<u64> {
        let content = read_source(path)?;
        let generation = self.apply(&content, format, Some(path))?;
        info!(path = %path.display(), %format, generation, "loaded config file");
        Ok(generation)
    }

    /// Parse `content` and swap it in; on error the old data stays visible.
    ///
    /// With `path` set, the source remembers it as its origin.
    pub(crate) fn apply(
        &self,
        content: &str,
        format: ConfigFormat,
        path: Option<&Path>,
    ) -> ConfigResult<u64> {
        let parsed = format.parse(content).map_err(|e| match path {
            Some(path) => e.with_path(path),
            None => e,
        })?;
        let data = merge::normalize_map(parsed, self.delimiter);

        let next = self.current.load().next(data);
        let generation = next.generation;
        self.current.store(Arc::new(next));
        if let Some(path) = path {
            self.origin.store(Some(Arc::new(FileOrigin {
                path: path.to_path_buf(),
                format,
                digest: content_digest(content.as_bytes()),
            })));
        }
        debug!(source = %SourceKind::File, generation, "source swapped");
        Ok(generation)
    }
}

/// Read a config file, mapping I/O failures to `SourceUnavailable`.
pub(crate) fn read_source(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

impl Source for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn generation(&self) -> u64 {
        self.current.load().generation
    }

    fn lookup(&self, key: &KeyPath, _bindings: &BindingTable) -> Option<Value> {
        let current = self.current.load();
        if key.is_root() {
            return Some(Value::Object((*current.data).clone()));
        }
        merge::get_path(&current.data, key.segments()).cloned()
    }

    fn snapshot(&self, _bindings: &BindingTable) -> Map {
        (*self.current.load().data).clone()
    }
}

impl Reload for FileSource {
    /// Re-read the origin file. Without an origin there is nothing to do.
    fn reload(&self) -> ConfigResult<u64> {
        match self.origin() {
            Some(origin) => self.load_file(&origin.path, origin.format),
            None => Ok(self.generation()),
        }
    }
}
