//! Layered configuration sources.
//!
//! Five tiers, highest priority first:
//! 1. **Override** - values from [`Config::set`](crate::Config::set)
//! 2. **Flag** - command-line flags that were explicitly passed
//! 3. **Environment** - environment variables, through the binding table
//! 4. **File** - the config file found by `read_in_config`
//! 5. **Default** - values from `set_default`
//!
//! Every source keeps its data as an immutable [`Snapshot`] behind an
//! `ArcSwap`: a reload or write builds a whole new snapshot and swaps it in,
//! so readers never see a half-updated tree.

mod env;
mod file;
mod flag;
mod map;

pub use env::{EnvProvider, EnvSource, MapEnv, SystemEnv};
pub use file::{FileOrigin, FileSettings, FileSource, SUPPORTED_EXTENSIONS, expand_home};
pub use flag::{FlagSource, FlagValue, FlagValues};
pub use map::MapSource;

use crate::binding::BindingTable;
use crate::error::ConfigResult;
use crate::key::KeyPath;
use crate::merge::Map;
use serde_json::Value;
use std::sync::Arc;

/// Priority tier of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// `set_default` values (lowest priority)
    Default = 0,
    /// Config file contents
    File = 1,
    /// Environment variables
    Environment = 2,
    /// Command-line flags
    Flag = 3,
    /// Explicit `set` calls (highest priority)
    Override = 4,
}

impl SourceKind {
    /// All kinds in resolution order, highest priority first.
    pub const RESOLUTION_ORDER: [SourceKind; 5] = [
        SourceKind::Override,
        SourceKind::Flag,
        SourceKind::Environment,
        SourceKind::File,
        SourceKind::Default,
    ];
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Default => write!(f, "default"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Environment => write!(f, "environment"),
            SourceKind::Flag => write!(f, "flag"),
            SourceKind::Override => write!(f, "override"),
        }
    }
}

/// Immutable data of a source at one generation.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub data: Arc<T>,
    pub generation: u64,
}

impl<T> Snapshot<T> {
    pub fn new(data: T, generation: u64) -> Self {
        Self {
            data: Arc::new(data),
            generation,
        }
    }

    /// The snapshot that follows this one, holding `data`.
    pub fn next(&self, data: T) -> Self {
        Self::new(data, self.generation + 1)
    }
}

/// A provider of configuration data with a fixed priority tier.
pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Generation of the currently visible data.
    fn generation(&self) -> u64;

    /// Value stored for `key`, translating through `bindings` where the
    /// source cannot address keys directly.
    fn lookup(&self, key: &KeyPath, bindings: &BindingTable) -> Option<Value>;

    /// Everything this source can enumerate, as a nested mapping.
    fn snapshot(&self, bindings: &BindingTable) -> Map;
}

/// Sources whose data can be re-read from what backs them.
///
/// A reload is all-or-nothing: on error the previous snapshot stays visible.
pub trait Reload: Source {
    /// Re-read the backing store, returning the new generation.
    fn reload(&self) -> ConfigResult<u64>;
}
