//! The Environment tier.
//!
//! Variables are read through an [`EnvProvider`] and captured into a
//! snapshot, so a lookup never touches the process environment directly.
//! Keys are translated into variable names by the binding table.

use super::{Reload, Snapshot, Source, SourceKind};
use crate::binding::BindingTable;
use crate::error::ConfigResult;
use crate::key::KeyPath;
use crate::merge::{self, Map};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Something that can list environment variables.
pub trait EnvProvider: Send + Sync {
    fn vars(&self) -> HashMap<String, String>;
}

/// The process environment. Non-UTF-8 names and values are converted lossily.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn vars(&self) -> HashMap<String, String> {
        std::env::vars_os()
            .map(|(name, value)| {
                (
                    name.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }
}

/// An in-memory environment.
#[derive(Debug, Default)]
pub struct MapEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl MapEnv {
    pub fn new<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Mutex::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.lock().remove(name);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EnvProvider for MapEnv {
    fn vars(&self) -> HashMap<String, String> {
        self.lock().clone()
    }
}

/// Captured environment plus the switches that govern lookups.
#[derive(Debug, Clone, Default)]
struct EnvState {
    active: bool,
    automatic: bool,
    allow_empty: bool,
    vars: HashMap<String, String>,
}

/// The Environment tier.
///
/// Inactive until a prefix, binding or automatic mode is configured. Bound
/// keys are always looked up; with automatic mode every key is looked up
/// under its derived name.
pub struct EnvSource {
    provider: Arc<dyn EnvProvider>,
    current: ArcSwap<Snapshot<EnvState>>,
}

impl EnvSource {
    pub fn new(provider: Arc<dyn EnvProvider>) -> Self {
        Self {
            provider,
            current: ArcSwap::from_pointee(Snapshot::new(EnvState::default(), 0)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.load().data.active
    }

    /// Activate the source and capture the environment.
    pub(crate) fn activate(&self) -> u64 {
        self.capture(|state| state.active = true)
    }

    /// Look up every key under its derived name.
    pub(crate) fn enable_automatic(&self) -> u64 {
        self.capture(|state| {
            state.active = true;
            state.automatic = true;
        })
    }

    /// Treat empty variables as set.
    pub(crate) fn set_allow_empty(&self, allow: bool) -> u64 {
        self.capture(|state| state.allow_empty = allow)
    }

    /// Re-read the provider into a new snapshot, applying `edit` to the
    /// switches first.
    fn capture(&self, edit: impl FnOnce(&mut EnvState)) -> u64 {
        let current = self.current.load_full();
        let mut state = EnvState {
            active: current.data.active,
            automatic: current.data.automatic,
            allow_empty: current.data.allow_empty,
            vars: self.provider.vars(),
        };
        edit(&mut state);
        let next = current.next(state);
        let generation = next.generation;
        self.current.store(Arc::new(next));
        debug!(source = %SourceKind::Environment, generation, "environment captured");
        generation
    }

    fn leaf(&self, state: &EnvState, key: &KeyPath, bindings: &BindingTable) -> Option<Value> {
        if !state.automatic && !bindings.is_bound(key, SourceKind::Environment) {
            return None;
        }
        bindings
            .env_names(key)
            .iter()
            .filter_map(|name| state.vars.get(name))
            .find(|value| state.allow_empty || !value.is_empty())
            .map(|value| Value::String(value.clone()))
    }

    /// Bound keys strictly below `prefix` that currently resolve.
    fn bound_below(&self, state: &EnvState, prefix: &KeyPath, bindings: &BindingTable) -> Map {
        let mut map = Map::new();
        for key in bindings.bound_keys(SourceKind::Environment) {
            if key == prefix {
                continue;
            }
            let Some(rest) = prefix.strip_prefix_of(key) else {
                continue;
            };
            if let Some(value) = self.leaf(state, key, bindings) {
                merge::set_path(&mut map, rest.segments(), value);
            }
        }
        map
    }
}

impl Source for EnvSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Environment
    }

    fn generation(&self) -> u64 {
        self.current.load().generation
    }

    fn lookup(&self, key: &KeyPath, bindings: &BindingTable) -> Option<Value> {
        let current = self.current.load();
        let state = &current.data;
        if !state.active {
            return None;
        }
        if !key.is_root()
            && let Some(value) = self.leaf(state, key, bindings)
        {
            return Some(value);
        }
        let below = self.bound_below(state, key, bindings);
        if below.is_empty() {
            None
        } else {
            Some(Value::Object(below))
        }
    }

    fn snapshot(&self, bindings: &BindingTable) -> Map {
        let current = self.current.load();
        if !current.data.active {
            return Map::new();
        }
        self.bound_below(&current.data, &KeyPath::root(), bindings)
    }
}

impl Reload for EnvSource {
    fn reload(&self) -> ConfigResult<u64> {
        Ok(self.capture(|_| {}))
    }
}
