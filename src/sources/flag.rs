//! The Flag tier.
//!
//! Flag values come from [`FlagValues`] providers, usually a parsed
//! `clap::ArgMatches`. Only flags that were actually passed take part in
//! resolution at this tier. The value an untouched flag carries by default
//! is kept apart and used as a last resort after the Default tier.

use super::{Reload, Snapshot, Source, SourceKind};
use crate::binding::BindingTable;
use crate::error::ConfigResult;
use crate::key::KeyPath;
use crate::merge::{self, Map};
use arc_swap::ArcSwap;
use clap::parser::ValueSource;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One flag's value and whether the user supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagValue {
    pub value: Value,
    /// Passed on the command line (or through the flag's env var).
    pub changed: bool,
}

/// A set of named flags.
pub trait FlagValues: Send + Sync {
    /// Every flag name this provider knows about.
    fn names(&self) -> Vec<String>;

    fn lookup(&self, name: &str) -> Option<FlagValue>;
}

impl FlagValues for clap::ArgMatches {
    fn names(&self) -> Vec<String> {
        self.ids().map(|id| id.as_str().to_string()).collect()
    }

    fn lookup(&self, name: &str) -> Option<FlagValue> {
        if !self.ids().any(|id| id.as_str() == name) {
            return None;
        }
        let changed = matches!(
            self.value_source(name),
            Some(ValueSource::CommandLine | ValueSource::EnvVariable)
        );

        if let Ok(Some(flag)) = self.try_get_one::<bool>(name) {
            return Some(FlagValue {
                value: Value::Bool(*flag),
                changed,
            });
        }
        if let Ok(Some(count)) = self.try_get_one::<u8>(name) {
            return Some(FlagValue {
                value: Value::from(*count),
                changed,
            });
        }

        let raw: Vec<String> = self
            .try_get_raw(name)
            .ok()
            .flatten()?
            .map(|v| v.to_string_lossy().into_owned())
            .collect();
        let value = match raw.len() {
            0 => return None,
            1 => Value::String(raw.into_iter().next()?),
            _ => Value::Array(raw.into_iter().map(Value::String).collect()),
        };
        Some(FlagValue { value, changed })
    }
}

/// Plain name → value pairs, all treated as explicitly passed.
impl FlagValues for HashMap<String, String> {
    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn lookup(&self, name: &str) -> Option<FlagValue> {
        self.get(name).map(|value| FlagValue {
            value: Value::String(value.clone()),
            changed: true,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct FlagState {
    changed: HashMap<String, Value>,
    defaults: HashMap<String, Value>,
}

/// A provider and the flag names taken from it.
struct Provider {
    flags: Arc<dyn FlagValues>,
    /// `None` takes every name.
    only: Option<BTreeSet<String>>,
}

impl Provider {
    fn takes(&self, name: &str) -> bool {
        self.only.as_ref().is_none_or(|only| only.contains(name))
    }
}

/// The Flag tier.
pub struct FlagSource {
    delimiter: char,
    providers: Mutex<Vec<Provider>>,
    current: ArcSwap<Snapshot<FlagState>>,
}

impl FlagSource {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            providers: Mutex::new(Vec::new()),
            current: ArcSwap::from_pointee(Snapshot::new(FlagState::default(), 0)),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.lock_providers().is_empty()
    }

    /// Register a provider and capture its values.
    ///
    /// With `name`, only that flag is taken from the provider; adding the
    /// same provider again widens the set. Without a name every flag is
    /// taken. Providers added later win for flag names they share with
    /// earlier ones.
    pub(crate) fn add_provider(&self, provider: Arc<dyn FlagValues>, name: Option<&str>) -> u64 {
        {
            let mut providers = self.lock_providers();
            match providers.iter_mut().find(|p| Arc::ptr_eq(&p.flags, &provider)) {
                Some(existing) => match (&mut existing.only, name) {
                    (Some(only), Some(name)) => {
                        only.insert(name.to_string());
                    }
                    (only, None) => *only = None,
                    (None, Some(_)) => {}
                },
                None => providers.push(Provider {
                    flags: provider,
                    only: name.map(|name| BTreeSet::from([name.to_string()])),
                }),
            }
        }
        self.capture()
    }

    fn lock_providers(&self) -> std::sync::MutexGuard<'_, Vec<Provider>> {
        self.providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn capture(&self) -> u64 {
        let mut state = FlagState::default();
        for provider in self.lock_providers().iter() {
            for name in provider.flags.names() {
                if !provider.takes(&name) {
                    continue;
                }
                let Some(flag) = provider.flags.lookup(&name) else {
                    continue;
                };
                if flag.changed {
                    state.defaults.remove(&name);
                    state.changed.insert(name, flag.value);
                } else {
                    state.changed.remove(&name);
                    state.defaults.insert(name, flag.value);
                }
            }
        }

        let next = self.current.load().next(state);
        let generation = next.generation;
        self.current.store(Arc::new(next));
        debug!(source = %SourceKind::Flag, generation, "flags captured");
        generation
    }

    /// Default value of the untouched flag behind `key`, if any.
    pub fn lookup_default(&self, key: &KeyPath, bindings: &BindingTable) -> Option<Value> {
        let current = self.current.load();
        let name = flag_for(key, bindings)?;
        current.data.defaults.get(&name).cloned()
    }

    /// Keys this tier can answer for: explicit bindings plus every flag name
    /// no binding claims, read as a key.
    fn known_keys(&self, state: &FlagState, bindings: &BindingTable) -> Vec<KeyPath> {
        let mut keys: Vec<KeyPath> = bindings
            .bound_keys(SourceKind::Flag)
            .into_iter()
            .cloned()
            .collect();
        for name in state.changed.keys() {
            if bindings.is_flag_name_bound(name) {
                continue;
            }
            match KeyPath::parse_with(name, self.delimiter) {
                Ok(key) => keys.push(key),
                Err(e) => warn!(flag = %name, error = %e, "flag name is not a valid key"),
            }
        }
        keys
    }
}

/// Flag name for `key`. A name claimed by another key's binding does not
/// also answer for the key it spells.
fn flag_for(key: &KeyPath, bindings: &BindingTable) -> Option<String> {
    if key.is_root() {
        return None;
    }
    let name = bindings.flag_name(key);
    if !bindings.is_bound(key, SourceKind::Flag) && bindings.is_flag_name_bound(&name) {
        return None;
    }
    Some(name)
}

impl Source for FlagSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Flag
    }

    fn generation(&self) -> u64 {
        self.current.load().generation
    }

    fn lookup(&self, key: &KeyPath, bindings: &BindingTable) -> Option<Value> {
        let current = self.current.load();
        let state = &current.data;
        if state.changed.is_empty() {
            return None;
        }
        if let Some(name) = flag_for(key, bindings)
            && let Some(value) = state.changed.get(&name)
        {
            return Some(value.clone());
        }

        let mut below = Map::new();
        for known in self.known_keys(state, bindings) {
            if &known == key {
                continue;
            }
            let Some(rest) = key.strip_prefix_of(&known) else {
                continue;
            };
            if let Some(value) = flag_for(&known, bindings).and_then(|name| state.changed.get(&name)) {
                merge::set_path(&mut below, rest.segments(), value.clone());
            }
        }
        if below.is_empty() {
            None
        } else {
            Some(Value::Object(below))
        }
    }

    fn snapshot(&self, bindings: &BindingTable) -> Map {
        match self.lookup(&KeyPath::root(), bindings) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

impl Reload for FlagSource {
    fn reload(&self) -> ConfigResult<u64> {
        Ok(self.capture())
    }
}
