//! Translation of canonical keys into external names.
//!
//! Environment variables and command-line flags cannot enumerate config keys
//! on their own, so lookups against them go through a [`BindingTable`]:
//! either an explicit binding registered by the caller, or the default
//! derivation rule for the source kind.

use crate::error::{ConfigError, ConfigResult};
use crate::key::KeyPath;
use crate::sources::SourceKind;
use std::collections::{HashMap, HashSet};

/// Explicit key → external name bindings plus the derivation settings.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    env: HashMap<KeyPath, Vec<String>>,
    flags: HashMap<KeyPath, String>,
    env_prefix: Option<String>,
    aliases: HashMap<KeyPath, KeyPath>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `external_name` for `key` on the given source kind.
    ///
    /// Environment keys may accumulate several names; the first variable
    /// present wins. A flag key has exactly one name; rebinding replaces it.
    /// Other source kinds address their data by key and ignore bindings.
    pub fn bind(&mut self, key: KeyPath, kind: SourceKind, external_name: impl Into<String>) {
        let name = external_name.into();
        match kind {
            SourceKind::Environment => {
                let names = self.env.entry(key).or_default();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            SourceKind::Flag => {
                self.flags.insert(key, name);
            }
            SourceKind::Default | SourceKind::File | SourceKind::Override => {}
        }
    }

    pub fn set_env_prefix(&mut self, prefix: &str) {
        self.env_prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_uppercase())
        };
    }

    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Default environment name for `key`: segments joined with `_`,
    /// upper-cased, behind the prefix when one is set.
    pub fn derived_env_name(&self, key: &KeyPath) -> String {
        let name = key.joined("_").to_uppercase();
        match &self.env_prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name,
        }
    }

    /// Candidate environment variable names for `key`, in lookup order.
    pub fn env_names(&self, key: &KeyPath) -> Vec<String> {
        match self.env.get(key) {
            Some(names) if !names.is_empty() => names.clone(),
            _ => vec![self.derived_env_name(key)],
        }
    }

    /// Flag name for `key`: the explicit binding or the dotted key itself.
    pub fn flag_name(&self, key: &KeyPath) -> String {
        self.flags
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// True when `key` has an explicit binding on `kind`.
    pub fn is_bound(&self, key: &KeyPath, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Environment => self.env.contains_key(key),
            SourceKind::Flag => self.flags.contains_key(key),
            SourceKind::Default | SourceKind::File | SourceKind::Override => false,
        }
    }

    /// True when some key is explicitly bound to flag `name`.
    pub fn is_flag_name_bound(&self, name: &str) -> bool {
        self.flags.values().any(|bound| bound == name)
    }

    /// Keys with an explicit binding on `kind`.
    pub fn bound_keys(&self, kind: SourceKind) -> Vec<&KeyPath> {
        match kind {
            SourceKind::Environment => self.env.keys().collect(),
            SourceKind::Flag => self.flags.keys().collect(),
            SourceKind::Default | SourceKind::File | SourceKind::Override => Vec::new(),
        }
    }

    /// Make `alias` read and write through to `target`.
    pub fn register_alias(&mut self, alias: KeyPath, target: KeyPath) -> ConfigResult<()> {
        let cycle = || {
            ConfigError::invalid_key(
                &alias.to_string(),
                format!("aliasing to '{target}' would create a cycle"),
            )
        };
        let mut seen = HashSet::new();
        let mut current = &target;
        loop {
            if *current == alias || !seen.insert(current) {
                return Err(cycle());
            }
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        self.aliases.insert(alias, target);
        Ok(())
    }

    /// Follow alias links from `key` to the canonical key.
    pub fn resolve_alias(&self, key: &KeyPath) -> KeyPath {
        let mut current = key;
        // Cycles are rejected at registration, so the chain is finite.
        while let Some(next) = self.aliases.get(current) {
            current = next;
        }
        current.clone()
    }
}
