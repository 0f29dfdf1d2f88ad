//! Precedence resolution across the source registry.
//!
//! A lookup walks the sources from Override down to Default and takes the
//! first value found. When that value is a mapping, the result is the
//! structural merge of the subtree: every child key any source holds under a
//! mapping at that path, each resolved again by precedence.

use crate::binding::BindingTable;
use crate::key::KeyPath;
use crate::merge::{self, Map};
use crate::sources::{
    EnvProvider, EnvSource, FileSource, FlagSource, MapSource, Source, SourceKind,
};
use arc_swap::{ArcSwap, ArcSwapOption};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Fully merged settings, stamped with the generation they were built at.
struct MergedView {
    generation: u64,
    settings: Arc<Map>,
}

/// The five sources plus the shared binding table.
///
/// Writers hold the registry lock while they swap a source's snapshot and
/// bump the generation. Readers only load snapshots.
pub(crate) struct Registry {
    pub(crate) defaults: MapSource,
    pub(crate) file: FileSource,
    pub(crate) env: EnvSource,
    pub(crate) flags: FlagSource,
    pub(crate) overrides: MapSource,
    bindings: ArcSwap<BindingTable>,
    generation: AtomicU64,
    merged: ArcSwapOption<MergedView>,
    writer: Mutex<()>,
}

impl Registry {
    pub(crate) fn new(delimiter: char, env: Arc<dyn EnvProvider>) -> Self {
        Self {
            defaults: MapSource::new(SourceKind::Default, delimiter),
            file: FileSource::new(delimiter),
            env: EnvSource::new(env),
            flags: FlagSource::new(delimiter),
            overrides: MapSource::new(SourceKind::Override, delimiter),
            bindings: ArcSwap::from_pointee(BindingTable::new()),
            generation: AtomicU64::new(0),
            merged: ArcSwapOption::empty(),
            writer: Mutex::new(()),
        }
    }

    /// Serialize a mutation. The guard must be held across the source swap
    /// and the matching [`Registry::commit`].
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that some source changed, returning the new handle generation.
    pub(crate) fn commit(&self, change: &str) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, change, "configuration changed");
        generation
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn bindings(&self) -> Arc<BindingTable> {
        self.bindings.load_full()
    }

    /// Edit the binding table. Callers hold the registry lock.
    pub(crate) fn update_bindings<R>(&self, edit: impl FnOnce(&mut BindingTable) -> R) -> R {
        let mut table = (*self.bindings.load_full()).clone();
        let result = edit(&mut table);
        self.bindings.store(Arc::new(table));
        result
    }

    fn source(&self, kind: SourceKind) -> &dyn Source {
        match kind {
            SourceKind::Override => &self.overrides,
            SourceKind::Flag => &self.flags,
            SourceKind::Environment => &self.env,
            SourceKind::File => &self.file,
            SourceKind::Default => &self.defaults,
        }
    }

    /// Sources in resolution order, highest priority first.
    fn sources(&self) -> [&dyn Source; 5] {
        SourceKind::RESOLUTION_ORDER.map(|kind| self.source(kind))
    }

    /// Resolve `key` (after alias translation), falling back to the default
    /// value of an untouched bound flag.
    pub(crate) fn get(&self, key: &KeyPath) -> Option<Value> {
        let bindings = self.bindings();
        let key = bindings.resolve_alias(key);
        self.resolve(&key, &bindings)
            .or_else(|| self.flags.lookup_default(&key, &bindings))
    }

    /// True when some source holds `key`. Flag defaults do not count.
    pub(crate) fn is_set(&self, key: &KeyPath) -> bool {
        let bindings = self.bindings();
        let key = bindings.resolve_alias(key);
        self.sources()
            .iter()
            .any(|source| source.lookup(&key, &bindings).is_some())
    }

    fn resolve(&self, key: &KeyPath, bindings: &BindingTable) -> Option<Value> {
        for source in self.sources() {
            match source.lookup(key, bindings) {
                Some(Value::Object(_)) => {
                    return Some(Value::Object(self.merge_at(key, bindings)));
                }
                Some(value) => return Some(value),
                None => {}
            }
        }
        None
    }

    /// Structural merge of the subtree at `key`.
    fn merge_at(&self, key: &KeyPath, bindings: &BindingTable) -> Map {
        let mut children = BTreeSet::new();
        for source in self.sources() {
            if let Some(Value::Object(map)) = source.lookup(key, bindings) {
                children.extend(map.keys().cloned());
            }
        }

        let mut merged = Map::new();
        for child in children {
            let path = key.join(&KeyPath::from_segments(vec![child.clone()]));
            if let Some(value) = self.resolve(&path, bindings) {
                merged.insert(child, value);
            }
        }
        merged
    }

    /// The merged view of every source, rebuilt when the generation moved.
    pub(crate) fn all_settings(&self) -> Arc<Map> {
        let generation = self.generation();
        if let Some(view) = self.merged.load_full()
            && view.generation == generation
        {
            return view.settings.clone();
        }

        let settings = Arc::new(self.compute_all());
        self.merged.store(Some(Arc::new(MergedView {
            generation,
            settings: settings.clone(),
        })));
        debug!(generation, "merged view rebuilt");
        settings
    }

    fn compute_all(&self) -> Map {
        let bindings = self.bindings();
        let mut settings = self.merge_at(&KeyPath::root(), &bindings);

        // Untouched bound flags still contribute their defaults.
        for key in bindings.bound_keys(SourceKind::Flag) {
            if merge::get_path(&settings, key.segments()).is_none()
                && let Some(value) = self.flags.lookup_default(key, &bindings)
            {
                merge::set_path(&mut settings, key.segments(), value);
            }
        }
        settings
    }
}
