//! In-memory sources backing the Default and Override tiers.

use super::{Snapshot, Source, SourceKind};
use crate::binding::BindingTable;
use crate::key::KeyPath;
use crate::merge::{self, Map};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A nested mapping written key by key.
///
/// Writes clone the current tree, modify the clone and swap it in. Callers
/// serialize writers; readers never block.
pub struct MapSource {
    kind: SourceKind,
    delimiter: char,
    current: ArcSwap<Snapshot<Map>>,
}

impl MapSource {
    pub fn new(kind: SourceKind, delimiter: char) -> Self {
        Self {
            kind,
            delimiter,
            current: ArcSwap::from_pointee(Snapshot::new(Map::new(), 0)),
        }
    }

    /// Store `value` at `key`, returning the new generation.
    pub(crate) fn set(&self, key: &KeyPath, value: Value) -> u64 {
        let value = merge::normalize_value(value, self.delimiter);
        self.update(|map| {
            if key.is_root() {
                if let Value::Object(root) = value {
                    *map = root;
                }
            } else {
                merge::set_path(map, key.segments(), value);
            }
        })
    }

    /// Remove `key`, returning the new generation if anything was removed.
    pub(crate) fn unset(&self, key: &KeyPath) -> Option<u64> {
        let current = self.current.load();
        merge::get_path(&current.data, key.segments())?;
        Some(self.update(|map| {
            merge::remove_path(map, key.segments());
        }))
    }

    fn update(&self, edit: impl FnOnce(&mut Map)) -> u64 {
        let current = self.current.load_full();
        let mut data = (*current.data).clone();
        edit(&mut data);
        let next = current.next(data);
        let generation = next.generation;
        self.current.store(Arc::new(next));
        debug!(source = %self.kind, generation, "source updated");
        generation
    }
}

impl Source for MapSource {
    fn kind(&self) -> SourceKind {
        self.kind
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> KeyPath {
        KeyPath::parse(s).unwrap()
    }

    #[test]
    fn test_set_and_lookup() {
        let source = MapSource::new(SourceKind::Override, '.');
        let bindings = BindingTable::new();
        source.set(&key("Db.Host"), json!("localhost"));

        assert_eq!(
            source.lookup(&key("db.host"), &bindings),
            Some(json!("localhost"))
        );
        assert_eq!(
            source.lookup(&key("db"), &bindings),
            Some(json!({"host": "localhost"}))
        );
        assert_eq!(source.lookup(&key("db.port"), &bindings), None);
    }

    #[test]
    fn test_set_normalizes_nested_values() {
        let source = MapSource::new(SourceKind::Override, '.');
        source.set(&key("redis"), json!({"DB": 10, "pool.size": 4}));
        assert_eq!(
            source.lookup(&key("redis.pool.size"), &BindingTable::new()),
            Some(json!(4))
        );
        assert_eq!(
            source.lookup(&key("redis.db"), &BindingTable::new()),
            Some(json!(10))
        );
    }

    #[test]
    fn test_generation_advances_on_every_write() {
        let source = MapSource::new(SourceKind::Default, '.');
        assert_eq!(source.generation(), 0);
        assert_eq!(source.set(&key("a"), json!(1)), 1);
        assert_eq!(source.set(&key("a"), json!(2)), 2);
        assert_eq!(source.unset(&key("missing")), None);
        assert_eq!(source.unset(&key("a")), Some(3));
        assert_eq!(source.generation(), 3);
        assert!(source.snapshot(&BindingTable::new()).is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let source = MapSource::new(SourceKind::Default, '.');
        source.set(&key("a"), json!(1));
        let before = source.snapshot(&BindingTable::new());
        source.set(&key("a"), json!(2));
        assert_eq!(before.get("a"), Some(&json!(1)));
    }
}
