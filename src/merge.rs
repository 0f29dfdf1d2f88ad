//! Nested mapping helpers.
//!
//! Source data is a tree of `serde_json::Value`s whose mapping keys are
//! case-folded on the way in. Keys that contain the delimiter are expanded
//! into nesting, with the literal dotted entry winning over a nested entry for
//! the same path.

use serde_json::Value;

/// Nested string-keyed mapping, the shape every source stores.
pub type Map = serde_json::Map<String, Value>;

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// - Mappings are merged recursively: keys in overlay override keys in base
/// - Sequences, strings, numbers, booleans are replaced entirely
/// - If overlay is null, the base value is preserved
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Case-fold every mapping key below `value` and expand delimited keys.
///
/// Sequences are left untouched: their elements are not addressable by key.
pub fn normalize_value(value: Value, delimiter: char) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map, delimiter)),
        other => other,
    }
}

/// Mapping form of [`normalize_value`].
pub fn normalize_map(map: Map, delimiter: char) -> Map {
    let mut nested = Map::new();
    let mut delimited = Vec::new();

    for (key, value) in map {
        let key = key.to_lowercase();
        let value = normalize_value(value, delimiter);
        if key.contains(delimiter) {
            delimited.push((key, value));
        } else {
            merge_entry(&mut nested, key, value);
        }
    }

    // Literal delimited keys are applied last so they shadow nested entries.
    for (key, value) in delimited {
        let segments: Vec<String> = key
            .split(delimiter)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            continue;
        }
        merge_path(&mut nested, &segments, value);
    }

    nested
}

fn merge_entry(map: &mut Map, key: String, value: Value) {
    let merged = match map.remove(&key) {
        Some(existing) => deep_merge(existing, value),
        None => value,
    };
    map.insert(key, merged);
}

/// Merge `value` into `map` at `segments`, creating or replacing
/// intermediate nodes as needed.
pub fn merge_path(map: &mut Map, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let target = descend_mut(map, parents);
    merge_entry(target, last.clone(), value);
}

/// Set `value` at `segments`, replacing whatever was there.
pub fn set_path(map: &mut Map, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let target = descend_mut(map, parents);
    target.insert(last.clone(), value);
}

fn descend_mut<'a>(map: &'a mut Map, segments: &[String]) -> &'a mut Map {
    let mut current = map;
    for segment in segments {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(inner) => inner,
            _ => unreachable!("slot was just replaced by a mapping"),
        };
    }
    current
}

/// Value stored at `segments`, if any. The empty path is not a value.
pub fn get_path<'a>(map: &'a Map, segments: &[String]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = map.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Remove the entry at `segments`, pruning parents left empty.
pub fn remove_path(map: &mut Map, segments: &[String]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return map.remove(first);
    }
    let child = map.get_mut(first)?.as_object_mut()?;
    let removed = remove_path(child, rest);
    if removed.is_some() && child.is_empty() {
        map.remove(first);
    }
    removed
}

/// Every leaf path below `map`, joined with `.`.
///
/// Empty mappings count as leaves.
pub fn leaf_keys(map: &Map) -> Vec<String> {
    let mut keys = Vec::new();
    collect_leaf_keys(map, &mut Vec::new(), &mut keys);
    keys.sort();
    keys
}

fn collect_leaf_keys(map: &Map, prefix: &mut Vec<String>, out: &mut Vec<String>) {
    for (key, value) in map {
        prefix.push(key.clone());
        match value {
            Value::Object(inner) if !inner.is_empty() => collect_leaf_keys(inner, prefix, out),
            _ => out.push(prefix.join(".")),
        }
        prefix.pop();
    }
}
