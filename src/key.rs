//! Canonical hierarchical keys.
//!
//! A [`KeyPath`] is the case-folded segment sequence of a dotted key such as
//! `Database.Host`. Equality and hashing only look at the normalized
//! segments, so `Database.Host` and `database.host` address the same entry.

use crate::error::{ConfigError, ConfigResult};
use std::fmt;

/// Default separator between key segments.
pub const DEFAULT_DELIMITER: char = '.';

/// Normalized, case-insensitive key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// The empty path, addressing the whole configuration tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a key using the default `.` delimiter.
    pub fn parse(key: &str) -> ConfigResult<Self> {
        Self::parse_with(key, DEFAULT_DELIMITER)
    }

    /// Parse a key, splitting on `delimiter` and case-folding every segment.
    ///
    /// Fails with [`ConfigError::InvalidKey`] on empty input or when any
    /// segment is empty (`a..b`, `.a`, `a.`).
    pub fn parse_with(key: &str, delimiter: char) -> ConfigResult<Self> {
        if key.is_empty() {
            return Err(ConfigError::invalid_key(key, "key is empty"));
        }
        let mut segments = Vec::new();
        for (index, segment) in key.split(delimiter).enumerate() {
            if segment.is_empty() {
                return Err(ConfigError::invalid_key(
                    key,
                    format!("segment {index} is empty"),
                ));
            }
            segments.push(segment.to_lowercase());
        }
        Ok(Self { segments })
    }

    /// Build a path from already-normalized segments.
    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path with one more segment appended.
    ///
    /// The segment is case-folded but not split.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_lowercase());
        Self { segments }
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &KeyPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// True when `self` is an ancestor of `other` or equal to it.
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        other.segments.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a == b)
    }

    /// The remainder of `other` below `self`, if `self` is a prefix of it.
    pub fn strip_prefix_of(&self, other: &KeyPath) -> Option<KeyPath> {
        if !self.is_prefix_of(other) {
            return None;
        }
        Some(Self {
            segments: other.segments[self.segments.len()..].to_vec(),
        })
    }

    /// Join the segments with an arbitrary separator.
    pub fn joined(&self, separator: &str) -> String {
        self.segments.join(separator)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl std::str::FromStr for KeyPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
