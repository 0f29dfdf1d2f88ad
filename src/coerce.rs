//! Conversion of resolved values into typed results.
//!
//! A value that already has the requested type is returned unchanged. Other
//! values go through the conversion table below; anything it does not cover
//! is a [`Mismatch`].
//!
//! | target          | accepted                                              |
//! |-----------------|-------------------------------------------------------|
//! | integer         | integers, integral floats, base-10 strings, bools     |
//! | bool            | bools, `1`/`0`, `true/yes/on/1`, `false/no/off/0`     |
//! | float           | numbers, numeric strings                              |
//! | duration        | `1h30m`-style strings, bare numbers as seconds        |
//! | string          | anything; sequences and mappings as compact JSON      |
//! | string slice    | sequences, comma or whitespace separated strings      |
//! | string map      | mappings, JSON object strings                         |
//!
//! Null converts to the target's zero value.

use crate::format::type_name;
use crate::merge::Map;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// A value that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: &'static str,
    pub found: String,
}

impl Mismatch {
    fn new(expected: &'static str, value: &Value) -> Self {
        let found = match value {
            Value::String(s) => format!("string \"{s}\""),
            Value::Array(_) | Value::Object(_) => type_name(value).to_string(),
            other => format!("{} {other}", type_name(other)),
        };
        Self { expected, found }
    }
}

/// Types a resolved value can be read as.
///
/// `Default` supplies the result for absent keys and null values.
pub trait FromValue: Sized + Default {
    /// Name used in mismatch errors.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Result<Self, Mismatch>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        Ok(to_string(value))
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_bool(value)
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_i64(value)
    }
}

impl FromValue for u64 {
    const EXPECTED: &'static str = "unsigned integer";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_u64(value)
    }
}

macro_rules! narrow_int {
    ($($ty:ty => $expected:literal via $wide:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_value(value: &Value) -> Result<Self, Mismatch> {
                    let wide = $wide(value).map_err(|_| Mismatch::new($expected, value))?;
                    <$ty>::try_from(wide).map_err(|_| Mismatch::new($expected, value))
                }
            }
        )*
    };
}

narrow_int! {
    i32 => "i32" via to_i64,
    u16 => "u16" via to_u64,
    u32 => "u32" via to_u64,
    usize => "usize" via to_u64,
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_f64(value)
    }
}

impl FromValue for Duration {
    const EXPECTED: &'static str = "duration";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_duration(value)
    }
}

impl FromValue for Vec<String> {
    const EXPECTED: &'static str = "string slice";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_string_slice(value)
    }
}

impl FromValue for Map {
    const EXPECTED: &'static str = "string map";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        to_string_map(value)
    }
}

impl FromValue for HashMap<String, String> {
    const EXPECTED: &'static str = "string to string map";

    fn from_value(value: &Value) -> Result<Self, Mismatch> {
        Ok(to_string_map(value)
            .map_err(|_| Mismatch::new(Self::EXPECTED, value))?
            .iter()
            .map(|(k, v)| (k.clone(), to_string(v)))
            .collect())
    }
}

/// Canonical string form of any value.
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn to_bool(value: &Value) -> Result<bool, Mismatch> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(Mismatch::new(bool::EXPECTED, value)),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Mismatch::new(bool::EXPECTED, value)),
        },
        _ => Err(Mismatch::new(bool::EXPECTED, value)),
    }
}

pub fn to_i64(value: &Value) -> Result<i64, Mismatch> {
    let err = || Mismatch::new(i64::EXPECTED, value);
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| is_integral(*f)) {
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(f as i64)
                } else {
                    Err(err())
                }
            } else {
                Err(err())
            }
        }
        Value::String(s) => s.trim().parse().map_err(|_| err()),
        _ => Err(err()),
    }
}

pub fn to_u64(value: &Value) -> Result<u64, Mismatch> {
    let err = || Mismatch::new(u64::EXPECTED, value);
    match value {
        Value::Number(n) if n.is_u64() => n.as_u64().ok_or_else(err),
        Value::String(s) => s.trim().parse().map_err(|_| err()),
        _ => to_i64(value).ok().and_then(|i| u64::try_from(i).ok()).ok_or_else(err),
    }
}

pub fn to_f64(value: &Value) -> Result<f64, Mismatch> {
    let err = || Mismatch::new(f64::EXPECTED, value);
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n.as_f64().ok_or_else(err),
        Value::String(s) => s.trim().parse().map_err(|_| err()),
        _ => Err(err()),
    }
}

pub fn to_duration(value: &Value) -> Result<Duration, Mismatch> {
    let err = || Mismatch::new(Duration::EXPECTED, value);
    match value {
        Value::Null => Ok(Duration::ZERO),
        Value::Number(n) => n.as_f64().and_then(seconds).ok_or_else(err),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(secs) => seconds(secs).ok_or_else(err),
                Err(_) => parse_duration(s).ok_or_else(err),
            }
        }
        _ => Err(err()),
    }
}

pub fn to_string_slice(value: &Value) -> Result<Vec<String>, Mismatch> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().map(to_string).collect()),
        Value::String(s) => {
            let parts: Vec<&str> = if s.contains(',') {
                s.split(',').collect()
            } else {
                s.split_whitespace().collect()
            };
            Ok(parts
                .into_iter()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect())
        }
        Value::Object(_) => Err(Mismatch::new(Vec::<String>::EXPECTED, value)),
        scalar => Ok(vec![to_string(scalar)]),
    }
}

pub fn to_string_map(value: &Value) -> Result<Map, Mismatch> {
    let err = || Mismatch::new(Map::EXPECTED, value);
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(err()),
        },
        _ => Err(err()),
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0
}

fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

const UNITS: [(&str, f64); 7] = [
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
];

/// Parse a unit-suffixed duration such as `300ms`, `1.5h` or `2h45m`.
///
/// Every number needs a unit; use [`to_duration`] for bare seconds.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }

    let mut nanos = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if !number.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        let amount: f64 = number.parse().ok()?;
        rest = &rest[number_len..];

        // Two-letter units first so "ms" is not read as "m".
        let (unit, scale) = UNITS
            .iter()
            .filter(|(unit, _)| rest.starts_with(unit))
            .max_by_key(|(unit, _)| unit.len())?;
        nanos += amount * scale;
        rest = &rest[unit.len()..];
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}
