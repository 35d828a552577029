//! # Coercion Function Set
//!
//! Named, total, deterministic value transforms applied before any
//! constraint check. Every built-in coercion returns a value for every input:
//! an input it cannot convert comes back unchanged, and the following type
//! check reports it. `null` passes through every coercion unchanged
//! (`empty_to_null` produces it, never consumes it).
//!
//! Instances are JSON, so dates and datetimes are ISO-8601 text and UUIDs are
//! canonical hyphenated lower-case text.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

/// A built-in coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coercion {
    ToString,
    ToInteger,
    ToFloat,
    ToBoolean,
    ToDatetime,
    ToDate,
    ToLowercase,
    ToUppercase,
    StripWhitespace,
    ToList,
    ToUuid,
    EmptyToNull,
}

impl Coercion {
    /// Every built-in coercion.
    pub const ALL: [Coercion; 12] = [
        Self::ToString,
        Self::ToInteger,
        Self::ToFloat,
        Self::ToBoolean,
        Self::ToDatetime,
        Self::ToDate,
        Self::ToLowercase,
        Self::ToUppercase,
        Self::StripWhitespace,
        Self::ToList,
        Self::ToUuid,
        Self::EmptyToNull,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToString => "to_string",
            Self::ToInteger => "to_integer",
            Self::ToFloat => "to_float",
            Self::ToBoolean => "to_boolean",
            Self::ToDatetime => "to_datetime",
            Self::ToDate => "to_date",
            Self::ToLowercase => "to_lowercase",
            Self::ToUppercase => "to_uppercase",
            Self::StripWhitespace => "strip_whitespace",
            Self::ToList => "to_list",
            Self::ToUuid => "to_uuid",
            Self::EmptyToNull => "empty_to_null",
        }
    }

    /// Look up a coercion by name.
    ///
    /// Accepts the canonical names plus the `coerce_`-prefixed forms
    /// (`coerce_to_lowercase`, `coerce_to_stripped_string`,
    /// `coerce_empty_to_null`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name.strip_prefix("coerce_").unwrap_or(name);
        if bare == "to_stripped_string" {
            return Some(Self::StripWhitespace);
        }
        Self::ALL.into_iter().find(|c| c.name() == bare)
    }

    /// Apply the coercion.
    pub fn apply(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        match self {
            Self::ToString => to_string(value),
            Self::ToInteger => to_integer(value),
            Self::ToFloat => to_float(value),
            Self::ToBoolean => to_boolean(value),
            Self::ToDatetime => to_datetime(value),
            Self::ToDate => to_date(value),
            Self::ToLowercase => map_text(value, |s| s.to_lowercase()),
            Self::ToUppercase => map_text(value, |s| s.to_uppercase()),
            Self::StripWhitespace => map_text(value, |s| s.trim().to_string()),
            Self::ToList => match value {
                Value::Array(_) => value,
                other => Value::Array(vec![other]),
            },
            Self::ToUuid => to_uuid(value),
            Self::EmptyToNull => empty_to_null(value),
        }
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

fn to_string(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Array(_) | Value::Object(_) => match serde_json::to_string(&value) {
            Ok(text) => Value::String(text),
            Err(_) => value,
        },
        other => other,
    }
}

fn to_integer(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.is_i64() || n.is_u64() => value,
        Value::Number(n) => n.as_f64().and_then(truncate).unwrap_or(value),
        Value::Bool(b) => Value::from(i64::from(*b)),
        Value::String(s) => {
            if let Ok(f) = s.trim().parse::<f64>() {
                return truncate(f).unwrap_or(value);
            }
            match DateTime::parse_from_rfc3339(&s.trim().replace('Z', "+00:00")) {
                Ok(dt) => Value::from(dt.timestamp()),
                Err(_) => value,
            }
        }
        _ => value,
    }
}

fn truncate(f: f64) -> Option<Value> {
    let t = f.trunc();
    (t.is_finite() && t.abs() < 9.223_372_036_854_776e18).then(|| Value::from(t as i64))
}

fn to_float(value: Value) -> Value {
    let f = match &value {
        Value::Number(n) if n.is_f64() => return value,
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(value)
}

fn to_boolean(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            Value::Bool(n.as_i64().map_or(true, |i| i != 0))
        }
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" | "" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

/// A parsed ISO-8601 timestamp, with or without an offset.
enum Timestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    fn to_iso(&self) -> String {
        match self {
            Self::Aware(dt) => dt.to_rfc3339(),
            Self::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        }
    }

    fn date(&self) -> NaiveDate {
        match self {
            Self::Aware(dt) => dt.date_naive(),
            Self::Naive(dt) => dt.date(),
        }
    }
}

fn parse_iso(text: &str) -> Option<Timestamp> {
    let text = text.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(Timestamp::Aware(dt));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(Timestamp::Naive(dt));
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Timestamp::Naive)
}

fn to_datetime(value: Value) -> Value {
    match &value {
        Value::String(s) if s.trim().is_empty() => value,
        Value::String(s) => {
            let parsed = parse_iso(s).or_else(|| {
                ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                    .into_iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                    .map(Timestamp::Naive)
            });
            parsed.map_or(value, |ts| Value::String(ts.to_iso()))
        }
        Value::Number(n) => {
            let Some(secs) = n.as_f64() else {
                return value;
            };
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
            if !whole.is_finite() || whole.abs() >= 9.223_372_036_854_776e18 {
                return value;
            }
            match DateTime::<Utc>::from_timestamp(whole as i64, nanos) {
                Some(dt) => Value::String(dt.fixed_offset().to_rfc3339()),
                None => value,
            }
        }
        _ => value,
    }
}

fn to_date(value: Value) -> Value {
    match &value {
        Value::String(s) if s.trim().is_empty() => value,
        Value::String(s) => {
            let parsed = parse_iso(s).map(|ts| ts.date()).or_else(|| {
                ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"]
                    .into_iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            });
            parsed.map_or(value, |d| Value::String(d.format("%Y-%m-%d").to_string()))
        }
        _ => value,
    }
}

fn map_text(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn to_uuid(value: Value) -> Value {
    match &value {
        Value::String(s) => match uuid::Uuid::parse_str(s) {
            Ok(id) => Value::String(id.hyphenated().to_string()),
            Err(_) => value,
        },
        _ => value,
    }
}

fn empty_to_null(value: Value) -> Value {
    let empty = match &value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        Value::Null
    } else {
        value
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Built-in coercions are total and applying one twice changes nothing.
        #[test]
        fn coercions_are_idempotent(text in "\\PC{0,24}", n in -1.0e9f64..1.0e9) {
            for c in Coercion::ALL {
                for input in [Value::String(text.clone()), serde_json::json!(n)] {
                    let once = c.apply(input);
                    let twice = c.apply(once.clone());
                    prop_assert_eq!(once, twice, "{} not idempotent", c);
                }
            }
        }
    }
}
