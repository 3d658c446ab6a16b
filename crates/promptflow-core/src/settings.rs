//! Loosely-typed settings passed through to providers.
//!
//! Flow files carry an open mapping of settings per node (`temperature`,
//! `max_tokens`, provider-specific knobs). Values are kept as a tagged
//! [`SettingValue`] so a provider can extract what it understands and report a
//! mistyped value instead of silently falling back to a default.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<SettingValue>),
    Map(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Null => "null",
            SettingValue::Bool(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::Float(_) => "float",
            SettingValue::String(_) => "string",
            SettingValue::List(_) => "list",
            SettingValue::Map(_) => "map",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Null => f.write_str("null"),
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Integer(i) => write!(f, "{i}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(s) => f.write_str(s),
            SettingValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            SettingValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Integer(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("setting '{key}' expected {expected}, found {found}")]
    Mistyped {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("setting '{key}' out of range: {value}")]
    OutOfRange { key: String, value: String },
}

/// Ordered mapping of setting name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, SettingValue>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.0.iter()
    }

    /// Numeric setting. Integers are widened; `null` counts as absent.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, SettingError> {
        self.typed(key, "number", SettingValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, SettingError> {
        self.typed(key, "integer", SettingValue::as_i64)
    }

    /// Non-negative integer setting that fits in a `u32` (token limits).
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, SettingError> {
        match self.get_i64(key)? {
            None => Ok(None),
            Some(v) => u32::try_from(v).map(Some).map_err(|_| SettingError::OutOfRange {
                key: key.to_string(),
                value: v.to_string(),
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingError> {
        self.typed(key, "boolean", SettingValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>, SettingError> {
        match self.0.get(key) {
            None | Some(SettingValue::Null) => Ok(None),
            Some(SettingValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(SettingError::Mistyped {
                key: key.to_string(),
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: &'static str,
        extract: impl Fn(&SettingValue) -> Option<T>,
    ) -> Result<Option<T>, SettingError> {
        match self.0.get(key) {
            None | Some(SettingValue::Null) => Ok(None),
            Some(value) => extract(value).map(Some).ok_or_else(|| SettingError::Mistyped {
                key: key.to_string(),
                expected,
                found: value.type_name(),
            }),
        }
    }
}

impl FromIterator<(String, SettingValue)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
