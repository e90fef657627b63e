use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single filter or option value as it travels between the URL, the form
/// and the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    /// Empty text counts as "no value"; every other variant is a value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(text) if text.is_empty())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Equality with numeric widening, so `Int(1)` equals `Float(1.0)`.
    pub fn strict_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Int(a), Scalar::Float(b)) | (Scalar::Float(b), Scalar::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Parses a number the way a form input would; `None` for NaN or garbage.
    pub fn parse_number(raw: &str) -> Option<Scalar> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Scalar::Int(int));
        }
        match trimmed.parse::<f64>() {
            Ok(float) if float.is_finite() => Some(Scalar::Float(float)),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Bool(flag) => Some(Scalar::Bool(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| number.as_f64().map(Scalar::Float)),
            Value::String(text) => Some(Scalar::Text(text.clone())),
            Value::Null => None,
            other => Some(Scalar::Text(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(flag) => Value::Bool(*flag),
            Scalar::Int(int) => Value::from(*int),
            Scalar::Float(float) => Value::from(*float),
            Scalar::Text(text) => Value::String(text.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(flag) => write!(f, "{flag}"),
            Scalar::Int(int) => write!(f, "{int}"),
            // `Debug` keeps the fractional part, so `1.0` reads back as a float.
            Scalar::Float(float) => write!(f, "{float:?}"),
            Scalar::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}
