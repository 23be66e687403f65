//! Dynamic value types for saved object state and input slots

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic value stored in saved state or in an input slot
///
/// Kept to scalars so that equality and hashing are well defined across
/// peers. Floats compare bit-for-bit in hashes; the simulation is expected
/// to be deterministic, so no epsilon is applied anywhere in the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// No value / null
    #[default]
    Null,
    /// Boolean value (buttons, flags)
    Bool(bool),
    /// Integer value (counters, discrete axes)
    Int(i64),
    /// Floating point value (analog axes, positions)
    Float(f64),
    /// String value
    String(String),
}

/// A map of string keys to dynamic values
///
/// Uses IndexMap to preserve insertion order. Equality ignores order.
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    /// Interpolate between two values
    ///
    /// Numeric values blend linearly (integers are rounded); anything else
    /// snaps to `to`. Intended for `interpolate_state` implementations.
    pub fn lerp(from: &Value, to: &Value, weight: f32) -> Value {
        let weight = f64::from(weight.clamp(0.0, 1.0));
        match (from, to) {
            (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * weight),
            (Value::Int(a), Value::Int(b)) => {
                let blended = *a as f64 + (*b - *a) as f64 * weight;
                Value::Int(blended.round() as i64)
            }
            _ => to.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
