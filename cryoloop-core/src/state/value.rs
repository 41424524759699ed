//! Exposed value types
//!
//! The closed set of value types an exposed state can carry, and the
//! tagged value used to move them through the type-erased accessor.

use core::fmt::Write as _;

use heapless::String;

/// Rendered value, as handed to the presentation layer
pub type DisplayString = String<24>;

/// Value type tag of an exposed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueType {
    Double,
    Int,
    Bool,
    /// Position in a selection
    Index,
    /// No value (actions)
    Unknown,
}

/// A value of one of the exposed types
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    Double(f64),
    Int(i32),
    Bool(bool),
    Index(u16),
}

impl Value {
    /// Type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Double(_) => ValueType::Double,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Index(_) => ValueType::Index,
        }
    }

    /// Zero value of a type, `None` for [`ValueType::Unknown`]
    pub fn zero(value_type: ValueType) -> Option<Value> {
        match value_type {
            ValueType::Double => Some(Value::Double(0.0)),
            ValueType::Int => Some(Value::Int(0)),
            ValueType::Bool => Some(Value::Bool(false)),
            ValueType::Index => Some(Value::Index(0)),
            ValueType::Unknown => None,
        }
    }

    /// Render for display
    pub fn render(&self) -> DisplayString {
        let mut out = DisplayString::new();
        // Every rendering fits; truncation is the worst case
        let _ = match self {
            Value::Double(v) => write!(out, "{:.2}", v).or_else(|_| {
                // Magnitudes past the buffer fall back to exponent form
                out.clear();
                write!(out, "{:.2e}", v)
            }),
            Value::Int(v) => write!(out, "{}", v),
            Value::Bool(true) => out.push_str("ON").map_err(|_| core::fmt::Error),
            Value::Bool(false) => out.push_str("OFF").map_err(|_| core::fmt::Error),
            Value::Index(v) => write!(out, "#{}", v),
        };
        out
    }
}

/// Rust types that map onto one exposed value type
pub trait StateValue: Copy {
    /// Tag this type is stored under
    const TYPE: ValueType;

    /// Wrap into a tagged value
    fn into_value(self) -> Value;

    /// Unwrap a tagged value of the same type
    fn from_value(value: Value) -> Option<Self>;
}

impl StateValue for f64 {
    const TYPE: ValueType = ValueType::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl StateValue for i32 {
    const TYPE: ValueType = ValueType::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl StateValue for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl StateValue for u16 {
    const TYPE: ValueType = ValueType::Index;

    fn into_value(self) -> Value {
        Value::Index(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Index(v) => Some(v),
            _ => None,
        }
    }
}
