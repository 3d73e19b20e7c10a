//! Values produced by converters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Generic value exchanged between actors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Value>),
    /// String-keyed map
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The narrowest [`DataType`] this value satisfies
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Text(_) => DataType::Text,
            _ => DataType::Object,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Type a converter generates or an encoder accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Any [`Value`]
    Object,
    /// [`Value::Text`] only
    Text,
}

impl DataType {
    /// Whether the value belongs to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DataType::Object => true,
            DataType::Text => matches!(value, Value::Text(_)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Object => write!(f, "object"),
            DataType::Text => write!(f, "text"),
        }
    }
}
