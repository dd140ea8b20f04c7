//! In-memory representation of typed cell values

use crate::decimal::Decimal;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use std::fmt;

/// A typed cell value produced by a column codec
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    /// Integers up to 32 bits wide
    Int(i64),
    /// 64, 128 and 256-bit integers
    BigInt(BigInt),
    Float(f64),
    Decimal(Decimal),
    /// Strings, enumeration members, IP addresses and UUIDs
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<NativeValue>),
    /// Key-value pairs in source order
    Map(Vec<(NativeValue, NativeValue)>),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::BigInt(_) => "bigint",
            NativeValue::Float(_) => "float",
            NativeValue::Decimal(_) => "decimal",
            NativeValue::String(_) => "string",
            NativeValue::Date(_) => "date",
            NativeValue::Array(_) => "array",
            NativeValue::Map(_) => "map",
        }
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::String(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

/// Plain rendering used in logs; columns format values through their own codecs
impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Null => f.write_str("NULL"),
            NativeValue::Bool(b) => write!(f, "{}", b),
            NativeValue::Int(i) => write!(f, "{}", i),
            NativeValue::BigInt(i) => write!(f, "{}", i),
            NativeValue::Float(x) => write!(f, "{}", x),
            NativeValue::Decimal(d) => write!(f, "{}", d),
            NativeValue::String(s) => f.write_str(s),
            NativeValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            NativeValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            },
            NativeValue::Map(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            },
        }
    }
}
