//! Column codecs
//!
//! [`Codecs::compile`] turns a [`ColumnSpec`] into four conversion functions:
//!
//! - `from_string`: raw text (a CSV cell) to a [`NativeValue`]
//! - `to_string`: [`NativeValue`] back to text
//! - `to_storage`: [`NativeValue`] to the JSON form accepted by the analytical store
//! - `from_storage`: that JSON form back to a [`NativeValue`]
//!
//! Compilation happens once per column. The resulting functions are immutable and shared
//! freely across threads. None of them accept `Null`; nullability is handled by
//! [`Column`].
//!
//! ```
//! use tabhub_ingest::transform::{Codecs, ColumnSpec, ColumnType, NativeValue};
//!
//! let codecs = Codecs::compile(&ColumnSpec::new(ColumnType::UInt8)).unwrap();
//! assert_eq!(codecs.parse("42").unwrap(), NativeValue::Int(42));
//! assert!(codecs.parse("256").is_err());
//! ```

mod array;
mod boolean;
mod column;
mod datetime;
mod enumeration;
mod error;
mod map;
mod number;
mod string;
mod value;

pub use column::{
    Column, ColumnDefinition, ColumnRegistry, ColumnSpec, ColumnType, EnumValues, Substring,
};
pub use error::{ErrorCode, ErrorContext, SchemaError, ValidationError};
pub use value::NativeValue;

use std::fmt;
use std::sync::Arc;

pub type ParseFn = Arc<dyn Fn(&str) -> Result<NativeValue, ValidationError> + Send + Sync>;
pub type FormatFn = Arc<dyn Fn(&NativeValue) -> Result<String, ValidationError> + Send + Sync>;
pub type ToStorageFn =
    Arc<dyn Fn(&NativeValue) -> Result<serde_json::Value, ValidationError> + Send + Sync>;
pub type FromStorageFn =
    Arc<dyn Fn(&serde_json::Value) -> Result<NativeValue, ValidationError> + Send + Sync>;

/// The compiled conversion functions of one column type
#[derive(Clone)]
pub struct Codecs {
    from_string: ParseFn,
    to_string: FormatFn,
    to_storage: ToStorageFn,
    from_storage: FromStorageFn,
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

impl Codecs {
    pub fn new<P, F, T, S>(from_string: P, to_string: F, to_storage: T, from_storage: S) -> Self
    where
        P: Fn(&str) -> Result<NativeValue, ValidationError> + Send + Sync + 'static,
        F: Fn(&NativeValue) -> Result<String, ValidationError> + Send + Sync + 'static,
        T: Fn(&NativeValue) -> Result<serde_json::Value, ValidationError> + Send + Sync + 'static,
        S: Fn(&serde_json::Value) -> Result<NativeValue, ValidationError> + Send + Sync + 'static,
    {
        Self {
            from_string: Arc::new(from_string),
            to_string: Arc::new(to_string),
            to_storage: Arc::new(to_storage),
            from_storage: Arc::new(from_storage),
        }
    }

    /// Compile the codecs for a column type and definition
    pub fn compile(spec: &ColumnSpec) -> Result<Self, SchemaError> {
        let def = &spec.definition;
        match spec.column_type {
            ColumnType::Int8
            | ColumnType::Int16
            | ColumnType::Int32
            | ColumnType::UInt8
            | ColumnType::UInt16
            | ColumnType::UInt32 => number::integer(spec.column_type, def),
            ColumnType::Int64
            | ColumnType::Int128
            | ColumnType::Int256
            | ColumnType::UInt64
            | ColumnType::UInt128
            | ColumnType::UInt256 => number::wide_integer(spec.column_type, def),
            ColumnType::Float32 | ColumnType::Float64 => number::float(spec.column_type, def),
            ColumnType::Decimal
            | ColumnType::Decimal32
            | ColumnType::Decimal64
            | ColumnType::Decimal128
            | ColumnType::Decimal256 => number::decimal(def),
            ColumnType::Enum | ColumnType::Enum8 => enumeration::compile(8, def),
            ColumnType::Enum16 => enumeration::compile(16, def),
            ColumnType::String => Ok(string::string()),
            ColumnType::FixedString => Ok(string::fixed_string(def)),
            ColumnType::Ipv4 => Ok(string::ipv4()),
            ColumnType::Ipv6 => Ok(string::ipv6()),
            ColumnType::Uuid => Ok(string::uuid()),
            ColumnType::Bool => Ok(boolean::compile(def)),
            ColumnType::Date
            | ColumnType::Date32
            | ColumnType::DateTime
            | ColumnType::DateTime64 => datetime::compile(spec.column_type, def),
            ColumnType::Array => array::compile(def),
            ColumnType::Map => map::compile(def),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<NativeValue, ValidationError> {
        (self.from_string)(raw)
    }

    pub fn format(&self, value: &NativeValue) -> Result<String, ValidationError> {
        (self.to_string)(value)
    }

    pub fn to_storage(&self, value: &NativeValue) -> Result<serde_json::Value, ValidationError> {
        (self.to_storage)(value)
    }

    pub fn from_storage(&self, value: &serde_json::Value) -> Result<NativeValue, ValidationError> {
        (self.from_storage)(value)
    }
}

/// Error for a native or storage value of the wrong shape
pub(crate) fn mismatch(expected: &str, found: impl fmt::Display) -> ValidationError {
    ValidationError::untracked(found.to_string(), format!("expected {} value", expected))
}

/// Text carried by a storage scalar, for codecs that reparse storage strings
pub(crate) fn storage_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
