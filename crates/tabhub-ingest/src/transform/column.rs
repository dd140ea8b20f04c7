//! Column types, definitions and the column registry

use super::{Codecs, NativeValue, SchemaError, ValidationError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Every column type a codec can be compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Float32,
    Float64,
    Decimal,
    Decimal32,
    Decimal64,
    Decimal128,
    Decimal256,
    Enum,
    Enum8,
    Enum16,
    String,
    FixedString,
    #[serde(rename = "IPv4")]
    Ipv4,
    #[serde(rename = "IPv6")]
    Ipv6,
    #[serde(rename = "UUID")]
    Uuid,
    Bool,
    Date,
    Date32,
    DateTime,
    DateTime64,
    Array,
    Map,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int8 => "Int8",
            ColumnType::Int16 => "Int16",
            ColumnType::Int32 => "Int32",
            ColumnType::Int64 => "Int64",
            ColumnType::Int128 => "Int128",
            ColumnType::Int256 => "Int256",
            ColumnType::UInt8 => "UInt8",
            ColumnType::UInt16 => "UInt16",
            ColumnType::UInt32 => "UInt32",
            ColumnType::UInt64 => "UInt64",
            ColumnType::UInt128 => "UInt128",
            ColumnType::UInt256 => "UInt256",
            ColumnType::Float32 => "Float32",
            ColumnType::Float64 => "Float64",
            ColumnType::Decimal => "Decimal",
            ColumnType::Decimal32 => "Decimal32",
            ColumnType::Decimal64 => "Decimal64",
            ColumnType::Decimal128 => "Decimal128",
            ColumnType::Decimal256 => "Decimal256",
            ColumnType::Enum => "Enum",
            ColumnType::Enum8 => "Enum8",
            ColumnType::Enum16 => "Enum16",
            ColumnType::String => "String",
            ColumnType::FixedString => "FixedString",
            ColumnType::Ipv4 => "IPv4",
            ColumnType::Ipv6 => "IPv6",
            ColumnType::Uuid => "UUID",
            ColumnType::Bool => "Bool",
            ColumnType::Date => "Date",
            ColumnType::Date32 => "Date32",
            ColumnType::DateTime => "DateTime",
            ColumnType::DateTime64 => "DateTime64",
            ColumnType::Array => "Array",
            ColumnType::Map => "Map",
        }
    }

    /// Bit width and signedness of integer types
    pub fn integer_width(&self) -> Option<(u32, bool)> {
        match self {
            ColumnType::Int8 => Some((8, true)),
            ColumnType::Int16 => Some((16, true)),
            ColumnType::Int32 => Some((32, true)),
            ColumnType::Int64 => Some((64, true)),
            ColumnType::Int128 => Some((128, true)),
            ColumnType::Int256 => Some((256, true)),
            ColumnType::UInt8 => Some((8, false)),
            ColumnType::UInt16 => Some((16, false)),
            ColumnType::UInt32 => Some((32, false)),
            ColumnType::UInt64 => Some((64, false)),
            ColumnType::UInt128 => Some((128, false)),
            ColumnType::UInt256 => Some((256, false)),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted enumeration members
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnumValues {
    List(Vec<String>),
    /// Member name to stored ordinal
    Ordinals(BTreeMap<String, i64>),
}

impl EnumValues {
    /// Member names, ordered by ordinal for explicit mappings
    pub fn names(&self) -> Vec<String> {
        match self {
            EnumValues::List(values) => values.clone(),
            EnumValues::Ordinals(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by_key(|(_, ordinal)| **ordinal);
                entries.into_iter().map(|(name, _)| name.clone()).collect()
            },
        }
    }
}

/// Character range kept from an enumeration value before lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Substring {
    From(usize),
    Range(usize, usize),
}

impl Substring {
    pub fn apply(&self, value: &str) -> String {
        let (start, end) = match *self {
            Substring::From(start) => (start, usize::MAX),
            Substring::Range(start, end) => (start, end),
        };
        value
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }
}

/// Type-specific column configuration. Fields irrelevant to a type are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnDefinition {
    /// Empty or absent input parses to `Null`
    pub optional: bool,
    pub description: Option<String>,
    /// Header name of this column in source files, when it differs from the column name
    pub csv: Option<String>,
    /// Default value in storage representation
    pub default: Option<serde_json::Value>,
    /// Substitute `default` when parsing fails
    pub default_on_error: bool,

    // Numbers
    pub min: Option<f64>,
    /// Exclusive upper bound
    pub max: Option<f64>,
    pub remove_sign: bool,
    pub precision: Option<u32>,
    /// Fractional digits of decimal types
    pub scale: Option<u32>,
    /// Parse decimals with fixed precision instead of as floats
    pub precise: bool,

    // Enumerations
    pub values: Option<EnumValues>,
    pub empty_string_null: bool,
    pub substring: Option<Substring>,
    pub replace: Option<String>,
    pub replace_with: Option<String>,
    pub uppercase: bool,
    pub lowercase: bool,

    // Dates
    pub format: Option<String>,
    pub utc: Option<bool>,

    // Strings
    pub length: Option<usize>,
    pub pad_left: Option<char>,

    // Booleans
    pub true_value: Option<String>,
    pub false_value: Option<String>,

    // Composites
    pub element_type: Option<Box<ColumnSpec>>,
    pub key_type: Option<Box<ColumnSpec>>,
    pub value_type: Option<Box<ColumnSpec>>,
    pub separator: Option<String>,
    pub assignment: Option<String>,
}

/// A column type together with its definition.
///
/// Deserializes from a bare type name (`"UInt16"`) or an object carrying a `type` field
/// (`{"type": "Array", "element_type": "String"}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSpec")]
pub struct ColumnSpec {
    pub column_type: ColumnType,
    pub definition: ColumnDefinition,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpec {
    Bare(ColumnType),
    Full {
        #[serde(rename = "type")]
        column_type: ColumnType,
        #[serde(flatten)]
        definition: ColumnDefinition,
    },
}

impl From<RawSpec> for ColumnSpec {
    fn from(raw: RawSpec) -> Self {
        match raw {
            RawSpec::Bare(column_type) => ColumnSpec::new(column_type),
            RawSpec::Full {
                column_type,
                definition,
            } => ColumnSpec {
                column_type,
                definition,
            },
        }
    }
}

impl ColumnSpec {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            definition: ColumnDefinition::default(),
        }
    }

    pub fn with_definition(column_type: ColumnType, definition: ColumnDefinition) -> Self {
        Self {
            column_type,
            definition,
        }
    }
}

/// A named column with codecs compiled once from its spec
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    spec: ColumnSpec,
    codecs: Codecs,
    default: Option<NativeValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, spec: ColumnSpec) -> Result<Self, SchemaError> {
        let name = name.into();
        let codecs = Codecs::compile(&spec).map_err(|e| e.in_column(&name))?;

        let default = match spec.definition.default {
            Some(ref value) => Some(
                codecs
                    .from_storage(value)
                    .map_err(|e| SchemaError::InvalidDefault(e).in_column(&name))?,
            ),
            None => None,
        };

        Ok(Self {
            name,
            spec,
            codecs,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.spec.column_type
    }

    pub fn definition(&self) -> &ColumnDefinition {
        &self.spec.definition
    }

    /// Source header mapped onto this column
    pub fn alias(&self) -> Option<&str> {
        self.spec.definition.csv.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.spec.definition.optional
    }

    pub fn default_value(&self) -> Option<&NativeValue> {
        self.default.as_ref()
    }

    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    /// Parse a raw cell, applying nullability and the default-on-error fallback
    pub fn parse(&self, raw: Option<&str>) -> Result<NativeValue, ValidationError> {
        let raw = match raw {
            Some(raw) if !(raw.is_empty() && self.is_optional()) => raw,
            Some(_) => return Ok(NativeValue::Null),
            None if self.is_optional() => return Ok(NativeValue::Null),
            None => {
                return self
                    .default
                    .clone()
                    .ok_or_else(|| ValidationError::untracked("", "missing value"))
            },
        };

        match self.codecs.parse(raw) {
            Ok(value) => Ok(value),
            Err(err) => match self.default {
                Some(ref default) if self.spec.definition.default_on_error => Ok(default.clone()),
                _ => Err(err),
            },
        }
    }

    /// Render a value as text; `Null` renders as the empty string
    pub fn format(&self, value: &NativeValue) -> Result<String, ValidationError> {
        if value.is_null() {
            return Ok(String::new());
        }
        self.codecs.format(value)
    }

    pub fn to_storage(&self, value: &NativeValue) -> Result<serde_json::Value, ValidationError> {
        if value.is_null() {
            return Ok(serde_json::Value::Null);
        }
        self.codecs.to_storage(value)
    }

    pub fn from_storage(&self, value: &serde_json::Value) -> Result<NativeValue, ValidationError> {
        if value.is_null() {
            return Ok(NativeValue::Null);
        }
        self.codecs.from_storage(value)
    }
}

#[derive(Deserialize)]
struct SchemaEntry {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(flatten)]
    definition: ColumnDefinition,
}

/// Immutable set of columns addressable by name or source alias
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl ColumnRegistry {
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        let mut by_name = HashMap::new();
        let mut by_alias = HashMap::new();

        for (index, column) in columns.iter().enumerate() {
            if by_name.insert(column.name().to_string(), index).is_some() {
                return Err(SchemaError::DuplicateColumn(column.name().to_string()));
            }
            if let Some(alias) = column.alias() {
                if by_alias.insert(alias.to_string(), index).is_some() {
                    return Err(SchemaError::invalid(format!(
                        "source header '{}' is mapped to more than one column",
                        alias
                    )));
                }
            }
        }

        Ok(Self {
            columns,
            by_name,
            by_alias,
        })
    }

    pub fn from_specs<I, S>(specs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, ColumnSpec)>,
        S: Into<String>,
    {
        let columns = specs
            .into_iter()
            .map(|(name, spec)| Column::new(name, spec))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Build from a JSON array of `{"name": .., "type": .., ...definition}` objects
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let entries: Vec<SchemaEntry> = serde_json::from_str(json)?;
        Self::from_specs(entries.into_iter().map(|entry| {
            (
                entry.name,
                ColumnSpec::with_definition(entry.column_type, entry.definition),
            )
        }))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&index| &self.columns[index])
    }

    pub fn column_by_alias(&self, alias: &str) -> Option<&Column> {
        self.by_alias.get(alias).map(|&index| &self.columns[index])
    }

    /// Column name for a source header; unmapped headers are returned unchanged
    pub fn resolve_header<'a>(&'a self, header: &'a str) -> &'a str {
        match self.column_by_alias(header) {
            Some(column) => column.name(),
            None => header,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::ErrorCode;

    #[test]
    fn test_spec_from_bare_name() {
        let spec: ColumnSpec = serde_json::from_str(r#""IPv4""#).unwrap();
        assert_eq!(spec.column_type, ColumnType::Ipv4);
        assert!(!spec.definition.optional);
    }

    #[test]
    fn test_spec_from_object() {
        let spec: ColumnSpec = serde_json::from_str(
            r#"{"type": "Array", "separator": "|", "element_type": {"type": "UInt8", "max": 100}}"#,
        )
        .unwrap();
        assert_eq!(spec.column_type, ColumnType::Array);
        assert_eq!(spec.definition.separator.as_deref(), Some("|"));
        let element = spec.definition.element_type.unwrap();
        assert_eq!(element.column_type, ColumnType::UInt8);
        assert_eq!(element.definition.max, Some(100.0));
    }

    #[test]
    fn test_enum_values_ordered_by_ordinal() {
        let values: EnumValues = serde_json::from_str(r#"{"b": 2, "a": 1, "c": 3}"#).unwrap();
        assert_eq!(values.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_substring() {
        assert_eq!(Substring::From(2).apply("abcdef"), "cdef");
        assert_eq!(Substring::Range(1, 3).apply("abcdef"), "bc");
        assert_eq!(Substring::Range(4, 2).apply("abcdef"), "");
        assert_eq!(Substring::Range(0, 10).apply("ab"), "ab");
    }

    #[test]
    fn test_optional_column_parses_empty_as_null() {
        let spec: ColumnSpec = serde_json::from_str(r#"{"type": "Int32", "optional": true}"#).unwrap();
        let column = Column::new("count", spec).unwrap();
        assert_eq!(column.parse(Some("")).unwrap(), NativeValue::Null);
        assert_eq!(column.parse(None).unwrap(), NativeValue::Null);
        assert_eq!(column.parse(Some("12")).unwrap(), NativeValue::Int(12));
    }

    #[test]
    fn test_default_on_error() {
        let spec: ColumnSpec = serde_json::from_str(
            r#"{"type": "UInt8", "default": 0, "default_on_error": true}"#,
        )
        .unwrap();
        let column = Column::new("score", spec).unwrap();
        assert_eq!(column.parse(Some("n/a")).unwrap(), NativeValue::Int(0));
        assert_eq!(column.parse(Some("7")).unwrap(), NativeValue::Int(7));
    }

    #[test]
    fn test_default_without_fallback_flag_still_errors() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"type": "UInt8", "default": 0}"#).unwrap();
        let column = Column::new("score", spec).unwrap();
        let err = column.parse(Some("300")).unwrap_err();
        assert_eq!(err.code, ErrorCode::UpperBound);
        assert_eq!(column.default_value(), Some(&NativeValue::Int(0)));
    }

    #[test]
    fn test_invalid_default_is_schema_error() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"type": "UInt8", "default": "lots"}"#).unwrap();
        let err = Column::new("score", spec).unwrap_err();
        assert!(err.to_string().contains("score"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ColumnRegistry::from_json(
            r#"[
                {"name": "id", "type": "UInt32"},
                {"name": "state", "type": "String", "csv": "State Name"}
            ]"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["id", "state"]);
        assert_eq!(registry.resolve_header("State Name"), "state");
        assert_eq!(registry.resolve_header("unmapped"), "unmapped");
        assert!(registry.column_by_alias("State Name").is_some());
        assert!(registry.column_by_name("State Name").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = ColumnRegistry::from_specs(vec![
            ("id", ColumnSpec::new(ColumnType::UInt32)),
            ("id", ColumnSpec::new(ColumnType::String)),
        ]);
        assert!(matches!(result, Err(SchemaError::DuplicateColumn(_))));
    }
}
