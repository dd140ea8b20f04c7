//! Enumeration codecs with configurable value normalization

use super::{
    mismatch, Codecs, ColumnDefinition, EnumValues, NativeValue, SchemaError, Substring,
    ValidationError,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Normalization applied to raw values before the membership check, in field order
#[derive(Debug, Clone)]
struct Normalizer {
    replace: Option<(Regex, String)>,
    uppercase: bool,
    lowercase: bool,
    substring: Option<Substring>,
}

impl Normalizer {
    fn from_definition(def: &ColumnDefinition) -> Result<Self, SchemaError> {
        let replace = match def.replace {
            Some(ref pattern) => {
                let regex = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                Some((regex, def.replace_with.clone().unwrap_or_default()))
            },
            None => None,
        };
        Ok(Self {
            replace,
            uppercase: def.uppercase,
            lowercase: def.lowercase,
            substring: def.substring,
        })
    }

    fn apply(&self, raw: &str) -> String {
        let mut value = match self.replace {
            Some((ref regex, ref with)) => regex.replace_all(raw, with.as_str()).into_owned(),
            None => raw.to_string(),
        };
        if self.uppercase {
            value = value.to_uppercase();
        }
        if self.lowercase {
            value = value.to_lowercase();
        }
        if let Some(substring) = self.substring {
            value = substring.apply(&value);
        }
        value
    }
}

struct Members {
    names: Vec<String>,
    set: HashSet<String>,
    values: EnumValues,
}

impl Members {
    fn check(&self, raw: &str, value: String) -> Result<String, ValidationError> {
        if self.set.contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError::invalid_enum(raw, self.names.clone()))
        }
    }

    /// Member for a stored ordinal; list members are numbered from 1
    fn by_ordinal(&self, ordinal: i64) -> Option<&str> {
        match self.values {
            EnumValues::List(ref list) => usize::try_from(ordinal - 1)
                .ok()
                .and_then(|index| list.get(index))
                .map(String::as_str),
            EnumValues::Ordinals(ref map) => map
                .iter()
                .find(|(_, value)| **value == ordinal)
                .map(|(name, _)| name.as_str()),
        }
    }
}

pub fn compile(bits: u32, def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let values = def.values.clone().ok_or(SchemaError::MissingField {
        column_type: "Enum",
        field: "values",
    })?;
    let names = values.names();
    let max = 1usize << bits;
    if names.len() > max {
        return Err(SchemaError::TooManyEnumValues {
            count: names.len(),
            bits,
            max,
        });
    }

    let members = Arc::new(Members {
        set: names.iter().cloned().collect(),
        names,
        values,
    });
    let normalizer = Normalizer::from_definition(def)?;
    let empty_string_null = def.empty_string_null;

    let parse_members = Arc::clone(&members);
    Ok(Codecs::new(
        move |raw| {
            let value = normalizer.apply(raw);
            if empty_string_null && value.is_empty() {
                return Ok(NativeValue::Null);
            }
            parse_members.check(raw, value).map(NativeValue::String)
        },
        |value| match value {
            NativeValue::String(s) => Ok(s.clone()),
            other => Err(mismatch("enum", other)),
        },
        |value| match value {
            NativeValue::String(s) => Ok(serde_json::Value::String(s.clone())),
            other => Err(mismatch("enum", other)),
        },
        move |value| match value {
            serde_json::Value::String(s) => members.check(s, s.clone()).map(NativeValue::String),
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(|ordinal| members.by_ordinal(ordinal))
                .map(|name| NativeValue::String(name.to_string()))
                .ok_or_else(|| ValidationError::invalid_enum(n.to_string(), members.names.clone())),
            other => Err(mismatch("enum", other)),
        },
    ))
}
