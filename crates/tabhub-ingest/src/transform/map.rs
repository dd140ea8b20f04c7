use super::array::element_column;
use super::{mismatch, Codecs, ColumnDefinition, NativeValue, SchemaError, ValidationError};
use std::sync::Arc;

const DEFAULT_SEPARATOR: &str = ",";
const DEFAULT_ASSIGNMENT: &str = "=";

/// Maps parse `key=value` pairs separated by `,` and keep them in source order
pub fn compile(def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let key = element_column("key_type", "Map", def.key_type.as_deref())?;
    let value = element_column("value_type", "Map", def.value_type.as_deref())?;
    let separator = def
        .separator
        .clone()
        .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
    let assignment = def
        .assignment
        .clone()
        .unwrap_or_else(|| DEFAULT_ASSIGNMENT.to_string());

    let (parse_key, parse_value) = (Arc::clone(&key), Arc::clone(&value));
    let (parse_separator, parse_assignment) = (separator.clone(), assignment.clone());
    let (format_key, format_value) = (Arc::clone(&key), Arc::clone(&value));
    let (storage_key, storage_value) = (Arc::clone(&key), Arc::clone(&value));

    Ok(Codecs::new(
        move |raw| {
            if raw.is_empty() {
                return Ok(NativeValue::Map(Vec::new()));
            }
            raw.split(parse_separator.as_str())
                .map(|pair| {
                    let parts: Vec<&str> = pair.split(parse_assignment.as_str()).collect();
                    let [k, v] = parts.as_slice() else {
                        return Err(ValidationError::untracked(
                            pair,
                            "map entries must be key-value pairs",
                        ));
                    };
                    Ok((parse_key.parse(Some(*k))?, parse_value.parse(Some(*v))?))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(NativeValue::Map)
        },
        move |native| match native {
            NativeValue::Map(pairs) => Ok(pairs
                .iter()
                .map(|(k, v)| {
                    Ok(format!(
                        "{}{}{}",
                        format_key.format(k)?,
                        assignment,
                        format_value.format(v)?
                    ))
                })
                .collect::<Result<Vec<_>, ValidationError>>()?
                .join(separator.as_str())),
            other => Err(mismatch("map", other)),
        },
        move |native| match native {
            NativeValue::Map(pairs) => {
                let mut object = serde_json::Map::new();
                for (k, v) in pairs {
                    object.insert(storage_key.format(k)?, storage_value.to_storage(v)?);
                }
                Ok(serde_json::Value::Object(object))
            },
            other => Err(mismatch("map", other)),
        },
        move |stored| match stored {
            serde_json::Value::Object(object) => object
                .iter()
                .map(|(k, v)| Ok((key.parse(Some(k.as_str()))?, value.from_storage(v)?)))
                .collect::<Result<Vec<_>, ValidationError>>()
                .map(NativeValue::Map),
            other => Err(mismatch("map", other)),
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::{ColumnSpec, ErrorCode};

    fn compile_json(json: &str) -> Codecs {
        let spec: ColumnSpec = serde_json::from_str(json).unwrap();
        Codecs::compile(&spec).unwrap()
    }

    #[test]
    fn test_parse_pairs() {
        let codecs = compile_json(r#"{"type": "Map", "key_type": "String", "value_type": "UInt16"}"#);
        let value = codecs.parse("foo=1,bar=2").unwrap();
        assert_eq!(
            value,
            NativeValue::Map(vec![
                (NativeValue::from("foo"), NativeValue::Int(1)),
                (NativeValue::from("bar"), NativeValue::Int(2)),
            ])
        );
        assert_eq!(codecs.format(&value).unwrap(), "foo=1,bar=2");
        assert_eq!(
            codecs.to_storage(&value).unwrap(),
            serde_json::json!({"foo": 1, "bar": 2})
        );
    }

    #[test]
    fn test_custom_separators() {
        let codecs = compile_json(
            r#"{"type": "Map", "key_type": "UInt8", "value_type": "String", "separator": ";", "assignment": ":"}"#,
        );
        let value = codecs.parse("1:a;2:b").unwrap();
        assert_eq!(codecs.format(&value).unwrap(), "1:a;2:b");
        assert_eq!(codecs.to_storage(&value).unwrap(), serde_json::json!({"1": "a", "2": "b"}));
    }

    #[test]
    fn test_malformed_pair() {
        let codecs = compile_json(r#"{"type": "Map", "key_type": "String", "value_type": "String"}"#);
        assert_eq!(codecs.parse("a=1=2").unwrap_err().code, ErrorCode::Untracked);
        assert_eq!(codecs.parse("a").unwrap_err().code, ErrorCode::Untracked);
        assert_eq!(codecs.parse("").unwrap(), NativeValue::Map(vec![]));
    }

    #[test]
    fn test_value_errors_propagate() {
        let codecs = compile_json(r#"{"type": "Map", "key_type": "String", "value_type": "UInt8"}"#);
        assert_eq!(codecs.parse("a=-1").unwrap_err().code, ErrorCode::LowerBound);
    }

    #[test]
    fn test_from_storage() {
        let codecs = compile_json(r#"{"type": "Map", "key_type": "UInt8", "value_type": "String"}"#);
        let value = codecs.from_storage(&serde_json::json!({"7": "x"})).unwrap();
        assert_eq!(
            value,
            NativeValue::Map(vec![(NativeValue::Int(7), NativeValue::from("x"))])
        );
    }

    #[test]
    fn test_missing_types() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"type": "Map", "key_type": "String"}"#).unwrap();
        assert!(matches!(
            Codecs::compile(&spec),
            Err(SchemaError::MissingField { field: "value_type", .. })
        ));
    }
}
