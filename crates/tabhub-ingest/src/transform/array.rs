use super::{mismatch, Codecs, Column, ColumnDefinition, NativeValue, SchemaError};
use std::sync::Arc;

const DEFAULT_SEPARATOR: &str = ",";

/// Element columns get nullability and defaults like any other column
pub(super) fn element_column(
    name: &'static str,
    column_type: &'static str,
    spec: Option<&super::ColumnSpec>,
) -> Result<Arc<Column>, SchemaError> {
    let spec = spec.ok_or(SchemaError::MissingField {
        column_type,
        field: name,
    })?;
    Ok(Arc::new(Column::new(name, spec.clone())?))
}

/// Arrays split on `separator` and delegate each element to the element codecs
pub fn compile(def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let element = element_column("element_type", "Array", def.element_type.as_deref())?;
    let separator = def
        .separator
        .clone()
        .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

    let parse_element = Arc::clone(&element);
    let parse_separator = separator.clone();
    let format_element = Arc::clone(&element);
    let storage_element = Arc::clone(&element);
    let from_storage_element = element;

    Ok(Codecs::new(
        move |raw| {
            if raw.is_empty() {
                return Ok(NativeValue::Array(Vec::new()));
            }
            raw.split(parse_separator.as_str())
                .map(|item| parse_element.parse(Some(item)))
                .collect::<Result<Vec<_>, _>>()
                .map(NativeValue::Array)
        },
        move |value| match value {
            NativeValue::Array(items) => Ok(items
                .iter()
                .map(|item| format_element.format(item))
                .collect::<Result<Vec<_>, _>>()?
                .join(separator.as_str())),
            other => Err(mismatch("array", other)),
        },
        move |value| match value {
            NativeValue::Array(items) => items
                .iter()
                .map(|item| storage_element.to_storage(item))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            other => Err(mismatch("array", other)),
        },
        move |value| match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| from_storage_element.from_storage(item))
                .collect::<Result<Vec<_>, _>>()
                .map(NativeValue::Array),
            other => Err(mismatch("array", other)),
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
    fn test_split_and_join() {
        let codecs = compile_json(r#"{"type": "Array", "element_type": "UInt8"}"#);
        let value = codecs.parse("1,2,3").unwrap();
        assert_eq!(
            value,
            NativeValue::Array(vec![
                NativeValue::Int(1),
                NativeValue::Int(2),
                NativeValue::Int(3)
            ])
        );
        assert_eq!(codecs.format(&value).unwrap(), "1,2,3");
        assert_eq!(codecs.to_storage(&value).unwrap(), serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_empty_input_is_empty_array() {
        let codecs = compile_json(r#"{"type": "Array", "element_type": "String"}"#);
        assert_eq!(codecs.parse("").unwrap(), NativeValue::Array(vec![]));
    }

    #[test]
    fn test_element_errors_propagate() {
        let codecs = compile_json(r#"{"type": "Array", "separator": ";", "element_type": "UInt8"}"#);
        let err = codecs.parse("1;300").unwrap_err();
        assert_eq!(err.code, ErrorCode::UpperBound);
    }

    #[test]
    fn test_nested_arrays() {
        let codecs = compile_json(
            r#"{"type": "Array", "separator": "|", "element_type": {"type": "Array", "element_type": "Int8"}}"#,
        );
        let value = codecs.parse("1,2|3").unwrap();
        assert_eq!(codecs.to_storage(&value).unwrap(), serde_json::json!([[1, 2], [3]]));
    }

    #[test]
    fn test_optional_elements() {
        let codecs = compile_json(
            r#"{"type": "Array", "element_type": {"type": "Int32", "optional": true}}"#,
        );
        assert_eq!(
            codecs.parse("1,,3").unwrap(),
            NativeValue::Array(vec![NativeValue::Int(1), NativeValue::Null, NativeValue::Int(3)])
        );
    }

    #[test]
    fn test_missing_element_type() {
        let spec: ColumnSpec = serde_json::from_str(r#"{"type": "Array"}"#).unwrap();
        assert!(matches!(
            Codecs::compile(&spec),
            Err(SchemaError::MissingField { field: "element_type", .. })
        ));
    }
}
