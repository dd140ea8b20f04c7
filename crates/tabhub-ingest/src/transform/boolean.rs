use super::{mismatch, Codecs, ColumnDefinition, NativeValue, ValidationError};

/// Booleans match `true_value`/`false_value` exactly; anything else is rejected
pub fn compile(def: &ColumnDefinition) -> Codecs {
    let true_value = def.true_value.clone().unwrap_or_else(|| "true".to_string());
    let false_value = def.false_value.clone().unwrap_or_else(|| "false".to_string());

    let parse = {
        let (true_value, false_value) = (true_value.clone(), false_value.clone());
        move |raw: &str| -> Result<bool, ValidationError> {
            if raw == true_value {
                Ok(true)
            } else if raw == false_value {
                Ok(false)
            } else {
                Err(ValidationError::untracked(
                    raw,
                    format!("expected '{}' or '{}'", true_value, false_value),
                ))
            }
        }
    };
    let storage_parse = parse.clone();

    Codecs::new(
        move |raw| parse(raw).map(NativeValue::Bool),
        move |value| match value {
            NativeValue::Bool(true) => Ok(true_value.clone()),
            NativeValue::Bool(false) => Ok(false_value.clone()),
            other => Err(mismatch("boolean", other)),
        },
        |value| match value {
            NativeValue::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            other => Err(mismatch("boolean", other)),
        },
        move |value| match value {
            serde_json::Value::Bool(b) => Ok(NativeValue::Bool(*b)),
            serde_json::Value::Number(n) if n.as_u64() == Some(0) => Ok(NativeValue::Bool(false)),
            serde_json::Value::Number(n) if n.as_u64() == Some(1) => Ok(NativeValue::Bool(true)),
            serde_json::Value::String(s) => storage_parse(s).map(NativeValue::Bool),
            other => Err(mismatch("boolean", other)),
        },
    )
}
