//! Integer, float and decimal codecs

use super::{
    mismatch, storage_text, Codecs, ColumnDefinition, ColumnType, NativeValue, SchemaError,
    ValidationError,
};
use crate::decimal::{Decimal, DecimalError, DEFAULT_PRECISION, MAX_PRECISION};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed};
use std::sync::Arc;

/// Strip whitespace and a leading `+`, and require an optionally negative digit string
fn integer_text(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let text = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() != trimmed.len() && text.starts_with('-') {
        return None;
    }
    Some(text)
}

/// Half-open `[lower, upper)` bounds of an integer type narrowed by `min`/`max`
fn integer_bounds(bits: u32, signed: bool, def: &ColumnDefinition) -> (i64, i64) {
    let (mut lower, mut upper) = if signed {
        (-(1i64 << (bits - 1)), 1i64 << (bits - 1))
    } else {
        (0, 1i64 << bits)
    };
    if let Some(min) = def.min {
        lower = lower.max(min.ceil() as i64);
    }
    if let Some(max) = def.max {
        upper = upper.min(max.ceil() as i64);
    }
    (lower, upper)
}

fn check_integer(value: i64, lower: i64, upper: i64, raw: &str) -> Result<i64, ValidationError> {
    if value < lower {
        return Err(ValidationError::lower_bound(raw, lower));
    }
    if value >= upper {
        return Err(ValidationError::upper_bound(raw, upper));
    }
    Ok(value)
}

/// Integers up to 32 bits wide, held as `i64`
pub fn integer(column_type: ColumnType, def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let (bits, signed) = column_type
        .integer_width()
        .ok_or_else(|| SchemaError::invalid(format!("{} is not an integer type", column_type)))?;
    let (lower, upper) = integer_bounds(bits, signed, def);
    let remove_sign = def.remove_sign;

    let parse = Arc::new(move |raw: &str| -> Result<NativeValue, ValidationError> {
        let text = integer_text(raw).ok_or_else(|| ValidationError::invalid_number(raw))?;
        let value = match text.parse::<i64>() {
            Ok(value) => value,
            Err(_) if text.starts_with('-') && !remove_sign => {
                return Err(ValidationError::lower_bound(raw, lower))
            },
            Err(_) => return Err(ValidationError::upper_bound(raw, upper)),
        };
        let value = if remove_sign { value.saturating_abs() } else { value };
        check_integer(value, lower, upper, raw).map(NativeValue::Int)
    });

    let from_storage_parse = Arc::clone(&parse);
    Ok(Codecs::new(
        move |raw| parse(raw),
        |value| match value {
            NativeValue::Int(i) => Ok(i.to_string()),
            other => Err(mismatch("integer", other)),
        },
        |value| match value {
            NativeValue::Int(i) => Ok(serde_json::Value::from(*i)),
            other => Err(mismatch("integer", other)),
        },
        move |value| {
            let text = storage_text(value).ok_or_else(|| mismatch("integer", value))?;
            from_storage_parse(&text)
        },
    ))
}

/// 64, 128 and 256-bit integers, held as `BigInt` and stored as decimal strings
pub fn wide_integer(
    column_type: ColumnType,
    def: &ColumnDefinition,
) -> Result<Codecs, SchemaError> {
    let (bits, signed) = column_type
        .integer_width()
        .ok_or_else(|| SchemaError::invalid(format!("{} is not an integer type", column_type)))?;

    let bound = BigInt::from(1u8) << bits;
    let (mut lower, mut upper) = if signed {
        let half = &bound >> 1u32;
        (-half.clone(), half)
    } else {
        (BigInt::from(0u8), bound)
    };
    if let Some(min) = def.min.and_then(|m| BigInt::from_f64(m.ceil())) {
        lower = lower.max(min);
    }
    if let Some(max) = def.max.and_then(|m| BigInt::from_f64(m.ceil())) {
        upper = upper.min(max);
    }
    let remove_sign = def.remove_sign;

    let parse = Arc::new(move |raw: &str| -> Result<NativeValue, ValidationError> {
        let text = integer_text(raw).ok_or_else(|| ValidationError::invalid_number(raw))?;
        let value: BigInt = text
            .parse()
            .map_err(|_| ValidationError::invalid_number(raw))?;
        let value = if remove_sign { value.abs() } else { value };
        if value < lower {
            return Err(ValidationError::lower_bound(raw, &lower));
        }
        if value >= upper {
            return Err(ValidationError::upper_bound(raw, &upper));
        }
        Ok(NativeValue::BigInt(value))
    });

    let from_storage_parse = Arc::clone(&parse);
    Ok(Codecs::new(
        move |raw| parse(raw),
        |value| match value {
            NativeValue::BigInt(i) => Ok(i.to_string()),
            NativeValue::Int(i) => Ok(i.to_string()),
            other => Err(mismatch("integer", other)),
        },
        |value| match value {
            NativeValue::BigInt(i) => Ok(serde_json::Value::String(i.to_string())),
            NativeValue::Int(i) => Ok(serde_json::Value::String(i.to_string())),
            other => Err(mismatch("integer", other)),
        },
        move |value| {
            let text = storage_text(value).ok_or_else(|| mismatch("integer", value))?;
            from_storage_parse(&text)
        },
    ))
}

#[derive(Debug, Clone, Copy)]
struct FloatBounds {
    min: Option<f64>,
    max: Option<f64>,
    /// Largest finite magnitude of the column type
    limit: f64,
}

impl FloatBounds {
    fn check(&self, value: f64, raw: &str) -> Result<f64, ValidationError> {
        if value < -self.limit {
            return Err(ValidationError::lower_bound(raw, -self.limit));
        }
        if value > self.limit {
            return Err(ValidationError::upper_bound(raw, self.limit));
        }
        if let Some(min) = self.min {
            if value < min {
                return Err(ValidationError::lower_bound(raw, min));
            }
        }
        if let Some(max) = self.max {
            if value >= max {
                return Err(ValidationError::upper_bound(raw, max));
            }
        }
        Ok(value)
    }
}

fn parse_float(raw: &str, remove_sign: bool) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::invalid_number(raw))?;
    // Infinity literals are not numbers; overflowing exponents fall through to the bound check
    if value.is_nan() || (value.is_infinite() && raw.to_ascii_lowercase().contains("inf")) {
        return Err(ValidationError::invalid_number(raw));
    }
    Ok(if remove_sign { value.abs() } else { value })
}

fn float_to_storage(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(value.to_string()))
}

fn float_codecs(bounds: FloatBounds, remove_sign: bool, scale: Option<u32>) -> Codecs {
    let parse = Arc::new(move |raw: &str| -> Result<NativeValue, ValidationError> {
        let value = parse_float(raw, remove_sign)?;
        bounds.check(value, raw).map(NativeValue::Float)
    });

    let from_storage_parse = Arc::clone(&parse);
    Codecs::new(
        move |raw| parse(raw),
        move |value| match value {
            NativeValue::Float(x) => Ok(match scale {
                Some(scale) => format!("{:.*}", scale as usize, x),
                None => x.to_string(),
            }),
            other => Err(mismatch("float", other)),
        },
        |value| match value {
            NativeValue::Float(x) => Ok(float_to_storage(*x)),
            other => Err(mismatch("float", other)),
        },
        move |value| {
            let text = storage_text(value).ok_or_else(|| mismatch("float", value))?;
            from_storage_parse(&text)
        },
    )
}

pub fn float(column_type: ColumnType, def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let limit = match column_type {
        ColumnType::Float32 => f64::from(f32::MAX),
        _ => f64::MAX,
    };
    let bounds = FloatBounds {
        min: def.min,
        max: def.max,
        limit,
    };
    Ok(float_codecs(bounds, def.remove_sign, None))
}

/// Decimals: float-backed unless `precise` is set
pub fn decimal(def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let bounds = FloatBounds {
        min: def.min,
        max: def.max,
        limit: f64::MAX,
    };
    if !def.precise {
        return Ok(float_codecs(bounds, def.remove_sign, def.scale));
    }

    let scale = def.scale.unwrap_or(DEFAULT_PRECISION);
    if scale > MAX_PRECISION {
        return Err(SchemaError::invalid(format!(
            "decimal scale {} exceeds the maximum of {}",
            scale, MAX_PRECISION
        )));
    }
    let remove_sign = def.remove_sign;

    let parse = Arc::new(move |raw: &str| -> Result<NativeValue, ValidationError> {
        let trimmed = raw.trim();
        let text = match trimmed.strip_prefix('-') {
            Some(unsigned) if remove_sign => unsigned,
            _ => trimmed,
        };
        let value = Decimal::parse(text, scale).map_err(|e| match e {
            DecimalError::Overflow => ValidationError::upper_bound(raw, i64::MAX),
            _ => ValidationError::invalid_number(raw),
        })?;
        bounds.check(value.to_f64(), raw)?;
        Ok(NativeValue::Decimal(value))
    });

    let from_storage_parse = Arc::clone(&parse);
    Ok(Codecs::new(
        move |raw| parse(raw),
        |value| match value {
            NativeValue::Decimal(d) => Ok(d.to_string()),
            other => Err(mismatch("decimal", other)),
        },
        |value| match value {
            NativeValue::Decimal(d) => Ok(serde_json::Value::String(d.to_string())),
            other => Err(mismatch("decimal", other)),
        },
        move |value| {
            let text = storage_text(value).ok_or_else(|| mismatch("decimal", value))?;
            from_storage_parse(&text)
        },
    ))
}
