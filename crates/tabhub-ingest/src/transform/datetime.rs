//! Date and date-time codecs

use super::{mismatch, Codecs, ColumnDefinition, ColumnType, NativeValue, SchemaError, ValidationError};
use crate::date::DateFormat;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME64_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Parse the formats accepted when a column has no explicit pattern:
/// RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` and `YYYY-MM-DD`.
pub fn parse_default(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn truncate_to_day(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN))
}

/// Storage form per type: day string, Unix seconds or Unix milliseconds
fn to_storage(column_type: ColumnType, date: &DateTime<Utc>) -> serde_json::Value {
    match column_type {
        ColumnType::DateTime => serde_json::Value::from(date.timestamp()),
        ColumnType::DateTime64 => serde_json::Value::from(date.timestamp_millis()),
        _ => serde_json::Value::String(date.format(DATE_FORMAT).to_string()),
    }
}

fn from_storage_number(column_type: ColumnType, number: i64) -> Option<DateTime<Utc>> {
    match column_type {
        ColumnType::DateTime => Utc.timestamp_opt(number, 0).single(),
        ColumnType::DateTime64 => Utc.timestamp_millis_opt(number).single(),
        _ => Utc
            .timestamp_opt(number.checked_mul(86_400)?, 0)
            .single(),
    }
}

pub fn compile(column_type: ColumnType, def: &ColumnDefinition) -> Result<Codecs, SchemaError> {
    let format = match def.format {
        Some(ref pattern) => Some(Arc::new(DateFormat::compile(
            pattern,
            def.utc.unwrap_or(true),
        )?)),
        None => None,
    };
    let day_only = matches!(column_type, ColumnType::Date | ColumnType::Date32);
    let finish = move |date: DateTime<Utc>| {
        if day_only {
            truncate_to_day(date)
        } else {
            date
        }
    };

    let parse_format = format.clone();
    let format_format = format;

    Ok(Codecs::new(
        move |raw| {
            let date = match parse_format {
                Some(ref format) => format.parse(raw)?,
                None => parse_default(raw)
                    .ok_or_else(|| ValidationError::invalid_date(raw, "YYYY-MM-DD[ HH:mm:ss]"))?,
            };
            Ok(NativeValue::Date(finish(date)))
        },
        move |value| match value {
            NativeValue::Date(date) => Ok(match format_format {
                Some(ref format) => format.format(date),
                None => {
                    let pattern = match column_type {
                        ColumnType::DateTime => DATETIME_FORMAT,
                        ColumnType::DateTime64 => DATETIME64_FORMAT,
                        _ => DATE_FORMAT,
                    };
                    date.format(pattern).to_string()
                },
            }),
            other => Err(mismatch("date", other)),
        },
        move |value| match value {
            NativeValue::Date(date) => Ok(to_storage(column_type, date)),
            other => Err(mismatch("date", other)),
        },
        move |value| {
            let date = match value {
                serde_json::Value::String(s) => parse_default(s),
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .and_then(|number| from_storage_number(column_type, number)),
                other => return Err(mismatch("date", other)),
            };
            date.map(|date| NativeValue::Date(finish(date)))
                .ok_or_else(|| ValidationError::invalid_date(value.to_string(), "storage"))
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
    fn test_default_formats() {
        let codecs = compile_json(r#""DateTime""#);
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        for raw in ["2024-03-05T14:30:00Z", "2024-03-05 14:30:00", "2024-03-05T16:30:00+02:00"] {
            assert_eq!(codecs.parse(raw).unwrap(), NativeValue::Date(expected), "{raw}");
        }
        assert_eq!(
            codecs.format(&NativeValue::Date(expected)).unwrap(),
            "2024-03-05 14:30:00"
        );
        assert_eq!(codecs.parse("05/03/2024").unwrap_err().code, ErrorCode::InvalidDate);
    }

    #[test]
    fn test_date_truncates_time() {
        let codecs = compile_json(r#""Date""#);
        let value = codecs.parse("2024-03-05 14:30:00").unwrap();
        assert_eq!(
            value,
            NativeValue::Date(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(codecs.to_storage(&value).unwrap(), serde_json::json!("2024-03-05"));
        assert_eq!(codecs.format(&value).unwrap(), "2024-03-05");
    }

    #[test]
    fn test_explicit_format() {
        let codecs = compile_json(r#"{"type": "Date", "format": "MM/DD/YYYY"}"#);
        let value = codecs.parse("03/05/2024").unwrap();
        assert_eq!(codecs.format(&value).unwrap(), "03/05/2024");
        assert!(codecs.parse("2024-03-05").is_err());
    }

    #[test]
    fn test_storage_forms() {
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 1).unwrap();
        let value = NativeValue::Date(date);

        let seconds = compile_json(r#""DateTime""#);
        assert_eq!(seconds.to_storage(&value).unwrap(), serde_json::json!(1609459201));
        assert_eq!(seconds.from_storage(&serde_json::json!(1609459201)).unwrap(), value);

        let millis = compile_json(r#""DateTime64""#);
        assert_eq!(millis.to_storage(&value).unwrap(), serde_json::json!(1609459201000i64));
        assert_eq!(
            millis
                .from_storage(&serde_json::json!("2021-01-01 00:00:01.000"))
                .unwrap(),
            value
        );
    }

    #[test]
    fn test_invalid_pattern_is_schema_error() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"type": "Date", "format": "::"}"#).unwrap();
        assert!(Codecs::compile(&spec).is_err());
    }
}
