//! Property tests for the column codecs, the decimal engine and the date engine

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Datelike, TimeZone, Timelike, Utc};
use proptest::prelude::*;
use tabhub_ingest::date::DateFormat;
use tabhub_ingest::decimal::Decimal;
use tabhub_ingest::transform::{
    Column, ColumnSpec, ColumnType, ErrorCode, ErrorContext, NativeValue,
};

fn column(spec: &str) -> Column {
    let spec: ColumnSpec = serde_json::from_str(spec).unwrap();
    Column::new("c", spec).unwrap()
}

fn bare(column_type: ColumnType) -> Column {
    Column::new("c", ColumnSpec::new(column_type)).unwrap()
}

/// Parse, store, reload, format and parse again
fn round_trip(column: &Column, text: &str) -> NativeValue {
    let parsed = column.parse(Some(text)).unwrap();
    let stored = column.to_storage(&parsed).unwrap();
    let reloaded = column.from_storage(&stored).unwrap();
    let formatted = column.format(&reloaded).unwrap();
    let reparsed = column.parse(Some(&formatted)).unwrap();
    assert_eq!(reparsed, parsed);
    parsed
}

fn error_code(column: &Column, text: &str) -> ErrorCode {
    column.parse(Some(text)).unwrap_err().code
}

proptest! {
    #[test]
    fn prop_int8_round_trip(x in -128i64..128) {
        prop_assert_eq!(round_trip(&bare(ColumnType::Int8), &x.to_string()), NativeValue::Int(x));
    }

    #[test]
    fn prop_uint16_round_trip(x in 0i64..65_536) {
        prop_assert_eq!(round_trip(&bare(ColumnType::UInt16), &x.to_string()), NativeValue::Int(x));
    }

    #[test]
    fn prop_int32_round_trip(x in i32::MIN..=i32::MAX) {
        let x = i64::from(x);
        prop_assert_eq!(round_trip(&bare(ColumnType::Int32), &x.to_string()), NativeValue::Int(x));
    }

    #[test]
    fn prop_int64_round_trip(x in any::<i64>()) {
        let parsed = round_trip(&bare(ColumnType::Int64), &x.to_string());
        prop_assert_eq!(parsed.to_string(), x.to_string());
    }

    #[test]
    fn prop_uint8_upper_bound(x in 256i64..1_000_000) {
        prop_assert_eq!(error_code(&bare(ColumnType::UInt8), &x.to_string()), ErrorCode::UpperBound);
    }

    #[test]
    fn prop_unsigned_lower_bound(x in -1_000_000i64..0) {
        prop_assert_eq!(error_code(&bare(ColumnType::UInt32), &x.to_string()), ErrorCode::LowerBound);
    }

    #[test]
    fn prop_int16_bounds(x in any::<i32>()) {
        let column = bare(ColumnType::Int16);
        let result = column.parse(Some(&x.to_string()));
        if x < -32_768 {
            prop_assert_eq!(result.unwrap_err().code, ErrorCode::LowerBound);
        } else if x >= 32_768 {
            prop_assert_eq!(result.unwrap_err().code, ErrorCode::UpperBound);
        } else {
            prop_assert_eq!(result.unwrap(), NativeValue::Int(i64::from(x)));
        }
    }

    #[test]
    fn prop_user_bounds_are_half_open(x in -50i64..150) {
        let column = column(r#"{ "type": "Int32", "min": 0, "max": 100 }"#);
        let result = column.parse(Some(&x.to_string()));
        match x {
            x if x < 0 => prop_assert_eq!(result.unwrap_err().code, ErrorCode::LowerBound),
            x if x >= 100 => prop_assert_eq!(result.unwrap_err().code, ErrorCode::UpperBound),
            x => prop_assert_eq!(result.unwrap(), NativeValue::Int(x)),
        }
    }

    #[test]
    fn prop_remove_sign(x in -1000i64..1000) {
        let column = column(r#"{ "type": "UInt16", "remove_sign": true }"#);
        prop_assert_eq!(column.parse(Some(&x.to_string())).unwrap(), NativeValue::Int(x.abs()));
    }

    #[test]
    fn prop_decimal_display_pads_to_precision(integer in 0i64..1_000_000, fraction in 0u64..100) {
        let text = format!("{}.{:02}", integer, fraction);
        let decimal = Decimal::parse(&text, 2).unwrap();
        prop_assert_eq!(decimal.to_string(), text);
        prop_assert_eq!(Decimal::parse(&format!("{}.", integer), 3).unwrap().to_string(), format!("{}.000", integer));
    }

    #[test]
    fn prop_decimal_add_matches_cents(a in 0i64..10_000_000, b in 0i64..10_000_000) {
        let left = Decimal::from_parts(a / 100, (a % 100) as u64, 2).unwrap();
        let right = Decimal::from_parts(b / 100, (b % 100) as u64, 2).unwrap();
        let sum = left + right;
        let cents = a + b;
        prop_assert_eq!(sum.to_string(), format!("{}.{:02}", cents / 100, cents % 100));
    }

    #[test]
    fn prop_date_pattern_round_trip(
        year in 1970i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..24,
        minute in 0u32..60,
        second in 0u32..60,
    ) {
        let format = DateFormat::compile("YYYY-MM-DD HH:mm:ss", true).unwrap();
        let date = Utc.with_ymd_and_hms(year, month, day, hour, minute, second).unwrap();
        let text = format.format(&date);
        let parsed = format.parse(&text).unwrap();
        prop_assert_eq!(parsed, date);
    }

    #[test]
    fn prop_twelve_hour_clock(hour in 0u32..24) {
        let format = DateFormat::compile("YYYY-MM-DD h:mm TT", true).unwrap();
        let date = Utc.with_ymd_and_hms(2024, 6, 1, hour, 30, 0).unwrap();
        let parsed = format.parse(&format.format(&date)).unwrap();
        prop_assert_eq!(parsed.hour(), hour);
    }
}

#[test]
fn test_decimal_examples() {
    assert_eq!(Decimal::parse("1.23", 2).unwrap().to_string(), "1.23");
    assert_eq!(Decimal::parse("1.", 10).unwrap().to_string(), "1.0000000000");
    let sum = "1.1".parse::<Decimal>().unwrap() + "2.2".parse::<Decimal>().unwrap();
    assert_eq!(sum.to_string(), "3.30");
}

#[test]
fn test_date_example() {
    let format = DateFormat::compile("YYYY-MM-DD", true).unwrap();
    let date = format.parse("2024-03-05").unwrap();
    assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 5));
    assert_eq!(format.format(&date), "2024-03-05");
}

#[test]
fn test_enum_membership() {
    let column = column(r#"{ "type": "Enum8", "values": ["red", "green", "blue"] }"#);
    assert_eq!(column.parse(Some("red")).unwrap(), NativeValue::from("red"));

    let err = column.parse(Some("purple")).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidEnumValue);
    assert_eq!(
        err.context,
        Some(ErrorContext::EnumValues(vec![
            "red".to_string(),
            "green".to_string(),
            "blue".to_string()
        ]))
    );
}

#[test]
fn test_map_parse() {
    let column = column(r#"{ "type": "Map", "key_type": "String", "value_type": "UInt16" }"#);
    let parsed = column.parse(Some("foo=1,bar=2")).unwrap();
    assert_eq!(
        parsed,
        NativeValue::Map(vec![
            (NativeValue::from("foo"), NativeValue::Int(1)),
            (NativeValue::from("bar"), NativeValue::Int(2)),
        ])
    );
    assert_eq!(
        column.to_storage(&parsed).unwrap(),
        serde_json::json!({ "foo": 1, "bar": 2 })
    );
    assert_eq!(column.format(&parsed).unwrap(), "foo=1,bar=2");
}
