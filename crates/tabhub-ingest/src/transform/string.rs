//! String, fixed-length string, IP address and UUID codecs

use super::{mismatch, storage_text, Codecs, ColumnDefinition, NativeValue, ValidationError};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// Codecs for string-valued types whose text form is validated by `parse`
fn text_codecs<P>(expected: &'static str, parse: P) -> Codecs
where
    P: Fn(&str) -> Result<String, ValidationError> + Send + Sync + 'static,
{
    let parse = Arc::new(parse);
    let from_storage_parse = Arc::clone(&parse);

    Codecs::new(
        move |raw| parse(raw).map(NativeValue::String),
        move |value| match value {
            NativeValue::String(s) => Ok(s.clone()),
            other => Err(mismatch(expected, other)),
        },
        move |value| match value {
            NativeValue::String(s) => Ok(serde_json::Value::String(s.clone())),
            other => Err(mismatch(expected, other)),
        },
        move |value| {
            let text = storage_text(value).ok_or_else(|| mismatch(expected, value))?;
            from_storage_parse(&text).map(NativeValue::String)
        },
    )
}

pub fn string() -> Codecs {
    text_codecs("string", |raw| Ok(raw.to_string()))
}

/// With `length` set, values must have exactly that many characters after left padding
pub fn fixed_string(def: &ColumnDefinition) -> Codecs {
    let Some(length) = def.length else {
        return string();
    };
    let pad = def.pad_left;

    text_codecs("string", move |raw| {
        let count = raw.chars().count();
        let value = match pad {
            Some(pad) if count < length => {
                let mut padded: String = std::iter::repeat(pad).take(length - count).collect();
                padded.push_str(raw);
                padded
            },
            _ => raw.to_string(),
        };
        if value.chars().count() != length {
            return Err(ValidationError::untracked(
                raw,
                format!("expected {} characters", length),
            ));
        }
        Ok(value)
    })
}

pub fn ipv4() -> Codecs {
    text_codecs("IPv4", |raw| {
        raw.trim()
            .parse::<Ipv4Addr>()
            .map(|addr| addr.to_string())
            .map_err(|_| ValidationError::untracked(raw, "invalid IPv4 address"))
    })
}

pub fn ipv6() -> Codecs {
    text_codecs("IPv6", |raw| {
        raw.trim()
            .parse::<Ipv6Addr>()
            .map(|addr| addr.to_string())
            .map_err(|_| ValidationError::untracked(raw, "invalid IPv6 address"))
    })
}

/// UUIDs are normalized to lowercase hyphenated form
pub fn uuid() -> Codecs {
    text_codecs("UUID", |raw| {
        uuid::Uuid::parse_str(raw.trim())
            .map(|id| id.hyphenated().to_string())
            .map_err(|_| ValidationError::untracked(raw, "invalid UUID"))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::ErrorCode;

    #[test]
    fn test_string_is_identity() {
        let codecs = string();
        let value = codecs.parse(" padded ").unwrap();
        assert_eq!(value, NativeValue::from(" padded "));
        assert_eq!(codecs.format(&value).unwrap(), " padded ");
    }

    #[test]
    fn test_fixed_string_pads_left() {
        let def = ColumnDefinition {
            length: Some(5),
            pad_left: Some('0'),
            ..Default::default()
        };
        let codecs = fixed_string(&def);
        assert_eq!(codecs.parse("42").unwrap(), NativeValue::from("00042"));
        assert_eq!(codecs.parse("12345").unwrap(), NativeValue::from("12345"));
        assert_eq!(codecs.parse("123456").unwrap_err().code, ErrorCode::Untracked);
    }

    #[test]
    fn test_fixed_string_without_padding() {
        let def = ColumnDefinition {
            length: Some(2),
            ..Default::default()
        };
        let codecs = fixed_string(&def);
        assert_eq!(codecs.parse("CA").unwrap(), NativeValue::from("CA"));
        assert!(codecs.parse("C").is_err());
    }

    #[test]
    fn test_ip_addresses() {
        assert_eq!(
            ipv4().parse("192.168.0.1").unwrap(),
            NativeValue::from("192.168.0.1")
        );
        assert!(ipv4().parse("256.0.0.1").is_err());
        assert_eq!(ipv6().parse("::1").unwrap(), NativeValue::from("::1"));
        assert!(ipv6().parse("192.168.0.1").is_err());
    }

    #[test]
    fn test_uuid_normalized() {
        let value = uuid().parse("67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap();
        assert_eq!(value, NativeValue::from("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(uuid().parse("not-a-uuid").is_err());
    }
}
