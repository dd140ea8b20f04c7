//! Pattern-driven date formatting

use super::token::{Segment, Token, DAY_NAMES, MONTH_NAMES};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct DateFormatter {
    segments: Vec<Segment>,
    utc: bool,
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day) {
        (1, d) if d != 11 => "st",
        (2, d) if d != 12 => "nd",
        (3, d) if d != 13 => "rd",
        _ => "th",
    }
}

fn twelve_hour(hour: u32) -> u32 {
    match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    }
}

impl DateFormatter {
    pub fn new(segments: Vec<Segment>, utc: bool) -> Self {
        Self { segments, utc }
    }

    pub fn format(&self, date: &DateTime<Utc>) -> String {
        let fields: NaiveDateTime = if self.utc {
            date.naive_utc()
        } else {
            date.with_timezone(&Local).naive_local()
        };

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(token) => write_token(&mut out, *token, &fields),
            }
        }
        out
    }
}

fn write_token(out: &mut String, token: Token, fields: &NaiveDateTime) {
    // Writing into a String cannot fail
    let _ = match token {
        Token::Year | Token::FullYear => write!(out, "{:04}", fields.year()),
        Token::ShortYear => write!(out, "{:02}", fields.year().rem_euclid(100)),
        Token::PaddedMonth => write!(out, "{:02}", fields.month()),
        Token::Month => write!(out, "{}", fields.month()),
        Token::PaddedDay => write!(out, "{:02}", fields.day()),
        Token::Day => write!(out, "{}", fields.day()),
        Token::Hour24 => write!(out, "{:02}", fields.hour()),
        Token::PaddedHour12 => write!(out, "{:02}", twelve_hour(fields.hour())),
        Token::Hour12 => write!(out, "{}", twelve_hour(fields.hour())),
        Token::Minute => write!(out, "{:02}", fields.minute()),
        Token::Second => write!(out, "{:02}", fields.second()),
        Token::Millisecond => write!(out, "{:03}", fields.nanosecond() / 1_000_000 % 1000),
        Token::UpperMeridiem => out.write_str(if fields.hour() < 12 { "AM" } else { "PM" }),
        Token::LowerMeridiem => out.write_str(if fields.hour() < 12 { "am" } else { "pm" }),
        Token::MonthName => out.write_str(MONTH_NAMES[fields.month0() as usize]),
        Token::DayName => {
            out.write_str(DAY_NAMES[fields.weekday().num_days_from_sunday() as usize])
        },
        Token::OrdinalDay => write!(out, "{}{}", fields.day(), ordinal_suffix(fields.day())),
    };
}
