//! Pattern-driven date parsing

use super::token::{Segment, Token, MONTH_NAMES};
use crate::transform::{SchemaError, ValidationError};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Date fields collected while walking the captured groups.
///
/// Starts at the Unix epoch so fields absent from the pattern keep epoch values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParseAccumulator {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millisecond: u32,
    /// Set by `h`/`hh`; gates the AM/PM adjustment of `TT`/`tt`
    explicit_12h: bool,
}

impl Default for ParseAccumulator {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            millisecond: 0,
            explicit_12h: false,
        }
    }
}

impl ParseAccumulator {
    fn apply(&mut self, token: Token, text: &str) {
        let number = || text.parse::<u32>().unwrap_or(0);
        match token {
            Token::Year | Token::FullYear => self.year = text.parse().unwrap_or(1970),
            Token::ShortYear => self.year = 2000 + text.parse::<i32>().unwrap_or(0),
            Token::PaddedMonth | Token::Month => self.month = number(),
            Token::PaddedDay | Token::Day => self.day = number(),
            Token::OrdinalDay => {
                let digits: String = text.chars().filter(char::is_ascii_digit).collect();
                self.day = digits.parse().unwrap_or(1);
            },
            Token::MonthName => {
                self.month = MONTH_NAMES
                    .iter()
                    .position(|name| *name == text)
                    .map_or(1, |index| index as u32 + 1);
            },
            Token::Hour24 => self.hour = number(),
            Token::PaddedHour12 | Token::Hour12 => {
                self.hour = number();
                self.explicit_12h = true;
            },
            Token::UpperMeridiem | Token::LowerMeridiem => {
                if !self.explicit_12h {
                    return;
                }
                let pm = text.eq_ignore_ascii_case("pm");
                if !pm && self.hour == 12 {
                    self.hour = 0;
                } else if pm && self.hour < 12 {
                    self.hour += 12;
                }
            },
            Token::Minute => self.minute = number(),
            Token::Second => self.second = number(),
            Token::Millisecond => self.millisecond = number(),
            // A weekday name cannot place a date
            Token::DayName => {},
        }
    }

    fn finish(&self, utc: bool) -> Option<DateTime<Utc>> {
        let naive: NaiveDateTime = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_milli_opt(self.hour, self.minute, self.second, self.millisecond)?;
        if utc {
            Some(Utc.from_utc_datetime(&naive))
        } else {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
        }
    }
}

/// Compiled parser for one date pattern
#[derive(Debug, Clone)]
pub struct DateParser {
    pattern: String,
    regex: Regex,
    tokens: Vec<Token>,
    utc: bool,
}

impl DateParser {
    pub fn compile(pattern: &str, segments: &[Segment], utc: bool) -> Result<Self, SchemaError> {
        let mut source = String::from("^");
        let mut tokens = Vec::new();

        for segment in segments {
            match segment {
                Segment::Token(token) => {
                    source.push('(');
                    source.push_str(token.regex());
                    source.push(')');
                    tokens.push(*token);
                },
                Segment::Literal(text) => source.push_str(&regex::escape(text)),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| SchemaError::InvalidDateFormat {
            format: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            tokens,
            utc,
        })
    }

    pub fn matches(&self, input: &str) -> bool {
        self.regex.is_match(input.trim())
    }

    pub fn parse(&self, input: &str) -> Result<DateTime<Utc>, ValidationError> {
        let invalid = || ValidationError::invalid_date(input, &self.pattern);
        let captures = self.regex.captures(input.trim()).ok_or_else(invalid)?;

        let mut acc = ParseAccumulator::default();
        for (index, token) in self.tokens.iter().enumerate() {
            if let Some(group) = captures.get(index + 1) {
                acc.apply(*token, group.as_str());
            }
        }

        acc.finish(self.utc).ok_or_else(invalid)
    }
}
