//! Date format mini-language
//!
//! A pattern such as `"Month Date, Year hh:mm TT"` is compiled once into an anchored regex
//! with one capture group per token, plus an ordered token list used for both parsing and
//! formatting.
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `YYYY` / `Year` | four digit year |
//! | `YY` | two digit year, interpreted as 20xx |
//! | `MM` / `M` | month, padded / unpadded |
//! | `DD` / `D` | day of month, padded / unpadded |
//! | `HH` | hour on the 24-hour clock |
//! | `hh` / `h` | hour on the 12-hour clock |
//! | `mm` `ss` `nnn` | minutes, seconds, milliseconds |
//! | `TT` / `tt` | `AM`/`PM` or `am`/`pm`, only applied after `hh`/`h` |
//! | `Month` / `Day` / `Date` | month name, weekday name, ordinal day (`21st`) |
//!
//! Any other character is a literal.

mod formatter;
mod parser;
mod token;

pub use formatter::DateFormatter;
pub use parser::DateParser;
pub use token::{tokenize, Segment, Token, DAY_NAMES, MONTH_NAMES};

use crate::transform::{SchemaError, ValidationError};
use chrono::{DateTime, Utc};

/// A compiled date pattern
#[derive(Debug, Clone)]
pub struct DateFormat {
    pattern: String,
    parser: DateParser,
    formatter: DateFormatter,
}

impl DateFormat {
    /// Compile `pattern`. With `utc` unset, fields are read and written in local time.
    pub fn compile(pattern: &str, utc: bool) -> Result<Self, SchemaError> {
        let segments = tokenize(pattern);
        if !segments.iter().any(|s| matches!(s, Segment::Token(_))) {
            return Err(SchemaError::InvalidDateFormat {
                format: pattern.to_string(),
                reason: "pattern contains no date tokens".to_string(),
            });
        }

        let parser = DateParser::compile(pattern, &segments, utc)?;
        Ok(Self {
            pattern: pattern.to_string(),
            parser,
            formatter: DateFormatter::new(segments, utc),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn parse(&self, input: &str) -> Result<DateTime<Utc>, ValidationError> {
        self.parser.parse(input)
    }

    pub fn format(&self, date: &DateTime<Utc>) -> String {
        self.formatter.format(date)
    }

    /// Whether `input` has the shape of this pattern
    pub fn matches(&self, input: &str) -> bool {
        self.parser.matches(input)
    }
}
