//! Date pattern tokenizer

/// English month names, January first
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English weekday names, Sunday first
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `YYYY`
    Year,
    /// `YY`, two digits offset from 2000
    ShortYear,
    /// `MM`
    PaddedMonth,
    /// `M`
    Month,
    /// `DD`
    PaddedDay,
    /// `D`
    Day,
    /// `HH`, 24-hour clock
    Hour24,
    /// `hh`, 12-hour clock
    PaddedHour12,
    /// `h`, 12-hour clock
    Hour12,
    /// `mm`
    Minute,
    /// `ss`
    Second,
    /// `nnn`
    Millisecond,
    /// `TT`
    UpperMeridiem,
    /// `tt`
    LowerMeridiem,
    /// `Month`
    MonthName,
    /// `Day`
    DayName,
    /// `Date`, ordinal day of month such as `21st`
    OrdinalDay,
    /// `Year`
    FullYear,
}

/// Pattern spellings, ordered so that longer tokens win over their prefixes
const TOKENS: [(&str, Token); 18] = [
    ("YYYY", Token::Year),
    ("Month", Token::MonthName),
    ("Year", Token::FullYear),
    ("Date", Token::OrdinalDay),
    ("Day", Token::DayName),
    ("nnn", Token::Millisecond),
    ("MM", Token::PaddedMonth),
    ("DD", Token::PaddedDay),
    ("YY", Token::ShortYear),
    ("HH", Token::Hour24),
    ("hh", Token::PaddedHour12),
    ("mm", Token::Minute),
    ("ss", Token::Second),
    ("TT", Token::UpperMeridiem),
    ("tt", Token::LowerMeridiem),
    ("M", Token::Month),
    ("D", Token::Day),
    ("h", Token::Hour12),
];

impl Token {
    /// Regex fragment matched by this token (without the enclosing group)
    pub fn regex(&self) -> &'static str {
        match self {
            Token::Year | Token::FullYear => r"\d{4}",
            Token::ShortYear => r"\d{2}",
            Token::PaddedMonth => "0[1-9]|1[0-2]",
            Token::Month => "1[0-2]|0?[1-9]",
            Token::PaddedDay => "0[1-9]|[12][0-9]|3[01]",
            Token::Day => "3[01]|[12][0-9]|0?[1-9]",
            Token::Hour24 => "[01][0-9]|2[0-3]",
            Token::PaddedHour12 => "0[0-9]|1[0-2]",
            Token::Hour12 => "1[0-2]|0?[0-9]",
            Token::Minute | Token::Second => "[0-5][0-9]",
            Token::Millisecond => r"\d{3}",
            Token::UpperMeridiem => "AM|PM",
            Token::LowerMeridiem => "am|pm",
            Token::MonthName => {
                "January|February|March|April|May|June|July|August|September|October|November|December"
            },
            Token::DayName => "Sunday|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday",
            Token::OrdinalDay => "3[01](?:st|th)|[12][0-9](?:st|nd|rd|th)|[1-9](?:st|nd|rd|th)",
        }
    }

    pub fn is_12_hour(&self) -> bool {
        matches!(self, Token::PaddedHour12 | Token::Hour12)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Token(Token),
    Literal(String),
}

/// Split a pattern into tokens and the literal text between them
pub fn tokenize(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    'outer: while !rest.is_empty() {
        for (spelling, token) in TOKENS {
            if let Some(after) = rest.strip_prefix(spelling) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Token(token));
                rest = after;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
