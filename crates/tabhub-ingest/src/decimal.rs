//! Fixed-precision decimal numbers
//!
//! A [`Decimal`] stores a number as a floored integer part and a non-negative fractional part
//! scaled to `precision` digits, so `"1.05"` at precision 2 is `(1, 5)` and `-1.5` is
//! `(-2, 50)`. Parsing truncates extra fractional digits and rendering always emits exactly
//! `precision` digits, which makes the string form an exact round trip.
//!
//! ```
//! use tabhub_ingest::decimal::Decimal;
//!
//! let a: Decimal = "1.1".parse().unwrap();
//! let b: Decimal = "2.2".parse().unwrap();
//! assert_eq!((a + b).to_string(), "3.30");
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PRECISION: u32 = 2;

/// Largest precision whose scale (`10^precision`) fits in a `u64`
pub const MAX_PRECISION: u32 = 19;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("'{0}' is not a non-negative decimal number")]
    InvalidFormat(String),

    #[error("Precision {0} exceeds the maximum of {MAX_PRECISION}")]
    PrecisionTooLarge(u32),

    #[error("Fraction {fraction} does not fit in {precision} digits")]
    FractionOutOfRange { fraction: u64, precision: u32 },

    #[error("Decimal overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    integer: i64,
    fraction: u64,
    precision: u32,
}

fn scale(precision: u32) -> u64 {
    10u64.pow(precision)
}

fn check_precision(precision: u32) -> Result<(), DecimalError> {
    if precision > MAX_PRECISION {
        return Err(DecimalError::PrecisionTooLarge(precision));
    }
    Ok(())
}

impl Decimal {
    /// Parse a string of the form `digits[.digits]`.
    ///
    /// Fractional digits beyond `precision` are truncated, not rounded.
    pub fn parse(input: &str, precision: u32) -> Result<Self, DecimalError> {
        check_precision(precision)?;
        let invalid = || DecimalError::InvalidFormat(input.to_string());

        let (integer_part, fraction_part) = match input.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (input, ""),
        };
        if integer_part.is_empty()
            || !integer_part.bytes().all(|b| b.is_ascii_digit())
            || !fraction_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let integer: i64 = integer_part.parse().map_err(|_| DecimalError::Overflow)?;

        let mut digits: String = fraction_part.chars().take(precision as usize).collect();
        while digits.len() < precision as usize {
            digits.push('0');
        }
        let fraction = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| invalid())?
        };

        Ok(Self {
            integer,
            fraction,
            precision,
        })
    }

    /// Convert a float, flooring the integer part and rounding the fraction half-up to
    /// `precision` digits.
    pub fn from_f64(value: f64, precision: u32) -> Result<Self, DecimalError> {
        check_precision(precision)?;
        if !value.is_finite() {
            return Err(DecimalError::InvalidFormat(value.to_string()));
        }

        let floor = value.floor();
        if floor < i64::MIN as f64 || floor >= i64::MAX as f64 {
            return Err(DecimalError::Overflow);
        }
        let target = scale(precision);
        let mut integer = floor as i64;
        let mut fraction = ((value - floor) * target as f64).round() as u64;
        if fraction >= target {
            integer = integer.checked_add(1).ok_or(DecimalError::Overflow)?;
            fraction -= target;
        }

        Ok(Self {
            integer,
            fraction,
            precision,
        })
    }

    pub fn from_parts(integer: i64, fraction: u64, precision: u32) -> Result<Self, DecimalError> {
        check_precision(precision)?;
        if fraction >= scale(precision) {
            return Err(DecimalError::FractionOutOfRange {
                fraction,
                precision,
            });
        }
        Ok(Self {
            integer,
            fraction,
            precision,
        })
    }

    pub fn integer(&self) -> i64 {
        self.integer
    }

    pub fn fraction(&self) -> u64 {
        self.fraction
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Sum carrying the precision of `self`, or `None` on overflow.
    ///
    /// A more precise right operand is rounded half-up to `self.precision` digits.
    pub fn checked_add(&self, other: &Decimal) -> Option<Decimal> {
        let target = scale(self.precision);
        let other_fraction = if other.precision > self.precision {
            let divisor = scale(other.precision - self.precision);
            (other.fraction + divisor / 2) / divisor
        } else {
            other
                .fraction
                .checked_mul(scale(self.precision - other.precision))?
        };

        let sum = self.fraction.checked_add(other_fraction)?;
        let carry = i64::try_from(sum / target).ok()?;
        let integer = self
            .integer
            .checked_add(other.integer)?
            .checked_add(carry)?;

        Some(Decimal {
            integer,
            fraction: sum % target,
            precision: self.precision,
        })
    }

    /// Lossy float value, used for range checks
    pub fn to_f64(&self) -> f64 {
        self.integer as f64 + self.fraction as f64 / scale(self.precision) as f64
    }
}

/// # Panics
///
/// Panics when the sum overflows the integer part, like the primitive integer types.
/// Use [`Decimal::checked_add`] to handle overflow.
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        match self.checked_add(&rhs) {
            Some(sum) => sum,
            None => panic!("attempt to add with overflow"),
        }
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::parse(s, DEFAULT_PRECISION)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Negative values are floored, so `(-2, 50)` renders as -1.50
        let negative = self.integer < 0;
        let (integer, fraction) = if negative && self.fraction > 0 {
            (
                self.integer.unsigned_abs() - 1,
                scale(self.precision) - self.fraction,
            )
        } else {
            (self.integer.unsigned_abs(), self.fraction)
        };
        let sign = if negative { "-" } else { "" };
        if self.precision == 0 {
            return write!(f, "{sign}{integer}");
        }
        write!(
            f,
            "{sign}{integer}.{fraction:0width$}",
            width = self.precision as usize
        )
    }
}
