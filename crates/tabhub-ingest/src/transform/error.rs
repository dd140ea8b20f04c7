//! Error types for column codecs

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure category of a single cell conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidNumber,
    InvalidDate,
    InvalidEnumValue,
    LowerBound,
    UpperBound,
    /// Anything that does not fit one of the categories above
    Untracked,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidNumber => "invalid_number",
            ErrorCode::InvalidDate => "invalid_date",
            ErrorCode::InvalidEnumValue => "invalid_enum_value",
            ErrorCode::LowerBound => "lower_bound",
            ErrorCode::UpperBound => "upper_bound",
            ErrorCode::Untracked => "untracked",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic context attached to a validation error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ErrorContext {
    /// The violated numeric bound
    Bound(String),
    /// The date pattern that failed to match
    Format(String),
    /// The complete set of accepted enumeration values
    EnumValues(Vec<String>),
    Message(String),
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::Bound(bound) => write!(f, "bound {}", bound),
            ErrorContext::Format(format) => write!(f, "format '{}'", format),
            ErrorContext::EnumValues(values) => write!(f, "expected one of [{}]", values.join(", ")),
            ErrorContext::Message(message) => f.write_str(message),
        }
    }
}

/// A cell value that could not be converted by a column codec
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    /// The offending raw value
    pub value: String,
    pub context: Option<ErrorContext>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn invalid_number(value: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidNumber, value)
    }

    pub fn invalid_date(value: impl Into<String>, format: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDate, value).with_context(ErrorContext::Format(format.into()))
    }

    pub fn invalid_enum(value: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(ErrorCode::InvalidEnumValue, value).with_context(ErrorContext::EnumValues(values))
    }

    pub fn lower_bound(value: impl Into<String>, bound: impl fmt::Display) -> Self {
        Self::new(ErrorCode::LowerBound, value).with_context(ErrorContext::Bound(bound.to_string()))
    }

    pub fn upper_bound(value: impl Into<String>, bound: impl fmt::Display) -> Self {
        Self::new(ErrorCode::UpperBound, value).with_context(ErrorContext::Bound(bound.to_string()))
    }

    pub fn untracked(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Untracked, value).with_context(ErrorContext::Message(message.into()))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for value '{}'", self.code, self.value)?;
        if let Some(ref context) = self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

/// A column definition that cannot be compiled into codecs
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid column definition: {0}")]
    InvalidDefinition(String),

    #[error("Column '{column}': {source}")]
    Column {
        column: String,
        #[source]
        source: Box<SchemaError>,
    },

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Enumeration has {count} values but {bits}-bit storage allows at most {max}")]
    TooManyEnumValues { count: usize, bits: u32, max: usize },

    #[error("Invalid replace pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid date format '{format}': {reason}")]
    InvalidDateFormat { format: String, reason: String },

    #[error("{column_type} requires '{field}'")]
    MissingField {
        column_type: &'static str,
        field: &'static str,
    },

    #[error("Default value is not valid for the column type: {0}")]
    InvalidDefault(ValidationError),

    #[error("Failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SchemaError::InvalidDefinition(reason.into())
    }

    /// Attach the name of the column being compiled
    pub fn in_column(self, column: impl Into<String>) -> Self {
        SchemaError::Column {
            column: column.into(),
            source: Box::new(self),
        }
    }
}
