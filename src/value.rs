use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Format used when a date column is rendered into a template
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format used when a date/time column is rendered into a template
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format used when a time-of-day column is rendered into a template
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A single scalar cell read from a result row or passed as a bind value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

/// One result row, keyed by column name
pub type Row = BTreeMap<String, SqlValue>;

impl SqlValue {
    /// Borrow the inner string of a `Text` value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
        }
    }
}

// Dates go out as their display string so templates see `2024-06-01`,
// not a structured chrono value.
impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(_) | Self::DateTime(_) | Self::Time(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
