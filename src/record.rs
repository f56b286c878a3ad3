//! Raw input records and their normalisation.
//!
//! Records arrive from a data source as loosely typed field maps: CSV columns
//! are always text, JSON fields may be numbers, booleans or strings. This
//! module is the single boundary where those values are coerced into the
//! forms the engine works with: a calendar [Date] for the timestamp, trimmed
//! text for dimension values, and `f64`/`bool` facts that default to zero or
//! false instead of propagating missing values.

use std::{borrow::Cow, collections::BTreeMap};

use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

/// The dimension value used for records that have no value for a dimension.
pub const UNKNOWN_LABEL: &str = "Unknown";

const ISO_DATE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month padding:none]-[day padding:none]");
const ISO_SLASH_DATE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]/[month padding:none]/[day padding:none]");
const DAY_FIRST_DATE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[day padding:none]/[month padding:none]/[year]");

const CURRENCY_SYMBOLS: &[char] = &['$', '£', '€', '₹', '¥'];

/// A single field value as supplied by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// An explicit empty value, e.g. JSON `null`.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A numeric fact.
    Number(f64),
    /// Free text, which may still hold a number, a flag or a date.
    Text(String),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => number
                .as_f64()
                .map(Value::Number)
                .unwrap_or_else(|| Value::Text(number.to_string())),
            serde_json::Value::String(text) => Value::Text(text),
            other => Value::Text(other.to_string()),
        }
    }
}

/// A business event as supplied by the data source, before normalisation.
///
/// Records are immutable inputs, the engine only ever reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    /// The record's fields keyed by column or property name.
    pub fields: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`, replacing any previous value.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }
}

/// Controls how raw records are normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// The field holding the record's timestamp.
    pub timestamp_field: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            timestamp_field: "date".to_owned(),
        }
    }
}

/// A record with its timestamp parsed and its text fields trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    date: Option<Date>,
    fields: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    /// The calendar date of the record, or `None` if the timestamp was
    /// missing or could not be parsed.
    ///
    /// Undated records cannot be placed in a time bucket but still count
    /// towards non-time-bucketed summaries.
    pub fn date(&self) -> Option<Date> {
        self.date
    }

    /// The value of `field` as a dimension key.
    ///
    /// Missing, null and blank values are reported as [UNKNOWN_LABEL] so that
    /// unclassified records stay visible.
    pub fn dimension(&self, field: &str) -> String {
        self.text(field)
            .map(Cow::into_owned)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_owned())
    }

    /// The value of `field` as text, `None` if the field is missing or blank.
    pub fn text(&self, field: &str) -> Option<Cow<'_, str>> {
        match self.fields.get(field)? {
            Value::Null => None,
            Value::Text(text) => Some(Cow::Borrowed(text.as_str())),
            Value::Number(number) => Some(Cow::Owned(number.to_string())),
            Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        }
    }

    /// The value of `field` as a number.
    ///
    /// Missing and non-numeric values are `0.0`, they never propagate as
    /// missing values into sums.
    pub fn number(&self, field: &str) -> f64 {
        match self.fields.get(field) {
            Some(Value::Number(number)) if number.is_finite() => *number,
            Some(Value::Text(text)) => parse_number(text).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// The value of `field` as a boolean flag.
    ///
    /// Accepts booleans, non-zero numbers and the usual spellings of yes/true.
    /// Anything else, including a missing field, is `false`.
    pub fn flag(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => *number != 0.0 && !number.is_nan(),
            Some(Value::Text(text)) => matches!(
                text.to_lowercase().as_str(),
                "true" | "yes" | "y" | "1" | "t"
            ),
            _ => false,
        }
    }

    /// Whether the text value of `field` equals `expected`, ignoring case.
    pub fn text_equals(&self, field: &str, expected: &str) -> bool {
        self.text(field)
            .is_some_and(|text| text.eq_ignore_ascii_case(expected))
    }
}

/// Normalise a raw record.
///
/// The timestamp is parsed from either an ISO-like `YYYY-MM-DD` date (an
/// optional time part after `T` or a space is ignored) or a day-first
/// `DD/MM/YYYY` date. The calendar date is taken as written, no timezone
/// conversion is applied. Text values are trimmed and blank text is treated
/// as absent.
pub fn normalize(record: &RawRecord, options: &NormalizeOptions) -> NormalizedRecord {
    let fields: BTreeMap<String, Value> = record
        .fields
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::Text(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    Value::Text(trimmed.to_owned())
                }
                Value::Null => return None,
                other => other.clone(),
            };

            Some((name.clone(), value))
        })
        .collect();

    let date = match fields.get(&options.timestamp_field) {
        Some(Value::Text(text)) => {
            let date = parse_timestamp(text);
            if date.is_none() {
                tracing::debug!("Could not parse timestamp {text:?}, record left undated");
            }
            date
        }
        Some(other) => {
            tracing::debug!("Timestamp {other:?} is not text, record left undated");
            None
        }
        None => None,
    };

    NormalizedRecord { date, fields }
}

/// Parses a timestamp in one of the accepted date dialects.
fn parse_timestamp(text: &str) -> Option<Date> {
    let date_part = text.trim().split(['T', ' ']).next()?;

    [ISO_DATE_FORMAT, ISO_SLASH_DATE_FORMAT, DAY_FIRST_DATE_FORMAT]
        .iter()
        .find_map(|format| Date::parse(date_part, format).ok())
}

/// Parses a numeric amount, allowing a leading currency symbol and thousands
/// separators.
///
/// A comma after the decimal point (`1.234,50`) is a different number
/// convention and the text is not treated as a number.
fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();

    if let (Some(comma), Some(point)) = (text.rfind(','), text.find('.')) {
        if comma > point {
            return None;
        }
    }

    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
