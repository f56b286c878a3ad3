//! Calendar-month bucket keys.
//!
//! Every time-bucketed view in the engine is keyed by [BucketKey], a calendar
//! month written as `YYYY-MM`. This module is also the one place that knows
//! about month names, so display labels (`Jan`, `Jan 2024`) and the various
//! month string dialects found in exported data all go through here.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

use crate::Error;

/// The years a bucket can be in, the range of years [Date] supports.
const YEARS: std::ops::RangeInclusive<i32> = -9999..=9999;

const MONTH_NAMES: [&str; 12] = [
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

/// A calendar month used as a time bucket.
///
/// Ordering is chronological, which is also the lexicographic order of the
/// `YYYY-MM` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    year: i32,
    month: u8,
}

impl BucketKey {
    /// Create a bucket key for `month` (1-12) of `year`.
    ///
    /// # Errors
    /// Returns [Error::InvalidBucketKey] if `month` is not in `1..=12` or
    /// `year` is outside `-9999..=9999`.
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        if !(1..=12).contains(&month) || !YEARS.contains(&year) {
            return Err(Error::InvalidBucketKey(format!("{year:04}-{month:02}")));
        }

        Ok(Self { year, month })
    }

    /// The bucket that `date` falls in, using the calendar year and month of
    /// the date as given.
    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    /// Parse a month in one of the supported dialects.
    ///
    /// Accepts `2024-01`, `01/2024`, `1/2024`, `Jan-2024`, `Jan 2024` and
    /// full month names such as `January 2024`.
    ///
    /// # Errors
    /// Returns [Error::InvalidBucketKey] if the text is not a recognised month.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        let invalid = || Error::InvalidBucketKey(text.to_owned());

        let (first, second) = text.split_once(['-', '/', ' ']).ok_or_else(invalid)?;
        let second = second.trim();

        let (year, month) = if is_year(first) {
            (first, parse_month_number(second).ok_or_else(invalid)?)
        } else if let Some(month) = parse_month_number(first) {
            (second, month)
        } else {
            (second, month_from_name(first).ok_or_else(invalid)?)
        };

        if !is_year(year) {
            return Err(invalid());
        }

        let year = year.parse().map_err(|_| invalid())?;

        Self::new(year, month)
    }

    /// The calendar year of the bucket.
    pub fn year(self) -> i32 {
        self.year
    }

    /// The month number of the bucket, 1 for January through 12 for December.
    pub fn month_number(self) -> u8 {
        self.month
    }

    /// The same month-number in a different year.
    pub fn with_year(self, year: i32) -> Self {
        Self { year, ..self }
    }

    /// The calendar month immediately before this one.
    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                month: self.month - 1,
                ..self
            }
        }
    }

    /// The calendar month immediately after this one.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                month: self.month + 1,
                ..self
            }
        }
    }

    /// Three-letter month abbreviation, e.g. "Jan".
    pub fn short_label(self) -> &'static str {
        &MONTH_NAMES[usize::from(self.month - 1)][..3]
    }

    /// Month abbreviation and year, e.g. "Jan 2024".
    pub fn label(self) -> String {
        format!("{} {}", self.short_label(), self.year)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BucketKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Date> for BucketKey {
    fn from(date: Date) -> Self {
        Self::from_date(date)
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BucketKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// The month-number of `date`, 1 for January through 12 for December.
pub fn month_number(date: Date) -> u8 {
    u8::from(date.month())
}

/// The calendar year of `date`.
pub fn year(date: Date) -> i32 {
    date.year()
}

fn is_year(text: &str) -> bool {
    text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_month_number(text: &str) -> Option<u8> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    text.parse().ok().filter(|month| (1..=12).contains(month))
}

fn month_from_name(text: &str) -> Option<u8> {
    let lower = text.trim().to_lowercase();
    if lower.len() < 3 {
        return None;
    }

    MONTH_NAMES
        .iter()
        .position(|name| name.to_lowercase().starts_with(&lower))
        .map(|index| index as u8 + 1)
}
