//! Pivoteur is a time-bucketed pivot engine for business-event data.
//!
//! Given a flat collection of dated, categorised records (leads, class
//! sessions, payroll lines, sales), the engine groups them by a dimension key
//! crossed with a calendar month, computes a derived metric per cell, fills
//! months that have no records with zeros, adds a pooled `TOTAL` row and
//! computes period-over-period growth.
//!
//! The entry point is [compute_pivot]. The smaller building blocks
//! ([normalize], [aggregate], [fill_gaps], [totals], [growth]) are public so
//! callers can compose their own views.

#![warn(missing_docs)]

mod accumulator;
mod aggregation;
mod bucket;
mod csv_import;
mod format;
mod gaps;
mod growth;
mod logging;
mod metric;
mod pivot;
mod range;
mod record;
mod stores;
mod timezone;
mod totals;

pub use accumulator::RawAccumulator;
pub use aggregation::{
    CounterRules, ExtraCounter, GroupedMap, RecordPredicate, aggregate, aggregate_undated,
    by_dimension, by_month, field_equals, flag_is,
};
pub use bucket::{BucketKey, month_number, year};
pub use csv_import::{InputFormat, read_csv_records, read_json_records, read_records_from_path};
pub use format::{format_count, format_currency, format_percentage, format_value};
pub use gaps::fill_gaps;
pub use growth::{growth, month_over_month, year_over_year};
pub use logging::setup_logging;
pub use metric::{Metric, MetricDefinition, MetricRegistry, ValueKind, average, ratio};
pub use pivot::{
    ComparisonMode, Growth, MonthPair, PivotRequest, PivotResult, Summary, compute_pivot,
    summarize,
};
pub use range::{months_between, months_of_year, trailing_months, year_over_year_range};
pub use record::{NormalizeOptions, NormalizedRecord, RawRecord, UNKNOWN_LABEL, Value, normalize};
pub use stores::{Annotation, AnnotationStore, SQLiteAnnotationStore, create_annotation_table};
pub use timezone::{get_local_offset, today_in_timezone};
pub use totals::{TOTAL_LABEL, row_totals, totals};

/// The errors that may occur in the engine and its data adapters.
///
/// Data-quality problems in the input records (unparsable dates, missing
/// dimension values, zero denominators) are never errors, they are absorbed
/// by the saturating policies of each component.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A metric name was requested that is not in the registry.
    ///
    /// This is a configuration error made by the caller and is never
    /// defaulted to another metric.
    #[error("unknown metric \"{0}\"")]
    UnknownMetric(String),

    /// A string could not be interpreted as a calendar month.
    #[error("\"{0}\" is not a valid month, expected a format like 2024-01 or Jan 2024")]
    InvalidBucketKey(String),

    /// A year-over-year comparison was requested between invalid years.
    #[error("invalid comparison: {0}")]
    InvalidComparison(String),

    /// The CSV had issues that prevented it from being parsed.
    #[error("Could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The JSON input had issues that prevented it from being parsed.
    #[error("Could not parse the JSON file: {0}")]
    InvalidJSON(String),

    /// The input file could not be read.
    #[error("could not read input: {0}")]
    ReadError(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The logging subscriber could not be set up.
    #[error("could not set up logging: {0}")]
    LoggingError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
