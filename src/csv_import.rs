//! Loading raw records from exported CSV and JSON files.

use std::{fs::File, io::Read, path::Path};

use crate::{
    Error,
    record::{RawRecord, Value},
};

/// The file formats records can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma separated values with a header row.
    Csv,
    /// A JSON array of objects.
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension, `None` if it is not recognised.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();

        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Reads records from CSV data with a header row.
///
/// Every column becomes a text field named after its header. Rows may have
/// fewer columns than the header, the missing fields are simply absent.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the data is not valid CSV.
pub fn read_csv_records(reader: impl Read) -> Result<Vec<RawRecord>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(error.to_string()))?
        .clone();

    let mut records = Vec::new();

    for (line_number, row) in reader.records().enumerate() {
        let row = row.map_err(|error| {
            Error::InvalidCSV(format!("row {}: {error}", line_number + 1))
        })?;

        let fields = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.to_owned(), Value::Text(value.to_owned())))
            .collect();

        records.push(RawRecord { fields });
    }

    tracing::debug!("Read {} records from CSV", records.len());

    Ok(records)
}

/// Reads records from a JSON array of objects.
///
/// Nested arrays and objects are kept as their JSON text.
///
/// # Errors
/// Returns [Error::InvalidJSON] if the data is not a JSON array of objects.
pub fn read_json_records(reader: impl Read) -> Result<Vec<RawRecord>, Error> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_reader(reader).map_err(|error| Error::InvalidJSON(error.to_string()))?;

    let records: Vec<RawRecord> = rows
        .into_iter()
        .map(|row| RawRecord {
            fields: row
                .into_iter()
                .map(|(name, value)| (name, Value::from(value)))
                .collect(),
        })
        .collect();

    tracing::debug!("Read {} records from JSON", records.len());

    Ok(records)
}

/// Reads records from the file at `path`.
///
/// If `format` is `None` the format is guessed from the file extension.
///
/// # Errors
/// Returns [Error::ReadError] if the file cannot be opened or its format
/// cannot be determined, otherwise the errors of [read_csv_records] and
/// [read_json_records].
pub fn read_records_from_path(
    path: &Path,
    format: Option<InputFormat>,
) -> Result<Vec<RawRecord>, Error> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .ok_or_else(|| {
            Error::ReadError(format!(
                "cannot tell the format of {}, expected a .csv or .json file",
                path.display()
            ))
        })?;

    let file = File::open(path)
        .map_err(|error| Error::ReadError(format!("{}: {error}", path.display())))?;

    match format {
        InputFormat::Csv => read_csv_records(file),
        InputFormat::Json => read_json_records(file),
    }
}
