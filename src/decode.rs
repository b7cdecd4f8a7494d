//! Spreadsheet bytes to a [`Dataset`].
//!
//! CSV goes through `csv`, workbooks (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`)
//! through `calamine`. Only the first worksheet of a workbook is read. The first
//! row is always the header.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::extension;
use crate::models::{Cell, Dataset};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Cell texts read as missing in CSV input.
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Input that cannot be read as a table. The message is shown to the user as is.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported file type '.{extension}'; upload a .csv, .xlsx, .xlsm, .xlsb, .xls or .ods file")]
    UnsupportedFormat { extension: String },

    #[error("upload is {size} bytes, above the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line} has {found} fields but the header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("unreadable workbook: {0}")]
    Workbook(String),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("no header row found")]
    Empty,
}

impl From<calamine::Error> for DecodeError {
    fn from(err: calamine::Error) -> Self {
        Self::Workbook(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    pub fn detect(file_name: &str) -> Result<Self, DecodeError> {
        match extension(file_name).as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => Ok(Self::Workbook),
            other => Err(DecodeError::UnsupportedFormat {
                extension: other.unwrap_or_default().to_string(),
            }),
        }
    }
}

/// Decodes by file extension.
pub fn decode(file_name: &str, bytes: Vec<u8>) -> Result<Dataset, DecodeError> {
    let dataset = match SourceFormat::detect(file_name)? {
        SourceFormat::Csv => decode_csv(&bytes)?,
        SourceFormat::Workbook => decode_workbook(bytes)?,
    };
    info!(
        file = file_name,
        rows = dataset.len(),
        columns = dataset.columns.len(),
        "decoded spreadsheet"
    );
    Ok(dataset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Text,
}

/// Reads CSV with per-column typing: a column is numeric only if every
/// non-missing value in it parses.
pub fn decode_csv(bytes: &[u8]) -> Result<Dataset, DecodeError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(DecodeError::Empty);
    }
    let width = headers.len();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() > width {
            return Err(DecodeError::RaggedRow {
                line: record.position().map(|position| position.line()).unwrap_or(0),
                expected: width,
                found: record.len(),
            });
        }
        raw_rows.push(record.iter().map(str::to_string).collect());
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|column| {
            column_kind(
                raw_rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(String::as_str),
            )
        })
        .collect();
    debug!(?kinds, "inferred CSV column kinds");

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            kinds
                .iter()
                .enumerate()
                .map(|(column, kind)| csv_cell(row.get(column).map(String::as_str), *kind))
                .collect()
        })
        .collect();
    Ok(Dataset::new(unique_headers(headers), rows))
}

fn is_na(value: &str) -> bool {
    NA_VALUES.contains(&value)
}

fn column_kind<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut present = values.filter(|value| !is_na(value));
    if present.clone().all(|value| value.trim().parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if present.all(|value| value.trim().parse::<f64>().is_ok_and(f64::is_finite)) {
        ColumnKind::Real
    } else {
        ColumnKind::Text
    }
}

fn csv_cell(value: Option<&str>, kind: ColumnKind) -> Cell {
    let Some(value) = value.filter(|value| !is_na(value)) else {
        return Cell::Missing;
    };
    let text = || Cell::Text(value.to_string());
    match kind {
        ColumnKind::Integer => value.trim().parse().map(Cell::Integer).unwrap_or_else(|_| text()),
        ColumnKind::Real => value.trim().parse().map(Cell::Real).unwrap_or_else(|_| text()),
        ColumnKind::Text => text(),
    }
}

/// Reads the first worksheet of any workbook format calamine understands.
pub fn decode_workbook(bytes: Vec<u8>) -> Result<Dataset, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DecodeError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet)?;
    debug!(sheet = %sheet, size = ?range.get_size(), "reading first worksheet");

    let mut rows = range.rows();
    let header = rows.next().ok_or(DecodeError::Empty)?;
    let headers = header.iter().map(header_text).collect();
    let body = rows
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();
    Ok(Dataset::new(unique_headers(headers), body))
}

fn header_text(data: &Data) -> String {
    match data {
        Data::String(value) => value.clone(),
        other => workbook_cell(other).display(),
    }
}

/// Whole-number floats become integers, the way spreadsheet readers usually
/// surface integer columns.
pub fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Int(value) => Cell::Integer(*value),
        Data::Float(value)
            if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 =>
        {
            Cell::Integer(*value as i64)
        }
        Data::Float(value) => Cell::Real(*value),
        Data::String(value) => Cell::Text(value.clone()),
        Data::Bool(value) => Cell::Text((if *value { "True" } else { "False" }).to_string()),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|datetime| Cell::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or_else(|| Cell::Real(value.as_f64())),
        Data::DateTimeIso(value) | Data::DurationIso(value) => Cell::Text(value.clone()),
        Data::Error(_) | Data::Empty => Cell::Missing,
    }
}

/// Blank headers become `Unnamed: <index>`; repeats get `.1`, `.2`, … suffixes.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(index, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.trim().to_string()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
