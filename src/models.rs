use std::collections::BTreeMap;

use serde::Serialize;

/// Category → count table. Missing categories are reported under `"Unknown"`.
pub type Counts = BTreeMap<String, usize>;

/// Two-level grouping, outer key → inner key → value.
pub type Nested<T> = BTreeMap<String, BTreeMap<String, T>>;

/// A single spreadsheet cell after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Real(f64),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Real(value) => value.is_nan(),
            Cell::Text(_) | Cell::Integer(_) => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Cell::Text(_))
    }

    /// String form of the cell, `None` when missing.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Text(value) => Some(value.clone()),
            Cell::Integer(value) => Some(value.to_string()),
            Cell::Real(value) if value.is_nan() => None,
            Cell::Real(value) => Some(value.to_string()),
            Cell::Missing => None,
        }
    }

    /// String form for display; missing renders as an empty string.
    pub fn display(&self) -> String {
        self.text().unwrap_or_default()
    }
}

/// Ordered rows over uniquely named columns. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&Cell::Missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub rows_raw: usize,
    pub rows_after_drop_all_empty: usize,
    pub dropped_missing_student_number: usize,
    pub dropped_duplicates_full_row: usize,
    pub rows_final: usize,
}

/// Plain column/row table used for row previews.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeekRisk {
    pub weeks: Vec<String>,
    pub series: Vec<RiskSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSeries {
    pub name: String,
    pub data: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentLookup {
    pub id: String,
    pub label: String,
    pub name: String,
    pub qual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub module: String,
    pub total_absences: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    pub id: String,
    pub label: String,
    pub count: usize,
    pub rate: f64,
    pub qual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatedStudent {
    pub id: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepeatedRecords {
    pub students: Vec<RepeatedStudent>,
    pub preview: Table,
}
