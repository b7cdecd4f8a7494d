//! Canonical string keys for identifiers, qualification codes and week labels.

use std::cmp::Ordering;

use crate::models::Cell;

/// Sentinel for a missing category.
pub const UNKNOWN: &str = "Unknown";

/// Spelling variants that collapse to a base qualification code.
const QUALIFICATION_ALIASES: &[(&str, &str)] = &[
    ("BBIS-B", "BBIS"),
    ("BITW-B", "BITW"),
    ("HCS-B", "HCS"),
];

/// Student identifier as a stable key; empty when the cell is missing.
pub fn normalize_id(cell: &Cell) -> String {
    match cell {
        Cell::Missing => String::new(),
        Cell::Integer(value) => value.to_string(),
        Cell::Real(value) if value.is_nan() => String::new(),
        Cell::Real(value) if value.is_finite() && value.fract() == 0.0 => {
            format!("{value:.0}")
        }
        Cell::Real(value) => value.to_string(),
        Cell::Text(value) => normalize_id_text(value),
    }
}

/// Trims and removes trailing `.0` runs left behind by spreadsheet float coercion.
/// Repeats until nothing changes, so the result is a fixed point.
pub fn normalize_id_text(raw: &str) -> String {
    let mut current = raw.trim();
    loop {
        let next = strip_zero_fraction(current).trim();
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

fn strip_zero_fraction(value: &str) -> &str {
    let without_zeros = value.trim_end_matches('0');
    if without_zeros.len() < value.len() {
        if let Some(stripped) = without_zeros.strip_suffix('.') {
            return stripped;
        }
    }
    value
}

pub fn canonical_qualification(cell: &Cell) -> String {
    match cell.text() {
        Some(text) => canonical_qualification_text(&text),
        None => UNKNOWN.to_string(),
    }
}

/// Uppercased code with known variants collapsed; never empty. The sentinel
/// itself maps to itself, any other spelling of it is uppercased like a code.
pub fn canonical_qualification_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == UNKNOWN {
        return UNKNOWN.to_string();
    }
    let upper = trimmed.to_uppercase();
    QUALIFICATION_ALIASES
        .iter()
        .find(|(variant, _)| *variant == upper)
        .map(|(_, base)| base.to_string())
        .unwrap_or(upper)
}

/// First run of ASCII digits in the label, 0 when there is none.
pub fn week_sort_key(label: &str) -> u64 {
    let digits: String = label
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

pub fn compare_weeks(a: &str, b: &str) -> Ordering {
    week_sort_key(a)
        .cmp(&week_sort_key(b))
        .then_with(|| a.cmp(b))
}

/// Sorts week labels by embedded number, then by label text.
pub fn sort_weeks<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut weeks: Vec<String> = labels.into_iter().map(Into::into).collect();
    weeks.sort_by(|a, b| compare_weeks(a, b));
    weeks
}
