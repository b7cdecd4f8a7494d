//! Class-size estimate per (module, week) and the attendance rates derived from it.
//!
//! The source spreadsheets carry no enrolment numbers, so the largest absence
//! count any single student recorded for a (module, week) pair stands in for the
//! number of sessions in that pair. Pairs without a recorded absence have no
//! capacity. Rates can exceed 100% when a student's absences come from
//! lower-capacity weeks; they are reported as computed.

use std::collections::BTreeMap;

use crate::models::Nested;
use crate::prepare::Record;

/// module → week → capacity
pub type Capacity = Nested<usize>;

/// student → module → week → non-attendance count
pub type AbsenceMatrix = BTreeMap<String, Nested<usize>>;

/// Non-attendance counts for rows carrying a student, a module and a week.
pub fn absence_matrix(records: &[Record]) -> AbsenceMatrix {
    let mut matrix = AbsenceMatrix::new();
    for record in records.iter().filter(|record| record.non_attendance && record.has_student()) {
        let (Some(module), Some(week)) = (&record.module, &record.week) else {
            continue;
        };
        *matrix
            .entry(record.student_id.clone())
            .or_default()
            .entry(module.clone())
            .or_default()
            .entry(week.clone())
            .or_insert(0) += 1;
    }
    matrix
}

/// Capacity of a pair is the maximum count any student has for it.
pub fn estimate_capacity(matrix: &AbsenceMatrix) -> Capacity {
    let mut capacity = Capacity::new();
    for modules in matrix.values() {
        for (module, weeks) in modules {
            let slots = capacity.entry(module.clone()).or_default();
            for (week, count) in weeks {
                let slot = slots.entry(week.clone()).or_insert(0);
                *slot = (*slot).max(*count);
            }
        }
    }
    capacity
}

/// Sum of a module's capacities over the known weeks.
pub fn module_capacity(capacity: &Capacity, module: &str, weeks: &[String]) -> usize {
    capacity
        .get(module)
        .map(|slots| weeks.iter().filter_map(|week| slots.get(week)).sum())
        .unwrap_or(0)
}

/// `100 * part / whole` rounded to one decimal; 0.0 for an empty whole.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// One decimal, halves to even.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
