//! Count and rate breakdowns over prepared records.
//!
//! Every function here is total: an unresolved role yields an empty table or
//! zero rather than an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::capacity::percent;
use crate::columns::{Role, RoleMap};
use crate::models::{Counts, Nested, RiskSeries, WeekRisk};
use crate::normalize::{sort_weeks, UNKNOWN};
use crate::prepare::Record;

/// Resolved-column values that count as resolved, compared lowercased.
const RESOLVED_VALUES: &[&str] = &["yes", "y", "true", "1", "resolved"];

/// Rows identified either by a student number or by name, module and week together.
pub fn total_records(records: &[Record]) -> usize {
    records
        .iter()
        .filter(|record| {
            record.has_student()
                || (record.name.is_some() && record.module.is_some() && record.week.is_some())
        })
        .count()
}

/// Distinct non-empty normalized student ids.
pub fn unique_students(records: &[Record]) -> usize {
    records
        .iter()
        .filter(|record| record.has_student())
        .map(|record| record.student_id.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

pub fn risk_counts(records: &[Record], roles: &RoleMap) -> Counts {
    if !roles.has(Role::Risk) {
        return Counts::new();
    }
    value_counts(records.iter().map(|record| record.risk.as_deref()))
        .into_iter()
        .collect()
}

/// Yes/No from the intervention column when there is one, raw resolved values otherwise.
pub fn resolved_counts(records: &[Record], roles: &RoleMap) -> Counts {
    if roles.has(Role::Intervention) {
        let yes = records
            .iter()
            .filter(|record| record.intervention.is_some())
            .count();
        return Counts::from([
            ("Yes".to_string(), yes),
            ("No".to_string(), records.len() - yes),
        ]);
    }
    if roles.has(Role::Resolved) {
        return value_counts(records.iter().map(|record| record.resolved.as_deref()))
            .into_iter()
            .collect();
    }
    Counts::new()
}

/// The `limit` most frequent non-missing reasons; ties keep first-seen order.
pub fn top_reasons(records: &[Record], limit: usize) -> Counts {
    let mut counts: Vec<(String, usize)> = value_counts(
        records
            .iter()
            .filter_map(|record| record.reason.as_deref())
            .map(Some),
    );
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).collect()
}

pub fn is_resolved(record: &Record, roles: &RoleMap) -> bool {
    if roles.has(Role::Intervention) {
        return record.intervention.is_some();
    }
    record.resolved.as_deref().is_some_and(|value| {
        let value = value.trim().to_lowercase();
        RESOLVED_VALUES.contains(&value.as_str())
    })
}

pub fn distinct_modules<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    records
        .into_iter()
        .filter_map(|record| record.module.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn distinct_weeks<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    sort_weeks(
        records
            .into_iter()
            .filter_map(|record| record.week.clone())
            .collect::<BTreeSet<_>>(),
    )
}

/// Sorted canonical qualifications, `"Unknown"` included when present.
pub fn distinct_qualifications(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.qualification.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Module and week groupings over one slice of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breakdowns {
    pub weeks: Vec<String>,
    pub modules: Vec<String>,
    /// module → unique students, all rows
    pub by_module: Counts,
    /// module → unique students with a non-attendance row
    pub by_module_attendance: Counts,
    /// week → unique students with a non-attendance row
    pub by_week_attendance: Counts,
    /// week → module → unique students, all rows
    pub by_week_module_all: Nested<usize>,
    /// week → module → unique students with a non-attendance row
    pub by_week_module_attendance: Nested<usize>,
    pub week_risk: WeekRisk,
    /// week → percentage of resolved rows
    pub resolved_rate: BTreeMap<String, f64>,
}

impl Breakdowns {
    pub fn compute(records: &[&Record], roles: &RoleMap) -> Self {
        let mut breakdowns = Breakdowns {
            weeks: distinct_weeks(records.iter().copied()),
            modules: distinct_modules(records.iter().copied()),
            ..Breakdowns::default()
        };
        let absences = || records.iter().copied().filter(|record| record.non_attendance);

        if roles.has(Role::StudentId) {
            breakdowns.by_module =
                unique_students_by(records.iter().copied(), |record| record.module.as_deref());
            breakdowns.by_module_attendance =
                unique_students_by(absences(), |record| record.module.as_deref());
            breakdowns.by_week_attendance =
                unique_students_by(absences(), |record| record.week.as_deref());
            breakdowns.by_week_module_all = unique_students_by_week_module(records.iter().copied());
            breakdowns.by_week_module_attendance = unique_students_by_week_module(absences());
        }
        if roles.has_all(&[Role::Week, Role::Risk]) {
            breakdowns.week_risk = week_risk(records);
        }
        if roles.has(Role::Week) && (roles.has(Role::Intervention) || roles.has(Role::Resolved)) {
            breakdowns.resolved_rate = resolved_rate(records, roles);
        }
        breakdowns
    }
}

/// The same breakdowns restricted to each qualification in turn.
pub fn by_qualification(records: &[Record], roles: &RoleMap) -> BTreeMap<String, Breakdowns> {
    distinct_qualifications(records)
        .into_iter()
        .map(|qualification| {
            let slice: Vec<&Record> = records
                .iter()
                .filter(|record| record.qualification == qualification)
                .collect();
            let breakdowns = Breakdowns::compute(&slice, roles);
            (qualification, breakdowns)
        })
        .collect()
}

/// Count of identified rows per (week, risk) in week order, one series per
/// risk category. Rows without a student number are left out.
pub fn week_risk(records: &[&Record]) -> WeekRisk {
    let mut cells: HashMap<(&str, &str), usize> = HashMap::new();
    let mut risks = BTreeSet::new();
    let mut weeks = BTreeSet::new();
    for record in records.iter().filter(|record| record.has_student()) {
        let (Some(week), Some(risk)) = (record.week.as_deref(), record.risk.as_deref()) else {
            continue;
        };
        *cells.entry((week, risk)).or_insert(0) += 1;
        risks.insert(risk);
        weeks.insert(week);
    }

    let weeks = sort_weeks(weeks);
    let series = risks
        .into_iter()
        .map(|risk| RiskSeries {
            name: risk.to_string(),
            data: weeks
                .iter()
                .map(|week| cells.get(&(week.as_str(), risk)).copied().unwrap_or(0))
                .collect(),
        })
        .collect();
    WeekRisk { weeks, series }
}

/// Percentage of resolved rows per week, one decimal.
pub fn resolved_rate(records: &[&Record], roles: &RoleMap) -> BTreeMap<String, f64> {
    let mut tallies: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let Some(week) = record.week.as_deref() else {
            continue;
        };
        let tally = tallies.entry(week).or_insert((0, 0));
        tally.0 += 1;
        if is_resolved(record, roles) {
            tally.1 += 1;
        }
    }
    tallies
        .into_iter()
        .map(|(week, (total, resolved))| (week.to_string(), percent(resolved, total)))
        .collect()
}

/// Category counts in first-seen order, missing values under `"Unknown"`.
fn value_counts<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<(String, usize)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        let key = value.unwrap_or(UNKNOWN);
        match positions.get(key) {
            Some(&position) => counts[position].1 += 1,
            None => {
                positions.insert(key, counts.len());
                counts.push((key.to_string(), 1));
            }
        }
    }
    counts
}

/// Unique students per group. Groups present only through rows without an id count 0.
fn unique_students_by<'a>(
    records: impl Iterator<Item = &'a Record>,
    key: impl Fn(&'a Record) -> Option<&'a str>,
) -> Counts {
    let mut groups: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        let Some(group) = key(record) else {
            continue;
        };
        let students = groups.entry(group).or_default();
        if record.has_student() {
            students.insert(record.student_id.as_str());
        }
    }
    groups
        .into_iter()
        .map(|(group, students)| (group.to_string(), students.len()))
        .collect()
}

fn unique_students_by_week_module<'a>(records: impl Iterator<Item = &'a Record>) -> Nested<usize> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, BTreeSet<&str>>> = BTreeMap::new();
    for record in records {
        let (Some(week), Some(module)) = (record.week.as_deref(), record.module.as_deref()) else {
            continue;
        };
        let students = groups.entry(week).or_default().entry(module).or_default();
        if record.has_student() {
            students.insert(record.student_id.as_str());
        }
    }
    groups
        .into_iter()
        .map(|(week, modules)| {
            let modules = modules
                .into_iter()
                .map(|(module, students)| (module.to_string(), students.len()))
                .collect();
            (week.to_string(), modules)
        })
        .collect()
}
