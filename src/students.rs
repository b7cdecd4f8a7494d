use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::capacity::{
    absence_matrix, estimate_capacity, module_capacity, percent, AbsenceMatrix, Capacity,
};
use crate::columns::{Role, RoleMap};
use crate::config::ReportOptions;
use crate::models::{
    Dataset, ModuleSummary, Nested, RankedStudent, RepeatedRecords, RepeatedStudent,
    StudentLookup, Table,
};
use crate::normalize::UNKNOWN;
use crate::prepare::Record;
use crate::risk::RiskRank;

/// Per-student analytics. Everything stays empty when there is no student number column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentAnalytics {
    pub student_enabled: bool,
    pub student_lookup: Vec<StudentLookup>,
    /// student → module → non-attendance count
    pub ps_modules_att: Nested<usize>,
    /// student → week → non-attendance count
    pub ps_weeks_att: Nested<usize>,
    /// student → module → highest risk label seen
    pub ps_risk_module_max: Nested<String>,
    /// student → week → risk → non-attendance count
    pub ps_week_risk_counts: BTreeMap<String, Nested<usize>>,
    pub ps_week_module_att: AbsenceMatrix,
    pub student_module_summary: BTreeMap<String, Vec<ModuleSummary>>,
    pub module_week_capacity: Capacity,
    pub global_top_students_att: Vec<RankedStudent>,
    pub module_top_students_att: BTreeMap<String, Vec<RankedStudent>>,
    pub repeated_records: RepeatedRecords,
}

pub fn analyze_students(
    dataset: &Dataset,
    records: &[Record],
    roles: &RoleMap,
    weeks: &[String],
    modules: &[String],
    options: &ReportOptions,
) -> StudentAnalytics {
    if !roles.has(Role::StudentId) {
        return StudentAnalytics::default();
    }

    let mut analytics = StudentAnalytics {
        student_enabled: true,
        student_lookup: student_lookup(records),
        ..StudentAnalytics::default()
    };
    let absences: Vec<&Record> = records
        .iter()
        .filter(|record| record.non_attendance && record.has_student())
        .collect();

    if roles.has_all(&[Role::Reason, Role::Module]) {
        analytics.ps_modules_att = count_per_student(&absences, |record| record.module.as_deref());
    }
    if roles.has_all(&[Role::Reason, Role::Week]) {
        analytics.ps_weeks_att = count_per_student(&absences, |record| record.week.as_deref());
    }
    if roles.has_all(&[Role::Risk, Role::Module]) {
        analytics.ps_risk_module_max = risk_module_max(records);
    }
    if roles.has_all(&[Role::Reason, Role::Week, Role::Risk]) {
        analytics.ps_week_risk_counts = week_risk_counts(&absences);
    }
    if roles.has_all(&[Role::Reason, Role::Module, Role::Week]) {
        analytics.ps_week_module_att = absence_matrix(records);
        analytics.module_week_capacity = estimate_capacity(&analytics.ps_week_module_att);
        analytics.student_module_summary = module_summaries(
            &analytics.student_lookup,
            &analytics.ps_week_module_att,
            &analytics.module_week_capacity,
            weeks,
        );
    }

    let ranking = Ranking {
        lookup: &analytics.student_lookup,
        module_counts: &analytics.ps_modules_att,
        capacity: &analytics.module_week_capacity,
        weeks,
    };
    analytics.global_top_students_att = ranking.global(options.top_students_global);
    analytics.module_top_students_att = ranking.per_module(modules, options.top_students_per_module);
    analytics.repeated_records = repeated_records(dataset, records, roles, &analytics.student_lookup, options);
    analytics
}

/// One entry per student in first-seen order, labelled with the most common
/// name and qualification.
pub fn student_lookup(records: &[Record]) -> Vec<StudentLookup> {
    let mut order: Vec<&str> = Vec::new();
    let mut names: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut qualifications: HashMap<&str, Vec<&str>> = HashMap::new();

    for record in records.iter().filter(|record| record.has_student()) {
        let id = record.student_id.as_str();
        if !names.contains_key(id) {
            order.push(id);
        }
        let student_names = names.entry(id).or_default();
        if let Some(name) = record.name.as_deref() {
            student_names.push(name);
        }
        let student_qualifications = qualifications.entry(id).or_default();
        if record.qualification != UNKNOWN {
            student_qualifications.push(record.qualification.as_str());
        }
    }

    order
        .into_iter()
        .map(|id| {
            let name = names
                .get(id)
                .and_then(|values| mode(values.iter().copied()))
                .unwrap_or("")
                .trim()
                .to_string();
            let qual = qualifications
                .get(id)
                .and_then(|values| mode(values.iter().copied()))
                .unwrap_or(UNKNOWN)
                .to_string();
            StudentLookup {
                id: id.to_string(),
                label: display_label(id, &name, &qual),
                name,
                qual,
            }
        })
        .collect()
}

/// Most frequent value; ties go to the value encountered first.
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// `"<id> — <name> — [<qual>]"`, leaving out the empty parts.
pub fn display_label(id: &str, name: &str, qual: &str) -> String {
    let mut label = if name.is_empty() {
        id.to_string()
    } else {
        format!("{id} — {name}")
    };
    if !qual.is_empty() {
        label.push_str(&format!(" — [{qual}]"));
    }
    label
}

fn count_per_student<'a>(
    records: &[&'a Record],
    key: impl Fn(&'a Record) -> Option<&'a str>,
) -> Nested<usize> {
    let mut counts = Nested::new();
    for &record in records {
        if let Some(group) = key(record) {
            *counts
                .entry(record.student_id.clone())
                .or_insert_with(BTreeMap::new)
                .entry(group.to_string())
                .or_insert(0) += 1;
        }
    }
    counts
}

fn risk_module_max(records: &[Record]) -> Nested<String> {
    let mut ranks: BTreeMap<&str, BTreeMap<&str, RiskRank>> = BTreeMap::new();
    for record in records.iter().filter(|record| record.has_student()) {
        let Some(module) = record.module.as_deref() else {
            continue;
        };
        let rank = record
            .risk
            .as_deref()
            .map(RiskRank::from_label)
            .unwrap_or_default();
        let slot = ranks
            .entry(record.student_id.as_str())
            .or_default()
            .entry(module)
            .or_default();
        *slot = (*slot).max(rank);
    }
    ranks
        .into_iter()
        .map(|(student, modules)| {
            let labels = modules
                .into_iter()
                .map(|(module, rank)| (module.to_string(), rank.label().to_string()))
                .collect();
            (student.to_string(), labels)
        })
        .collect()
}

fn week_risk_counts(absences: &[&Record]) -> BTreeMap<String, Nested<usize>> {
    let mut counts: BTreeMap<String, Nested<usize>> = BTreeMap::new();
    for record in absences {
        let (Some(week), Some(risk)) = (&record.week, &record.risk) else {
            continue;
        };
        *counts
            .entry(record.student_id.clone())
            .or_default()
            .entry(week.clone())
            .or_default()
            .entry(risk.clone())
            .or_insert(0) += 1;
    }
    counts
}

/// Per-student module totals with the capacity-based rate, modules in name order.
fn module_summaries(
    lookup: &[StudentLookup],
    matrix: &AbsenceMatrix,
    capacity: &Capacity,
    weeks: &[String],
) -> BTreeMap<String, Vec<ModuleSummary>> {
    lookup
        .iter()
        .map(|student| {
            let rows = matrix
                .get(&student.id)
                .map(|modules| {
                    modules
                        .iter()
                        .map(|(module, per_week)| {
                            let total_absences: usize = per_week.values().sum();
                            ModuleSummary {
                                module: module.clone(),
                                total_absences,
                                rate: percent(total_absences, module_capacity(capacity, module, weeks)),
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            (student.id.clone(), rows)
        })
        .collect()
}

struct Ranking<'a> {
    lookup: &'a [StudentLookup],
    module_counts: &'a Nested<usize>,
    capacity: &'a Capacity,
    weeks: &'a [String],
}

impl Ranking<'_> {
    /// Students by total absences; the rate is over the capacity of every
    /// module the student missed a class in.
    fn global(&self, limit: usize) -> Vec<RankedStudent> {
        let mut ranked: Vec<RankedStudent> = self
            .lookup
            .iter()
            .filter_map(|student| {
                let modules = self.module_counts.get(&student.id)?;
                let count: usize = modules.values().sum();
                let denominator: usize = modules
                    .keys()
                    .map(|module| module_capacity(self.capacity, module, self.weeks))
                    .sum();
                Some(ranked_student(student, count, percent(count, denominator)))
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked.truncate(limit);
        ranked
    }

    fn per_module(&self, modules: &[String], limit: usize) -> BTreeMap<String, Vec<RankedStudent>> {
        let mut lists = BTreeMap::new();
        for module in modules {
            let denominator = module_capacity(self.capacity, module, self.weeks);
            let mut ranked: Vec<RankedStudent> = self
                .lookup
                .iter()
                .filter_map(|student| {
                    let count = *self.module_counts.get(&student.id)?.get(module)?;
                    Some(ranked_student(student, count, percent(count, denominator)))
                })
                .collect();
            if ranked.is_empty() {
                continue;
            }
            sort_ranked(&mut ranked);
            ranked.truncate(limit);
            lists.insert(module.clone(), ranked);
        }
        lists
    }
}

fn ranked_student(student: &StudentLookup, count: usize, rate: f64) -> RankedStudent {
    RankedStudent {
        id: student.id.clone(),
        label: student.label.clone(),
        count,
        rate,
        qual: student.qual.clone(),
    }
}

/// Descending absences, then descending rate. Stable, so equal entries keep
/// first-seen order.
fn sort_ranked(ranked: &mut [RankedStudent]) {
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.rate.total_cmp(&a.rate))
    });
}

/// Students appearing on more than one row, with a preview of their rows.
fn repeated_records(
    dataset: &Dataset,
    records: &[Record],
    roles: &RoleMap,
    lookup: &[StudentLookup],
    options: &ReportOptions,
) -> RepeatedRecords {
    let mut row_counts: HashMap<&str, usize> = HashMap::new();
    for record in records.iter().filter(|record| record.has_student()) {
        *row_counts.entry(record.student_id.as_str()).or_insert(0) += 1;
    }

    let mut students: Vec<RepeatedStudent> = lookup
        .iter()
        .filter_map(|student| {
            let count = *row_counts.get(student.id.as_str())?;
            (count > 1).then(|| RepeatedStudent {
                id: student.id.clone(),
                label: student.label.clone(),
                count,
            })
        })
        .collect();
    students.sort_by(|a, b| b.count.cmp(&a.count));
    students.truncate(options.repeated_students);

    let mut preview_columns: Vec<(usize, &str)> = Vec::new();
    for role in [
        Role::StudentId,
        Role::StudentName,
        Role::Module,
        Role::Week,
        Role::Risk,
        Role::Qualification,
    ] {
        let (Some(index), Some(name)) = (roles.index(role), roles.column(role)) else {
            continue;
        };
        if !preview_columns.iter().any(|(seen, _)| *seen == index) {
            preview_columns.push((index, name));
        }
    }

    let selected: HashSet<&str> = students.iter().map(|student| student.id.as_str()).collect();
    let rows = records
        .iter()
        .filter(|record| selected.contains(record.student_id.as_str()))
        .take(options.repeated_preview_rows)
        .map(|record| {
            preview_columns
                .iter()
                .map(|(column, _)| dataset.cell(record.row, *column).display())
                .collect()
        })
        .collect();

    RepeatedRecords {
        students,
        preview: Table {
            columns: preview_columns
                .iter()
                .map(|(_, name)| name.to_string())
                .collect(),
            rows,
        },
    }
}
