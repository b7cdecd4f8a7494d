use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{self, Breakdowns};
use crate::classify::non_attendance_flags;
use crate::clean::clean_dataset;
use crate::columns::RoleMap;
use crate::config::ReportOptions;
use crate::models::{CleaningStats, Counts, Dataset, Table};
use crate::normalize::compare_weeks;
use crate::prepare::prepare_records;
use crate::students::{analyze_students, StudentAnalytics};

/// Everything computed from one dataset. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// role → header the role resolved to
    pub columns: BTreeMap<String, String>,
    pub cleaning_stats: CleaningStats,
    pub total_records: usize,
    pub unique_students: usize,
    pub risk_counts: Counts,
    pub resolved_counts: Counts,
    pub by_reason: Counts,
    pub qualifications: Vec<String>,
    #[serde(flatten)]
    pub overall: Breakdowns,
    pub by_qualification: BTreeMap<String, Breakdowns>,
    #[serde(flatten)]
    pub students: StudentAnalytics,
    pub sample_rows: Table,
}

/// Cleans, classifies and aggregates a decoded dataset.
pub fn build_report(dataset: Dataset, options: &ReportOptions) -> Report {
    let span = tracing::info_span!("build_report", rows = dataset.len());
    let _guard = span.enter();

    let (dataset, cleaning_stats) = clean_dataset(dataset);
    let roles = RoleMap::resolve(&dataset.columns);
    let flags = non_attendance_flags(&dataset, &roles);
    let records = prepare_records(&dataset, &roles, &flags);

    let all: Vec<_> = records.iter().collect();
    let overall = Breakdowns::compute(&all, &roles);
    let students = analyze_students(
        &dataset,
        &records,
        &roles,
        &overall.weeks,
        &overall.modules,
        options,
    );

    let report = Report {
        columns: roles.to_names(),
        total_records: aggregate::total_records(&records),
        unique_students: aggregate::unique_students(&records),
        risk_counts: aggregate::risk_counts(&records, &roles),
        resolved_counts: aggregate::resolved_counts(&records, &roles),
        by_reason: aggregate::top_reasons(&records, options.top_reasons),
        qualifications: aggregate::distinct_qualifications(&records),
        by_qualification: aggregate::by_qualification(&records, &roles),
        sample_rows: sample_rows(&dataset, options.sample_rows),
        cleaning_stats,
        overall,
        students,
    };
    info!(
        total_records = report.total_records,
        unique_students = report.unique_students,
        non_attendance_rows = flags.iter().filter(|flag| **flag).count(),
        "report built"
    );
    report
}

/// First `limit` cleaned rows as text, missing cells as empty strings.
pub fn sample_rows(dataset: &Dataset, limit: usize) -> Table {
    Table {
        columns: dataset.columns.clone(),
        rows: dataset
            .rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(|cell| cell.display()).collect())
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// File name of the uploaded spreadsheet.
    pub source: String,
}

/// A report together with the upload it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub meta: ReportMeta,
    pub report: Report,
}

impl ReportDocument {
    pub fn new(source: impl Into<String>, report: Report) -> Self {
        Self {
            meta: ReportMeta {
                report_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                source: source.into(),
            },
            report,
        }
    }
}

const MARKDOWN_LIST_LIMIT: usize = 10;

pub fn render_markdown(document: &ReportDocument) -> String {
    let report = &document.report;
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        document.meta.source,
        document.meta.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    let stats = &report.cleaning_stats;
    let _ = writeln!(output, "## Records");
    let _ = writeln!(
        output,
        "- {} rows read, {} after dropping empty rows",
        stats.rows_raw, stats.rows_after_drop_all_empty
    );
    let _ = writeln!(output, "- {} identifiable records", report.total_records);
    let _ = writeln!(output, "- {} unique students", report.unique_students);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");
    if report.risk_counts.is_empty() {
        let _ = writeln!(output, "No risk levels recorded.");
    } else {
        for (risk, count) in &report.risk_counts {
            let _ = writeln!(output, "- {risk}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Non-Attendance by Module");
    if report.overall.by_module_attendance.is_empty() {
        let _ = writeln!(output, "No non-attendance recorded.");
    } else {
        let mut modules: Vec<(&String, &usize)> = report.overall.by_module_attendance.iter().collect();
        modules.sort_by(|a, b| b.1.cmp(a.1));
        for (module, students) in modules {
            let _ = writeln!(output, "- {module}: {students} students");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Non-Attendance by Week");
    if report.overall.by_week_attendance.is_empty() {
        let _ = writeln!(output, "No non-attendance recorded.");
    } else {
        let mut weeks: Vec<(&String, &usize)> = report.overall.by_week_attendance.iter().collect();
        weeks.sort_by(|a, b| compare_weeks(a.0, b.0));
        for (week, students) in weeks {
            let resolved = report
                .overall
                .resolved_rate
                .get(week)
                .map(|rate| format!(" ({rate:.1}% resolved)"))
                .unwrap_or_default();
            let _ = writeln!(output, "- {week}: {students} students{resolved}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Absent Students");
    if report.students.global_top_students_att.is_empty() {
        let _ = writeln!(output, "No student absences recorded.");
    } else {
        for student in report
            .students
            .global_top_students_att
            .iter()
            .take(MARKDOWN_LIST_LIMIT)
        {
            let _ = writeln!(
                output,
                "- {}: {} absences ({:.1}% of estimated sessions)",
                student.label, student.count, student.rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Repeated Records");
    if report.students.repeated_records.students.is_empty() {
        let _ = writeln!(output, "No student appears on more than one row.");
    } else {
        for student in report
            .students
            .repeated_records
            .students
            .iter()
            .take(MARKDOWN_LIST_LIMIT)
        {
            let _ = writeln!(output, "- {}: {} rows", student.label, student.count);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, WeekRisk};

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn two_row_dataset() -> Dataset {
        Dataset::new(
            headers(&[
                "Student Number",
                "Student Name",
                "Module",
                "Week",
                "Reason for Absence",
                "Risk Level",
            ]),
            vec![
                vec![
                    text("1001.0"),
                    text("Ada"),
                    text("CS101"),
                    text("1"),
                    text("Did not attend"),
                    text("High"),
                ],
                vec![
                    text("1002"),
                    text("Ben"),
                    text("CS102"),
                    text("1"),
                    text("Sick note submitted"),
                    text("Low"),
                ],
            ],
        )
    }

    #[test]
    fn flags_only_absence_reasons() {
        let report = build_report(two_row_dataset(), &ReportOptions::default());

        assert_eq!(report.students.student_lookup[0].id, "1001");
        assert_eq!(
            report.overall.by_module_attendance,
            Counts::from([("CS101".to_string(), 1)])
        );
        assert_eq!(report.overall.by_module.len(), 2);
        assert_eq!(report.total_records, 2);
        assert_eq!(report.unique_students, 2);
        assert_eq!(report.by_reason.len(), 2);
        assert_eq!(report.students.ps_risk_module_max["1001"]["CS101"], "High");
    }

    #[test]
    fn qualification_variants_share_one_mode() {
        let dataset = Dataset::new(
            headers(&["Student Number", "Qualification"]),
            vec![
                vec![Cell::Integer(7), text("BBIS-B")],
                vec![Cell::Integer(7), text("bbis")],
            ],
        );
        let report = build_report(dataset, &ReportOptions::default());

        assert_eq!(report.qualifications, vec!["BBIS"]);
        assert_eq!(report.students.student_lookup[0].qual, "BBIS");
        assert_eq!(report.students.student_lookup[0].label, "7 — [BBIS]");
        assert_eq!(report.students.repeated_records.students[0].count, 2);
    }

    #[test]
    fn missing_risk_column_degrades_only_risk_outputs() {
        let dataset = Dataset::new(
            headers(&["Student Number", "Module", "Week", "Reason"]),
            vec![
                vec![Cell::Integer(1), text("CS101"), text("Week 1"), text("absent")],
                vec![Cell::Integer(2), text("CS101"), text("Week 2"), text("no show")],
            ],
        );
        let report = build_report(dataset, &ReportOptions::default());

        assert!(report.risk_counts.is_empty());
        assert!(report.students.ps_risk_module_max.is_empty());
        assert_eq!(report.overall.week_risk, WeekRisk::default());
        assert_eq!(report.overall.by_module_attendance["CS101"], 2);
        assert_eq!(report.overall.by_week_attendance["Week 2"], 1);
        assert_eq!(report.overall.weeks, vec!["Week 1", "Week 2"]);
    }

    #[test]
    fn capacity_rate_matches_hand_calculation() {
        let mut rows = Vec::new();
        let mut push = |student: i64, week: &str, times: usize| {
            for _ in 0..times {
                rows.push(vec![Cell::Integer(student), text("CS101"), text(week), text("absent")]);
            }
        };
        push(1, "1", 2);
        push(1, "2", 3);
        push(2, "1", 4);
        push(2, "2", 5);
        let dataset = Dataset::new(headers(&["Student Number", "Module", "Week", "Reason"]), rows);
        let report = build_report(dataset, &ReportOptions::default());

        let summary = &report.students.student_module_summary["1"][0];
        assert_eq!(summary.total_absences, 5);
        assert_eq!(summary.rate, 55.6);
        assert_eq!(report.students.module_week_capacity["CS101"]["2"], 5);
    }

    #[test]
    fn empty_rows_are_dropped_and_sample_is_bounded() {
        let mut rows: Vec<Vec<Cell>> = (0..60)
            .map(|index| vec![Cell::Integer(index), Cell::Missing])
            .collect();
        rows.push(vec![Cell::Missing, text("   ")]);
        let dataset = Dataset::new(headers(&["Student Number", "Notes"]), rows);
        let report = build_report(dataset, &ReportOptions::default());

        assert_eq!(report.cleaning_stats.rows_raw, 61);
        assert_eq!(report.cleaning_stats.rows_final, 60);
        assert_eq!(report.sample_rows.rows.len(), 50);
        assert_eq!(report.sample_rows.rows[0], vec!["0".to_string(), String::new()]);
    }

    #[test]
    fn no_recognised_columns_still_builds() {
        let dataset = Dataset::new(headers(&["Foo"]), vec![vec![text("bar")]]);
        let report = build_report(dataset, &ReportOptions::default());

        assert!(report.columns.is_empty());
        assert_eq!(report.total_records, 0);
        assert!(!report.students.student_enabled);
        assert_eq!(report.qualifications, vec!["Unknown"]);
        assert!(report.by_qualification["Unknown"].by_module.is_empty());
    }

    #[test]
    fn serializes_to_flat_json() {
        let report = build_report(two_row_dataset(), &ReportOptions::default());
        let value = serde_json::to_value(&report).unwrap();

        for key in [
            "cleaning_stats",
            "by_module_attendance",
            "week_risk",
            "resolved_rate",
            "student_lookup",
            "module_week_capacity",
            "repeated_records",
            "sample_rows",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["columns"]["reason"], "Reason for Absence");
    }

    #[test]
    fn markdown_lists_sections() {
        let report = build_report(two_row_dataset(), &ReportOptions::default());
        let document = ReportDocument::new("attendance.xlsx", report);
        let markdown = render_markdown(&document);

        assert!(markdown.starts_with("# Attendance Report\nGenerated for attendance.xlsx"));
        assert!(markdown.contains("- CS101: 1 students"));
        assert!(markdown.contains("- 1: 1 students"));
        assert!(markdown.contains("No student appears on more than one row."));
    }
}
