use crate::columns::{Role, RoleMap};
use crate::models::Dataset;
use crate::normalize::{canonical_qualification, normalize_id, UNKNOWN};

/// One cleaned row seen through the role map. Fields for unresolved roles are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Index of the row in the cleaned dataset.
    pub row: usize,
    /// Normalized student identifier, empty when absent.
    pub student_id: String,
    pub name: Option<String>,
    pub module: Option<String>,
    pub week: Option<String>,
    pub reason: Option<String>,
    pub risk: Option<String>,
    pub resolved: Option<String>,
    pub intervention: Option<String>,
    /// Canonical qualification code, `"Unknown"` when absent.
    pub qualification: String,
    pub non_attendance: bool,
}

impl Record {
    pub fn has_student(&self) -> bool {
        !self.student_id.is_empty()
    }
}

pub fn prepare_records(dataset: &Dataset, roles: &RoleMap, flags: &[bool]) -> Vec<Record> {
    let text = |row: usize, role: Role| {
        roles
            .index(role)
            .and_then(|column| dataset.cell(row, column).text())
    };

    (0..dataset.len())
        .map(|row| Record {
            row,
            student_id: roles
                .index(Role::StudentId)
                .map(|column| normalize_id(dataset.cell(row, column)))
                .unwrap_or_default(),
            name: text(row, Role::StudentName),
            module: text(row, Role::Module),
            week: text(row, Role::Week),
            reason: text(row, Role::Reason),
            risk: text(row, Role::Risk),
            resolved: text(row, Role::Resolved),
            intervention: text(row, Role::Intervention),
            qualification: roles
                .index(Role::Qualification)
                .map(|column| canonical_qualification(dataset.cell(row, column)))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            non_attendance: flags.get(row).copied().unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    #[test]
    fn projects_roles_into_records() {
        let dataset = Dataset::new(
            vec![
                "Student Number".into(),
                "Module".into(),
                "Week".into(),
                "Qualification".into(),
            ],
            vec![
                vec![
                    Cell::Text("1001.0".into()),
                    Cell::Text("CS101".into()),
                    Cell::Integer(3),
                    Cell::Text("bbis-b".into()),
                ],
                vec![Cell::Missing, Cell::Missing, Cell::Missing, Cell::Missing],
            ],
        );
        let roles = RoleMap::resolve(&dataset.columns);
        let records = prepare_records(&dataset, &roles, &[true]);

        assert_eq!(records[0].student_id, "1001");
        assert_eq!(records[0].module.as_deref(), Some("CS101"));
        assert_eq!(records[0].week.as_deref(), Some("3"));
        assert_eq!(records[0].qualification, "BBIS");
        assert!(records[0].non_attendance);
        assert_eq!(records[0].risk, None);

        assert!(!records[1].has_student());
        assert_eq!(records[1].qualification, "Unknown");
        assert!(!records[1].non_attendance);
    }
}
