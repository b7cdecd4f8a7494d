use std::sync::LazyLock;

use regex::Regex;

use crate::columns::{Role, RoleMap};
use crate::models::Dataset;

static NON_ATTENDANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(absent|no\s*show|did\s*not\s*attend|not\s*attend|missed\s*class|no\s*class\s*attendance|attendance|attend)",
    )
    .expect("non-attendance pattern compiles")
});

/// True when a free-text reason describes a missed class.
pub fn is_non_attendance(reason: &str) -> bool {
    NON_ATTENDANCE.is_match(reason)
}

/// Per-row non-attendance flags. All false when the dataset has no reason column.
pub fn non_attendance_flags(dataset: &Dataset, roles: &RoleMap) -> Vec<bool> {
    let Some(reason) = roles.index(Role::Reason) else {
        return vec![false; dataset.len()];
    };
    (0..dataset.len())
        .map(|row| {
            dataset
                .cell(row, reason)
                .text()
                .is_some_and(|text| is_non_attendance(&text))
        })
        .collect()
}
