use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

/// Semantic meaning a spreadsheet column can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    StudentId,
    StudentName,
    Module,
    Week,
    Reason,
    Risk,
    Resolved,
    Intervention,
    Qualification,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::StudentId,
        Role::StudentName,
        Role::Module,
        Role::Week,
        Role::Reason,
        Role::Risk,
        Role::Resolved,
        Role::Intervention,
        Role::Qualification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::StudentId => "student_id",
            Role::StudentName => "student_name",
            Role::Module => "module",
            Role::Week => "week",
            Role::Reason => "reason",
            Role::Risk => "risk",
            Role::Resolved => "resolved",
            Role::Intervention => "intervention",
            Role::Qualification => "qualification",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    StartsWith(&'static str),
    Equals(&'static str),
    ContainsAny(&'static [&'static str]),
}

impl Matcher {
    pub fn matches(&self, header: &str) -> bool {
        let header = header.to_lowercase();
        match self {
            Matcher::StartsWith(prefix) => header.starts_with(prefix),
            Matcher::Equals(value) => header == *value,
            Matcher::ContainsAny(needles) => needles.iter().any(|needle| header.contains(needle)),
        }
    }
}

/// One rule per role. The first header in document order that matches wins.
pub const ROLE_RULES: &[(Role, Matcher)] = &[
    (Role::StudentId, Matcher::StartsWith("student number")),
    (Role::StudentName, Matcher::StartsWith("student name")),
    (Role::Module, Matcher::StartsWith("module")),
    (Role::Week, Matcher::Equals("week")),
    (Role::Reason, Matcher::ContainsAny(&["reason"])),
    (Role::Risk, Matcher::ContainsAny(&["risk"])),
    (Role::Resolved, Matcher::ContainsAny(&["resolved"])),
    (Role::Intervention, Matcher::ContainsAny(&["intervention"])),
    (
        Role::Qualification,
        Matcher::ContainsAny(&["qual", "program", "programme", "course"]),
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedColumn {
    index: usize,
    name: String,
}

/// Role → column assignment for one dataset. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    slots: BTreeMap<Role, ResolvedColumn>,
}

impl RoleMap {
    /// Resolves every role independently against the (already trimmed) headers.
    /// Two roles may land on the same column.
    pub fn resolve(headers: &[String]) -> Self {
        let mut slots = BTreeMap::new();
        for (role, matcher) in ROLE_RULES {
            match headers.iter().position(|header| matcher.matches(header)) {
                Some(index) => {
                    debug!(role = %role, column = %headers[index], "resolved column role");
                    slots.insert(
                        *role,
                        ResolvedColumn {
                            index,
                            name: headers[index].clone(),
                        },
                    );
                }
                None => warn!(role = %role, "no column matches role; dependent aggregates stay empty"),
            }
        }
        Self { slots }
    }

    pub fn index(&self, role: Role) -> Option<usize> {
        self.slots.get(&role).map(|column| column.index)
    }

    pub fn column(&self, role: Role) -> Option<&str> {
        self.slots.get(&role).map(|column| column.name.as_str())
    }

    pub fn has(&self, role: Role) -> bool {
        self.slots.contains_key(&role)
    }

    pub fn has_all(&self, roles: &[Role]) -> bool {
        roles.iter().all(|role| self.has(*role))
    }

    pub fn unresolved(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| !self.has(*role))
            .collect()
    }

    /// Role name → header, for the report.
    pub fn to_names(&self) -> BTreeMap<String, String> {
        self.slots
            .iter()
            .map(|(role, column)| (role.as_str().to_string(), column.name.clone()))
            .collect()
    }
}
