/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a school, which is also the identifier of its isolated store.
pub type TenantId = i64;

/// Roles a principal can authenticate as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SchoolAdmin,
    Teacher,
    Inspector,
    Guardian,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::SchoolAdmin => "school_admin",
            Role::Teacher => "teacher",
            Role::Inspector => "inspector",
            Role::Guardian => "guardian",
            Role::Employee => "employee",
        }
    }

    /// Roles whose rows live in the shared `guardians` table
    pub fn is_guardian_table(&self) -> bool {
        matches!(self, Role::Guardian | Role::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "school_admin" => Ok(Role::SchoolAdmin),
            "teacher" => Ok(Role::Teacher),
            "inspector" => Ok(Role::Inspector),
            "guardian" => Ok(Role::Guardian),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// An authenticated actor. Built at the directory boundary or decoded from a
/// verified token by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    /// Assigned school for teachers and inspectors. Unused for other roles.
    pub school_id: Option<TenantId>,
}

impl Principal {
    /// The tenant this principal belongs to, if any.
    ///
    /// A school admin's home is its own school row; teachers and inspectors
    /// use their assigned school. Guardians, employees and super admins are
    /// tenant-less and are scoped by whichever schools list them.
    pub fn home_tenant(&self) -> Option<TenantId> {
        match self.role {
            Role::SchoolAdmin => Some(self.id),
            Role::Teacher | Role::Inspector => self.school_id,
            Role::Guardian | Role::Employee | Role::SuperAdmin => None,
        }
    }
}

/// Per-request context threaded explicitly into every core call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}
