use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{Principal, Role, TenantId};

/// Columns shared by every principal table, selected with aliases so one row
/// type covers all of them. `role` is only populated for `guardians`.
#[derive(Debug, Clone, FromRow)]
pub struct PrincipalRow {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub school_id: Option<TenantId>,
    pub role: Option<String>,
}

impl PrincipalRow {
    /// Build the principal for a row found in the table that implies `role`.
    /// Guardian rows may override it with their own `role` column.
    pub fn into_principal(self, role: Role) -> Principal {
        let role = match (role, self.role.as_deref()) {
            (Role::Guardian, Some("employee")) => Role::Employee,
            (role, _) => role,
        };

        Principal {
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            school_id: self.school_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TeacherRecord {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub subject: Option<String>,
    pub school_id: Option<TenantId>,
    pub status: Option<String>,
}
