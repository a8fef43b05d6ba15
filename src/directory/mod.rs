//! Shared directory of cross-school identities and the affiliation graph.

pub mod affiliates;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::manager::DatabaseError;
use crate::database::models::{PrincipalRow, TeacherRecord, TenantRecord};
use crate::types::{Principal, Role, TenantId};

pub use affiliates::generate_token;

/// What a `NotFound` error was looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Token(String),
    Link(i64),
    School(TenantId),
    Principal(String),
    Student(i64),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Token(token) => write!(f, "affiliate token '{}'", token),
            Missing::Link(id) => write!(f, "affiliate link {}", id),
            Missing::School(id) => write!(f, "school {}", id),
            Missing::Principal(email) => write!(f, "user '{}'", email),
            Missing::Student(id) => write!(f, "student {}", id),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Not found: {0}")]
    NotFound(Missing),

    #[error("Affiliate token has already been used")]
    AlreadyUsed,

    #[error("Schools {0} and {1} are already linked")]
    AlreadyLinked(TenantId, TenantId),

    #[error("School {0} cannot join its own affiliate token")]
    SelfLink(TenantId),

    #[error("Email '{email}' is already registered as {role}")]
    EmailTaken { email: String, role: Role },

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Invalid directory record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSchool {
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub admin_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTeacher {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub school_id: Option<TenantId>,
}

/// Principal tables in login precedence order
const PRINCIPAL_LOOKUP: &[(Role, &str)] = &[
    (
        Role::SuperAdmin,
        "SELECT id, email, name, NULL AS school_id, NULL AS role FROM super_admins WHERE email = ?1",
    ),
    (
        Role::SchoolAdmin,
        "SELECT id, email, name, NULL AS school_id, NULL AS role FROM schools WHERE email = ?1",
    ),
    (
        Role::Teacher,
        "SELECT id, email, name, school_id, NULL AS role FROM teachers WHERE email = ?1",
    ),
    (
        Role::Inspector,
        "SELECT id, email, name, school_id, NULL AS role FROM inspectors WHERE email = ?1",
    ),
    (
        Role::Guardian,
        "SELECT id, email, name, NULL AS school_id, role FROM guardians WHERE email = ?1",
    ),
];

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Handle on the shared directory database
#[derive(Clone)]
pub struct DirectoryStore {
    pool: SqlitePool,
}

impl DirectoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Look a principal up by email across every role table.
    ///
    /// Tables are searched in precedence order and the first hit fixes the
    /// role. Registration refuses emails already present in another table, so
    /// more than one hit only happens with legacy data; that case is logged.
    pub async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, DirectoryError> {
        let matches = self.principals_with_email(&normalize_email(email)).await?;

        if matches.len() > 1 {
            let roles: Vec<&str> = matches.iter().map(|p| p.role.as_str()).collect();
            warn!(
                email = %email,
                roles = ?roles,
                "Email registered under several roles; using {}",
                matches[0].role
            );
        }

        Ok(matches.into_iter().next())
    }

    async fn principals_with_email(&self, email: &str) -> Result<Vec<Principal>, DirectoryError> {
        let mut found = Vec::new();
        for (role, sql) in PRINCIPAL_LOOKUP {
            let row: Option<PrincipalRow> = sqlx::query_as(sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = row {
                found.push(row.into_principal(*role));
            }
        }
        Ok(found)
    }

    /// Fail with `EmailTaken` if any principal table already holds `email`
    async fn ensure_email_free(&self, email: &str) -> Result<(), DirectoryError> {
        if let Some(existing) = self.principals_with_email(email).await?.into_iter().next() {
            return Err(DirectoryError::EmailTaken {
                email: email.to_string(),
                role: existing.role,
            });
        }
        Ok(())
    }

    pub async fn register_school(&self, school: NewSchool) -> Result<TenantRecord, DirectoryError> {
        let email = normalize_email(&school.email);
        let name = school.name.trim();
        if name.is_empty() {
            return Err(DirectoryError::Invalid("school name is required".to_string()));
        }
        if email.is_empty() {
            return Err(DirectoryError::Invalid("school email is required".to_string()));
        }
        self.ensure_email_free(&email).await?;

        let record: TenantRecord = sqlx::query_as(
            r#"
            INSERT INTO schools (name, email, address, admin_name)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, email, address, admin_name, created_at
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(&school.address)
        .bind(&school.admin_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &email, Role::SchoolAdmin))?;

        info!(school_id = record.id, "Registered school '{}'", record.name);
        Ok(record)
    }

    pub async fn register_teacher(&self, teacher: NewTeacher) -> Result<TeacherRecord, DirectoryError> {
        let email = normalize_email(&teacher.email);
        if email.is_empty() {
            return Err(DirectoryError::Invalid("teacher email is required".to_string()));
        }
        if let Some(school_id) = teacher.school_id {
            self.require_school(school_id).await?;
        }
        self.ensure_email_free(&email).await?;

        let status = if teacher.school_id.is_some() { "active" } else { "pending" };
        let record: TeacherRecord = sqlx::query_as(
            r#"
            INSERT INTO teachers (name, email, subject, school_id, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, name, email, subject, school_id, status
            "#,
        )
        .bind(&teacher.name)
        .bind(&email)
        .bind(&teacher.subject)
        .bind(teacher.school_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &email, Role::Teacher))?;

        Ok(record)
    }

    pub async fn register_inspector(
        &self,
        name: &str,
        email: &str,
        school_id: TenantId,
    ) -> Result<Principal, DirectoryError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DirectoryError::Invalid("inspector email is required".to_string()));
        }
        self.require_school(school_id).await?;
        self.ensure_email_free(&email).await?;

        let row: PrincipalRow = sqlx::query_as(
            r#"
            INSERT INTO inspectors (name, email, school_id)
            VALUES (?1, ?2, ?3)
            RETURNING id, email, name, school_id, NULL AS role
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(school_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &email, Role::Inspector))?;

        Ok(row.into_principal(Role::Inspector))
    }

    pub async fn register_super_admin(&self, name: &str, email: &str) -> Result<Principal, DirectoryError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DirectoryError::Invalid("super admin email is required".to_string()));
        }
        self.ensure_email_free(&email).await?;

        let row: PrincipalRow = sqlx::query_as(
            r#"
            INSERT INTO super_admins (name, email)
            VALUES (?1, ?2)
            RETURNING id, email, name, NULL AS school_id, NULL AS role
            "#,
        )
        .bind(name)
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &email, Role::SuperAdmin))?;

        Ok(row.into_principal(Role::SuperAdmin))
    }

    /// Normalize `email` and check that it can name a guardian or employee
    /// account. An email owned by a staff or school account cannot double as a
    /// guardian login.
    pub async fn ensure_guardian_email(&self, email: &str) -> Result<String, DirectoryError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(DirectoryError::Invalid("guardian email is required".to_string()));
        }
        if let Some(existing) = self.principals_with_email(&email).await?.into_iter().next() {
            if !existing.role.is_guardian_table() {
                return Err(DirectoryError::EmailTaken { email, role: existing.role });
            }
        }
        Ok(email)
    }

    /// First half of the guardian saga: return the guardian (or employee)
    /// account for `email`, creating it if absent. The boolean is true when
    /// this call created the row.
    ///
    /// Safe to repeat and to race: the insert is a no-op on an existing email.
    pub async fn find_or_create_guardian(
        &self,
        email: &str,
        name: Option<&str>,
        phone: Option<&str>,
        role: Role,
    ) -> Result<(Principal, bool), DirectoryError> {
        if !role.is_guardian_table() {
            return Err(DirectoryError::Invalid(format!("{} accounts are not guardians", role)));
        }
        let email = self.ensure_guardian_email(email).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO guardians (name, email, phone, role)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(email) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(&email)
        .bind(phone)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        // A parent who is later hired keeps the same account, now as an employee
        if !inserted && role == Role::Employee {
            let promoted = sqlx::query("UPDATE guardians SET role = 'employee' WHERE email = ?1 AND role IS NOT 'employee'")
                .bind(&email)
                .execute(&self.pool)
                .await?
                .rows_affected();
            if promoted > 0 {
                info!(email = %email, "Promoted guardian account to employee");
            }
        }

        let row: PrincipalRow = sqlx::query_as(
            "SELECT id, email, name, NULL AS school_id, role FROM guardians WHERE email = ?1",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await?;

        if inserted {
            info!(guardian_id = row.id, role = %role, "Created guardian account");
        }
        Ok((row.into_principal(Role::Guardian), inserted))
    }

    pub async fn get_school(&self, id: TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        let record = sqlx::query_as(
            "SELECT id, name, email, address, admin_name, created_at FROM schools WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn require_school(&self, id: TenantId) -> Result<TenantRecord, DirectoryError> {
        self.get_school(id)
            .await?
            .ok_or(DirectoryError::NotFound(Missing::School(id)))
    }

    pub async fn list_schools(&self) -> Result<Vec<TenantRecord>, DirectoryError> {
        let records = sqlx::query_as(
            "SELECT id, name, email, address, admin_name, created_at FROM schools ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn list_teachers(&self, school_id: TenantId) -> Result<Vec<TeacherRecord>, DirectoryError> {
        let records = sqlx::query_as(
            r#"
            SELECT id, name, email, subject, school_id, status
            FROM teachers
            WHERE school_id = ?1
            ORDER BY name
            "#,
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

fn email_conflict(err: sqlx::Error, email: &str, role: Role) -> DirectoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::EmailTaken {
            email: email.to_string(),
            role,
        },
        _ => DirectoryError::Sqlx(err),
    }
}
