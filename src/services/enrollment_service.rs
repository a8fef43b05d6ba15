//! Guardian and employee accounts live in the directory while the records
//! that reference them live in a school store. Writing both is a two-step
//! saga with no transaction spanning the two databases:
//!
//! 1. find or create the directory account by its unique email;
//! 2. write the school-side link if it is not already there.
//!
//! A crash between the steps leaves the account without its link. Running
//! the same operation again finds the account by email and performs only
//! step 2, so a retry repairs the partial state.

use serde::Serialize;
use tracing::info;

use super::school_service::{get_student, insert_student};
use super::ServiceError;
use crate::database::manager::TenantStore;
use crate::database::models::{Employee, NewEmployee, NewStudent, Student};
use crate::directory::{normalize_email, DirectoryStore, Missing};
use crate::types::Role;

/// Outcome of linking a guardian to a student; the flags say which saga
/// steps did work on this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardianLink {
    pub guardian_id: i64,
    pub guardian_created: bool,
    pub link_created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub student: Student,
    pub guardian: Option<GuardianLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeEnrollment {
    pub employee: Employee,
    pub account_created: bool,
}

#[derive(Clone)]
pub struct EnrollmentService {
    directory: DirectoryStore,
}

impl EnrollmentService {
    pub fn new(directory: DirectoryStore) -> Self {
        Self { directory }
    }

    /// Create a student and, when a parent email is given, link the parent's
    /// guardian account to it.
    ///
    /// The parent email is checked against the directory before the student
    /// row is written, so a rejected email leaves nothing behind to retry.
    pub async fn enroll_student(
        &self,
        store: &mut TenantStore,
        student: NewStudent,
    ) -> Result<Enrollment, ServiceError> {
        if let Some(email) = student.parent_email.as_deref().filter(|e| !e.trim().is_empty()) {
            self.directory.ensure_guardian_email(email).await?;
        }

        let created = insert_student(store, &student).await?;
        info!(school_id = store.tenant_id(), student_id = created.id, "Enrolled student");

        let guardian = match created.parent_email.as_deref() {
            Some(email) if !email.is_empty() => {
                let name = format!("Responsável de {}", created.name);
                Some(
                    self.link_guardian(store, created.id, email, Some(&name), student.phone.as_deref())
                        .await?,
                )
            }
            _ => None,
        };

        Ok(Enrollment {
            student: created,
            guardian,
        })
    }

    /// Link the guardian owning `email` to a student, creating the account if
    /// needed. Repeatable: an existing account or link is reused.
    pub async fn link_guardian(
        &self,
        store: &mut TenantStore,
        student_id: i64,
        email: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<GuardianLink, ServiceError> {
        if get_student(store, student_id).await?.is_none() {
            return Err(ServiceError::not_found(Missing::Student(student_id)));
        }

        let (guardian, guardian_created) = self
            .directory
            .find_or_create_guardian(email, name, phone, Role::Guardian)
            .await?;

        let link_created = sqlx::query(
            r#"
            INSERT INTO student_guardians (student_id, guardian_id)
            SELECT ?1, ?2
            WHERE NOT EXISTS (
                SELECT 1 FROM student_guardians WHERE student_id = ?1 AND guardian_id = ?2
            )
            "#,
        )
        .bind(student_id)
        .bind(guardian.id)
        .execute(store.conn())
        .await?
        .rows_affected()
            == 1;

        info!(
            school_id = store.tenant_id(),
            student_id,
            guardian_id = guardian.id,
            guardian_created,
            link_created,
            "Linked guardian to student"
        );

        Ok(GuardianLink {
            guardian_id: guardian.id,
            guardian_created,
            link_created,
        })
    }

    /// Register an employee in the school store. With an email, the employee
    /// also gets (or reuses) a directory account and the row is linked to it.
    pub async fn add_employee(
        &self,
        store: &mut TenantStore,
        employee: NewEmployee,
    ) -> Result<EmployeeEnrollment, ServiceError> {
        let name = employee.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::Invalid("employee name is required".to_string()));
        }
        let email = employee.email.as_deref().map(normalize_email).filter(|e| !e.is_empty());

        let (guardian_id, account_created) = match &email {
            Some(email) => {
                let (account, created) = self
                    .directory
                    .find_or_create_guardian(email, Some(&name), employee.phone.as_deref(), Role::Employee)
                    .await?;
                (Some(account.id), created)
            }
            None => (None, false),
        };

        // A retry finds the row from the earlier attempt by email and only fills in the link
        let existing: Option<Employee> = match &email {
            Some(email) => {
                sqlx::query_as(
                    "SELECT id, name, role, email, phone, guardian_id FROM employees WHERE email = ?1",
                )
                .bind(email)
                .fetch_optional(store.conn())
                .await?
            }
            None => None,
        };

        let row: Employee = match existing {
            Some(existing) => {
                sqlx::query_as(
                    r#"
                    UPDATE employees SET guardian_id = COALESCE(guardian_id, ?1)
                    WHERE id = ?2
                    RETURNING id, name, role, email, phone, guardian_id
                    "#,
                )
                .bind(guardian_id)
                .bind(existing.id)
                .fetch_one(store.conn())
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    INSERT INTO employees (name, role, email, phone, guardian_id)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    RETURNING id, name, role, email, phone, guardian_id
                    "#,
                )
                .bind(&name)
                .bind(&employee.role)
                .bind(&email)
                .bind(&employee.phone)
                .bind(guardian_id)
                .fetch_one(store.conn())
                .await?
            }
        };

        info!(
            school_id = store.tenant_id(),
            employee_id = row.id,
            account_created,
            "Registered employee"
        );

        Ok(EmployeeEnrollment {
            employee: row,
            account_created,
        })
    }
}
