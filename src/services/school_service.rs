//! Queries against a single school's store. Callers resolve the store through
//! the access layer first; nothing here checks who is asking.

use serde::Serialize;

use super::{across_schools, FanOut, ServiceError};
use crate::database::manager::{DatabaseError, DatabaseManager, TenantStore};
use crate::database::models::{AccessEvent, Employee, NewStudent, SchoolClass, Student};
use crate::directory::{DirectoryStore, Missing};
use crate::types::TenantId;

const STUDENT_COLUMNS: &str = "id, name, parent_email, phone, photo_url, class_name, age, created_at";

pub async fn list_students(store: &mut TenantStore) -> Result<Vec<Student>, DatabaseError> {
    let students = sqlx::query_as(&format!("SELECT {} FROM students ORDER BY name", STUDENT_COLUMNS))
        .fetch_all(store.conn())
        .await?;
    Ok(students)
}

pub async fn get_student(store: &mut TenantStore, id: i64) -> Result<Option<Student>, DatabaseError> {
    let student = sqlx::query_as(&format!("SELECT {} FROM students WHERE id = ?1", STUDENT_COLUMNS))
        .bind(id)
        .fetch_optional(store.conn())
        .await?;
    Ok(student)
}

pub async fn insert_student(store: &mut TenantStore, student: &NewStudent) -> Result<Student, ServiceError> {
    let name = student.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Invalid("student name is required".to_string()));
    }

    let created: Student = sqlx::query_as(&format!(
        r#"
        INSERT INTO students (name, parent_email, phone, photo_url, class_name, age)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING {}
        "#,
        STUDENT_COLUMNS
    ))
    .bind(name)
    .bind(student.parent_email.as_deref().map(crate::directory::normalize_email))
    .bind(&student.phone)
    .bind(&student.photo_url)
    .bind(student.class_name.as_deref().unwrap_or("Sem turma"))
    .bind(student.age)
    .fetch_one(store.conn())
    .await?;

    Ok(created)
}

pub async fn list_classes(store: &mut TenantStore) -> Result<Vec<SchoolClass>, DatabaseError> {
    let classes = sqlx::query_as("SELECT id, name, description FROM classes ORDER BY name")
        .fetch_all(store.conn())
        .await?;
    Ok(classes)
}

pub async fn create_class(
    store: &mut TenantStore,
    name: &str,
    description: Option<&str>,
) -> Result<SchoolClass, DatabaseError> {
    let class = sqlx::query_as(
        "INSERT INTO classes (name, description) VALUES (?1, ?2) RETURNING id, name, description",
    )
    .bind(name)
    .bind(description)
    .fetch_one(store.conn())
    .await?;
    Ok(class)
}

pub async fn list_employees(store: &mut TenantStore) -> Result<Vec<Employee>, DatabaseError> {
    let employees = sqlx::query_as("SELECT id, name, role, email, phone, guardian_id FROM employees ORDER BY name")
        .fetch_all(store.conn())
        .await?;
    Ok(employees)
}

/// Record an entry or exit reading for a student
pub async fn record_access_event(
    store: &mut TenantStore,
    student_id: i64,
    event_type: &str,
) -> Result<AccessEvent, ServiceError> {
    if get_student(store, student_id).await?.is_none() {
        return Err(ServiceError::not_found(Missing::Student(student_id)));
    }

    let event = sqlx::query_as(
        r#"
        INSERT INTO access_logs (student_id, event_type)
        VALUES (?1, ?2)
        RETURNING id, student_id, event_type, timestamp
        "#,
    )
    .bind(student_id)
    .bind(event_type)
    .fetch_one(store.conn())
    .await?;
    Ok(event)
}

#[derive(Debug, Clone, Serialize)]
pub struct MigratedSchool {
    pub school_id: TenantId,
    pub name: String,
    pub created: bool,
}

/// Open every registered school's store so each one is created or migrated
/// now rather than on its next request.
pub async fn migrate_all(
    databases: &DatabaseManager,
    directory: &DirectoryStore,
) -> Result<FanOut<MigratedSchool>, ServiceError> {
    let schools = directory.list_schools().await?;
    let fan_out = across_schools(databases, schools, |store| {
        Box::pin(async move { Ok(store.was_created()) })
    })
    .await?;

    Ok(FanOut {
        items: fan_out
            .items
            .into_iter()
            .map(|(school, created)| MigratedSchool {
                school_id: school.id,
                name: school.name,
                created,
            })
            .collect(),
        skipped: fan_out.skipped,
    })
}
