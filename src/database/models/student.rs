use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::TenantId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub parent_email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub class_name: Option<String>,
    pub age: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub parent_email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub class_name: Option<String>,
    pub age: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SchoolClass {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AccessEvent {
    pub id: i64,
    pub student_id: Option<i64>,
    pub event_type: String,
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub guardian_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Raw row for a guardian's child inside one school store
#[derive(Debug, Clone, FromRow)]
pub struct ChildRow {
    pub id: i64,
    pub name: String,
    pub photo_url: Option<String>,
    pub class_name: Option<String>,
    pub linked_at: Option<NaiveDateTime>,
}

/// A child of a guardian, tagged with the school it was found in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianChild {
    pub school_id: TenantId,
    pub school_name: String,
    pub student_id: i64,
    pub name: String,
    pub photo_url: Option<String>,
    pub class_name: Option<String>,
    pub linked_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub event_type: String,
    pub timestamp: Option<NaiveDateTime>,
}

/// An entry/exit event for one of a guardian's children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianEvent {
    pub school_id: TenantId,
    pub school_name: String,
    pub event_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub event_type: String,
    pub timestamp: Option<NaiveDateTime>,
}
