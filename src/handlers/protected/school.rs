use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{require_school_admin, require_school_staff};
use crate::access::resolve_accessible_tenant;
use crate::app::AppState;
use crate::database::models::{AccessEvent, Employee, NewEmployee, NewStudent, SchoolClass, Student, TeacherRecord};
use crate::directory::NewTeacher;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::school_service;
use crate::services::{EmployeeEnrollment, Enrollment};
use crate::types::{Principal, RequestContext, TenantId};

/// Optional `?school_id=` selector for reading an affiliated school's data
#[derive(Debug, Default, Deserialize)]
pub struct SchoolQuery {
    pub school_id: Option<TenantId>,
}

#[derive(Debug, Deserialize)]
pub struct NewClassRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewTeacherRequest {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewInspectorRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessEventRequest {
    pub student_id: i64,
    pub event_type: String,
}

/// GET /api/school/students
pub async fn list_students(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SchoolQuery>,
) -> ApiResult<Vec<Student>> {
    let school_id = resolve_accessible_tenant(&state.directory, &ctx, query.school_id).await?;
    let students = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { school_service::list_students(store).await })
        })
        .await?;
    Ok(ApiResponse::success(students))
}

/// POST /api/school/students - enrolls into the caller's own school only
pub async fn create_student(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(student): Json<NewStudent>,
) -> ApiResult<Enrollment> {
    let school_id = require_school_admin(&ctx)?;
    let enrollment_service = state.enrollment.clone();
    let enrollment = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { enrollment_service.enroll_student(store, student).await })
        })
        .await?;
    Ok(ApiResponse::created(enrollment))
}

/// GET /api/school/classes
pub async fn list_classes(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SchoolQuery>,
) -> ApiResult<Vec<SchoolClass>> {
    let school_id = resolve_accessible_tenant(&state.directory, &ctx, query.school_id).await?;
    let classes = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { school_service::list_classes(store).await })
        })
        .await?;
    Ok(ApiResponse::success(classes))
}

/// POST /api/school/classes
pub async fn create_class(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<NewClassRequest>,
) -> ApiResult<SchoolClass> {
    let school_id = require_school_admin(&ctx)?;
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Class name is required"));
    }

    let class = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { school_service::create_class(store, &name, request.description.as_deref()).await })
        })
        .await?;
    Ok(ApiResponse::created(class))
}

/// GET /api/school/teachers
pub async fn list_teachers(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SchoolQuery>,
) -> ApiResult<Vec<TeacherRecord>> {
    let school_id = resolve_accessible_tenant(&state.directory, &ctx, query.school_id).await?;
    let teachers = state.directory.list_teachers(school_id).await?;
    Ok(ApiResponse::success(teachers))
}

/// POST /api/school/teachers - registers an active teacher of the caller's school
pub async fn create_teacher(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<NewTeacherRequest>,
) -> ApiResult<TeacherRecord> {
    let school_id = require_school_admin(&ctx)?;
    let teacher = state
        .directory
        .register_teacher(NewTeacher {
            name: request.name,
            email: request.email,
            subject: request.subject,
            school_id: Some(school_id),
        })
        .await?;
    Ok(ApiResponse::created(teacher))
}

/// POST /api/school/inspectors
pub async fn create_inspector(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<NewInspectorRequest>,
) -> ApiResult<Principal> {
    let school_id = require_school_admin(&ctx)?;
    let inspector = state
        .directory
        .register_inspector(&request.name, &request.email, school_id)
        .await?;
    Ok(ApiResponse::created(inspector))
}

/// GET /api/school/employees
pub async fn list_employees(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<SchoolQuery>,
) -> ApiResult<Vec<Employee>> {
    let school_id = resolve_accessible_tenant(&state.directory, &ctx, query.school_id).await?;
    let employees = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { school_service::list_employees(store).await })
        })
        .await?;
    Ok(ApiResponse::success(employees))
}

/// POST /api/school/employees - with an email, also opens an employee login
pub async fn create_employee(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(employee): Json<NewEmployee>,
) -> ApiResult<EmployeeEnrollment> {
    let school_id = require_school_admin(&ctx)?;
    let enrollment_service = state.enrollment.clone();
    let enrolled = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move { enrollment_service.add_employee(store, employee).await })
        })
        .await?;
    Ok(ApiResponse::created(enrolled))
}

/// POST /api/school/access-logs - an entry or exit at the school gate
pub async fn record_access_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<AccessEventRequest>,
) -> ApiResult<AccessEvent> {
    let school_id = require_school_staff(&ctx)?;
    let event_type = request.event_type.trim().to_string();
    if event_type.is_empty() {
        return Err(ApiError::bad_request("Event type is required"));
    }

    let event = state
        .databases
        .with_store(school_id, |store| {
            Box::pin(async move {
                school_service::record_access_event(store, request.student_id, &event_type).await
            })
        })
        .await?;
    Ok(ApiResponse::created(event))
}
