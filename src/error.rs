// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::access::AccessError;
use crate::database::manager::DatabaseError;
use crate::directory::{DirectoryError, Missing};
use crate::services::ServiceError;

/// HTTP API error with a status code, a client-safe message and a stable
/// machine-readable code the frontend switches on.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn error_code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message,
            "code": self.code
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::InvalidTenantId(id) => ApiError::bad_request(format!("Invalid school id: {}", id)),
            DatabaseError::StoreUnavailable { tenant_id, source } => {
                tracing::error!(tenant_id, "School store unavailable: {}", source);
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "School data is temporarily unavailable",
                )
            }
            DatabaseError::SchemaMigrationConflict { store, migration, message } => {
                tracing::error!(store, migration, "Schema migration failed: {}", message);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SCHEMA_MIGRATION_CONFLICT",
                    "School data could not be upgraded",
                )
            }
            DatabaseError::DataDir { path, source } => {
                tracing::error!("Data directory {} unusable: {}", path.display(), source);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(missing) => {
                let code = match &missing {
                    Missing::Token(_) => "TOKEN_NOT_FOUND",
                    Missing::Link(_) => "LINK_NOT_FOUND",
                    Missing::School(_) => "SCHOOL_NOT_FOUND",
                    Missing::Principal(_) => "USER_NOT_FOUND",
                    Missing::Student(_) => "STUDENT_NOT_FOUND",
                };
                ApiError::new(StatusCode::NOT_FOUND, code, format!("Not found: {}", missing))
            }
            DirectoryError::AlreadyUsed => ApiError::new(
                StatusCode::BAD_REQUEST,
                "TOKEN_ALREADY_USED",
                "This affiliate token has already been used",
            ),
            DirectoryError::AlreadyLinked(..) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "ALREADY_LINKED",
                "These schools are already linked",
            ),
            DirectoryError::SelfLink(_) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "SELF_LINK",
                "This token was generated by your own school. Generate it at the parent school and use it at a different affiliate school",
            ),
            DirectoryError::EmailTaken { .. } => ApiError::conflict(err.to_string()),
            DirectoryError::Invalid(msg) => ApiError::bad_request(msg),
            DirectoryError::InvalidRecord(msg) => {
                tracing::error!("Invalid directory record: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DirectoryError::Database(e) => e.into(),
            DirectoryError::Sqlx(e) => DatabaseError::Sqlx(e).into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Forbidden { .. } => ApiError::forbidden(err.to_string()),
            AccessError::NoHomeTenant { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, "NO_SCHOOL", err.to_string())
            }
            AccessError::Directory(e) => e.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Directory(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Invalid(msg) => ApiError::bad_request(msg),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_failures_have_distinct_codes() {
        let codes: Vec<&str> = [
            DirectoryError::NotFound(Missing::Token("X".into())),
            DirectoryError::AlreadyUsed,
            DirectoryError::AlreadyLinked(20, 21),
            DirectoryError::SelfLink(20),
        ]
        .into_iter()
        .map(|e| ApiError::from(e).error_code())
        .collect();
        assert_eq!(codes, ["TOKEN_NOT_FOUND", "TOKEN_ALREADY_USED", "ALREADY_LINKED", "SELF_LINK"]);
    }

    #[test]
    fn forbidden_names_both_schools() {
        let err = ApiError::from(AccessError::Forbidden { home: 22, requested: 20 });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "School 22 does not have access to school 20");
    }

    #[test]
    fn sql_errors_are_not_leaked() {
        let err = ApiError::from(DatabaseError::Sqlx(sqlx::Error::RowNotFound));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Database error occurred");
    }
}
