pub mod enrollment_service;
pub mod guardian_service;
pub mod school_service;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::database::manager::{DatabaseError, DatabaseManager, TenantStore};
use crate::database::models::TenantRecord;
use crate::directory::{DirectoryError, Missing};
use crate::types::TenantId;

pub use enrollment_service::{EmployeeEnrollment, Enrollment, EnrollmentService, GuardianLink};
pub use guardian_service::GuardianService;

/// Errors from services that touch both the directory and school stores
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::Sqlx(err))
    }
}

impl ServiceError {
    pub fn not_found(missing: Missing) -> Self {
        ServiceError::Directory(DirectoryError::NotFound(missing))
    }
}

/// A school left out of a fan-out query
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSchool {
    pub school_id: TenantId,
    pub reason: String,
}

/// Results gathered across schools. A store that cannot be opened or queried
/// lands in `skipped` instead of failing the whole query.
#[derive(Debug, Serialize)]
pub struct FanOut<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedSchool>,
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

const FAN_OUT_CONCURRENCY: usize = 8;

/// Run `query` against the store of every school in `schools`, pairing each
/// result with its school. Results are ordered by school id.
///
/// Unavailable stores and failed queries are skipped. A schema migration
/// conflict, or any other error that is not local to one store, fails the
/// aggregate.
pub async fn across_schools<R, F>(
    databases: &DatabaseManager,
    schools: Vec<TenantRecord>,
    query: F,
) -> Result<FanOut<(TenantRecord, R)>, DatabaseError>
where
    R: Send,
    F: for<'c> Fn(&'c mut TenantStore) -> BoxFuture<'c, Result<R, DatabaseError>> + Sync,
{
    let query = &query;
    let mut outcomes: Vec<(TenantRecord, Result<R, DatabaseError>)> = futures::stream::iter(schools)
        .map(|school| async move {
            let result = databases.with_store(school.id, query).await;
            (school, result)
        })
        .buffer_unordered(FAN_OUT_CONCURRENCY)
        .collect()
        .await;
    outcomes.sort_by_key(|(school, _)| school.id);

    let mut fan_out = FanOut::default();
    for (school, result) in outcomes {
        match result {
            Ok(value) => fan_out.items.push((school, value)),
            Err(e) if e.is_skippable() => {
                warn!(school_id = school.id, error = %e, "Skipping school in cross-school query");
                fan_out.skipped.push(SkippedSchool {
                    school_id: school.id,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                error!(school_id = school.id, error = %e, "Cross-school query aborted");
                return Err(e);
            }
        }
    }
    Ok(fan_out)
}
