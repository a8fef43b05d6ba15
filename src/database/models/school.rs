use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::TenantId;

/// A registered school as stored in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TenantRecord {
    pub id: TenantId,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub admin_name: Option<String>,
    pub created_at: NaiveDateTime,
}
