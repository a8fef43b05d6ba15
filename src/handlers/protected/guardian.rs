use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use super::require_guardian;
use crate::app::AppState;
use crate::database::models::{GuardianChild, GuardianEvent};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::FanOut;
use crate::types::RequestContext;

const DEFAULT_EVENT_LIMIT: u32 = 20;
const MAX_EVENT_LIMIT: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<u32>,
}

/// GET /api/guardian/students - the caller's children in every school
pub async fn students(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<FanOut<GuardianChild>> {
    let guardian_id = require_guardian(&ctx)?;
    let children = state.guardians.children_across_schools(guardian_id).await?;
    Ok(ApiResponse::success(children))
}

/// GET /api/guardian/notifications - recent entry/exit events
pub async fn notifications(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<FanOut<GuardianEvent>> {
    let guardian_id = require_guardian(&ctx)?;
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT).clamp(1, MAX_EVENT_LIMIT);
    let events = state.guardians.recent_events(guardian_id, limit).await?;
    Ok(ApiResponse::success(events))
}
