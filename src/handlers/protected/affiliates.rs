use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::require_school_admin;
use crate::access::switch_school;
use crate::app::AppState;
use crate::database::models::{AffiliateLink, AffiliateLinks, TenantRecord};
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::{RequestContext, TenantId};

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub link: AffiliateLink,
    pub parent_school: TenantRecord,
}

/// POST /api/school/affiliates/generate-token
pub async fn generate_token(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<AffiliateLink> {
    let school_id = require_school_admin(&ctx)?;
    let link = state.directory.create_affiliate_token(school_id).await?;
    Ok(ApiResponse::created(link))
}

/// POST /api/school/affiliates/join
pub async fn join(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<JoinRequest>,
) -> ApiResult<JoinResponse> {
    let school_id = require_school_admin(&ctx)?;
    let link = state.directory.claim_token(&body.token, school_id).await?;
    let parent_school = state.directory.require_school(link.parent_tenant_id).await?;
    Ok(ApiResponse::success(JoinResponse { link, parent_school }))
}

/// GET /api/school/affiliates/list
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<AffiliateLinks> {
    let school_id = require_school_admin(&ctx)?;
    let links = state.directory.list_links(school_id).await?;
    Ok(ApiResponse::success(links))
}

/// DELETE /api/school/affiliates/remove/:id
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(link_id): Path<i64>,
) -> ApiResult<AffiliateLink> {
    let school_id = require_school_admin(&ctx)?;
    let link = state.directory.revoke_link(link_id, school_id).await?;
    Ok(ApiResponse::success(link))
}

/// POST /api/school/affiliates/switch/:school_id
pub async fn switch(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(school_id): Path<TenantId>,
) -> ApiResult<TenantRecord> {
    let school = switch_school(&state.directory, &ctx, school_id).await?;
    Ok(ApiResponse::success(school))
}
