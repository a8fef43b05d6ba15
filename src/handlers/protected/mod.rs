// Protected handlers: the JWT middleware has already placed a
// RequestContext in the request extensions.
pub mod affiliates;
pub mod guardian;
pub mod school;

use crate::error::ApiError;
use crate::types::{RequestContext, Role, TenantId};

/// The caller's own school, for operations only a school admin may perform
pub(crate) fn require_school_admin(ctx: &RequestContext) -> Result<TenantId, ApiError> {
    match ctx.principal.role {
        Role::SchoolAdmin => Ok(ctx.principal.id),
        role => Err(ApiError::forbidden(format!("{} accounts cannot manage this school", role))),
    }
}

/// The caller's own school, for gate staff recording entries and exits
pub(crate) fn require_school_staff(ctx: &RequestContext) -> Result<TenantId, ApiError> {
    match (ctx.principal.role, ctx.principal.home_tenant()) {
        (Role::SchoolAdmin | Role::Inspector, Some(school_id)) => Ok(school_id),
        (role, _) => Err(ApiError::forbidden(format!("{} accounts cannot record access events", role))),
    }
}

pub(crate) fn require_guardian(ctx: &RequestContext) -> Result<i64, ApiError> {
    if ctx.principal.role.is_guardian_table() {
        Ok(ctx.principal.id)
    } else {
        Err(ApiError::forbidden("Only guardian accounts can view guardian data"))
    }
}
