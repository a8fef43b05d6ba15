//! Cross-school access control.
//!
//! Every query scoped to a school goes through [`resolve_accessible_tenant`],
//! which turns the caller's optional `school_id` selector into the school it
//! is actually allowed to read.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::database::models::TenantRecord;
use crate::directory::{DirectoryError, DirectoryStore};
use crate::types::{RequestContext, Role, TenantId};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("School {home} does not have access to school {requested}")]
    Forbidden { home: TenantId, requested: TenantId },

    #[error("{role} account {principal_id} is not attached to a school")]
    NoHomeTenant { principal_id: i64, role: Role },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Source of truth for which schools are linked
#[async_trait]
pub trait AffiliateGraph: Send + Sync {
    /// True if an active link joins `a` and `b` in either direction
    async fn has_active_link(&self, a: TenantId, b: TenantId) -> Result<bool, DirectoryError>;
}

#[async_trait]
impl AffiliateGraph for DirectoryStore {
    async fn has_active_link(&self, a: TenantId, b: TenantId) -> Result<bool, DirectoryError> {
        DirectoryStore::has_active_link(self, a, b).await
    }
}

/// A school always sees itself, and sees another school only while an
/// active link joins them. The link is symmetric once active.
pub async fn has_access<G>(graph: &G, home: TenantId, requested: TenantId) -> Result<bool, DirectoryError>
where
    G: AffiliateGraph + ?Sized,
{
    if home == requested {
        return Ok(true);
    }
    graph.has_active_link(home, requested).await
}

/// The school a request should read from.
///
/// No selector, or a selector equal to the caller's own school, yields the
/// caller's school. Any other selector is honoured only if [`has_access`]
/// grants it.
pub async fn resolve_accessible_tenant<G>(
    graph: &G,
    ctx: &RequestContext,
    requested: Option<TenantId>,
) -> Result<TenantId, AccessError>
where
    G: AffiliateGraph + ?Sized,
{
    let principal = &ctx.principal;
    let home = principal.home_tenant().ok_or(AccessError::NoHomeTenant {
        principal_id: principal.id,
        role: principal.role,
    })?;

    let requested = match requested {
        None => return Ok(home),
        Some(requested) if requested == home => return Ok(home),
        Some(requested) => requested,
    };

    if has_access(graph, home, requested).await? {
        Ok(requested)
    } else {
        warn!(
            principal_id = principal.id,
            role = %principal.role,
            home,
            requested,
            "Denied cross-school access"
        );
        Err(AccessError::Forbidden { home, requested })
    }
}

/// Move the caller's working context to `school_id`, which must be its own
/// school or an actively linked one.
pub async fn switch_school(
    directory: &DirectoryStore,
    ctx: &RequestContext,
    school_id: TenantId,
) -> Result<TenantRecord, AccessError> {
    let school_id = resolve_accessible_tenant(directory, ctx, Some(school_id)).await?;
    let school = directory.require_school(school_id).await?;
    info!(principal_id = ctx.principal.id, school_id, "Switched school context");
    Ok(school)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Principal;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory graph that records how often it was consulted
    #[derive(Default)]
    struct Links {
        active: HashSet<(TenantId, TenantId)>,
        lookups: Mutex<usize>,
    }

    impl Links {
        fn with(pairs: &[(TenantId, TenantId)]) -> Self {
            Self {
                active: pairs.iter().copied().collect(),
                lookups: Mutex::new(0),
            }
        }

        fn lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl AffiliateGraph for Links {
        async fn has_active_link(&self, a: TenantId, b: TenantId) -> Result<bool, DirectoryError> {
            *self.lookups.lock().unwrap() += 1;
            Ok(self.active.contains(&(a, b)) || self.active.contains(&(b, a)))
        }
    }

    fn admin(id: TenantId) -> RequestContext {
        RequestContext::new(Principal {
            id,
            email: format!("school{}@example.com", id),
            name: None,
            role: Role::SchoolAdmin,
            school_id: None,
        })
    }

    #[tokio::test]
    async fn own_school_needs_no_lookup() {
        let links = Links::default();
        for t in [1, 20, 999] {
            assert_eq!(resolve_accessible_tenant(&links, &admin(t), None).await.unwrap(), t);
            assert_eq!(resolve_accessible_tenant(&links, &admin(t), Some(t)).await.unwrap(), t);
            assert!(has_access(&links, t, t).await.unwrap());
        }
        assert_eq!(links.lookups(), 0);
    }

    #[tokio::test]
    async fn unlinked_schools_are_denied_both_ways() {
        let links = Links::with(&[(20, 21)]);
        assert!(!has_access(&links, 20, 22).await.unwrap());
        assert!(!has_access(&links, 22, 20).await.unwrap());
    }

    #[tokio::test]
    async fn active_link_grants_both_ways() {
        let links = Links::with(&[(20, 21)]);
        assert!(has_access(&links, 20, 21).await.unwrap());
        assert!(has_access(&links, 21, 20).await.unwrap());
        assert_eq!(resolve_accessible_tenant(&links, &admin(21), Some(20)).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn denial_carries_both_ids() {
        let links = Links::with(&[(20, 21)]);
        let err = resolve_accessible_tenant(&links, &admin(22), Some(20)).await.unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { home: 22, requested: 20 }));
    }

    #[tokio::test]
    async fn teacher_uses_assigned_school() {
        let links = Links::with(&[(20, 21)]);
        let ctx = RequestContext::new(Principal {
            id: 7,
            email: "prof@example.com".to_string(),
            name: None,
            role: Role::Teacher,
            school_id: Some(21),
        });
        assert_eq!(resolve_accessible_tenant(&links, &ctx, None).await.unwrap(), 21);
        assert_eq!(resolve_accessible_tenant(&links, &ctx, Some(20)).await.unwrap(), 20);
        assert!(resolve_accessible_tenant(&links, &ctx, Some(7)).await.is_err());
    }

    #[tokio::test]
    async fn tenant_less_principals_are_rejected() {
        let links = Links::default();
        for role in [Role::Guardian, Role::Employee, Role::SuperAdmin] {
            let ctx = RequestContext::new(Principal {
                id: 3,
                email: "x@example.com".to_string(),
                name: None,
                role,
                school_id: None,
            });
            let err = resolve_accessible_tenant(&links, &ctx, Some(20)).await.unwrap_err();
            assert!(matches!(err, AccessError::NoHomeTenant { principal_id: 3, .. }));
        }
    }
}
