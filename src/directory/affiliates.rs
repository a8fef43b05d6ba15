//! Affiliation tokens and links between schools.

use rand::rngs::OsRng;
use rand::Rng;
use tracing::{info, warn};

use super::{DirectoryError, DirectoryStore, Missing};
use crate::database::models::affiliate::AffiliateRow;
use crate::database::models::{AffiliateLink, AffiliateLinks, LinkStatus, LinkedSchool, Relationship};
use crate::types::TenantId;

pub const TOKEN_LENGTH: usize = 12;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random `[A-Z0-9]{12}` token drawn from the operating system CSPRNG
pub fn generate_token() -> String {
    let mut rng = OsRng;
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Tokens are typed by people; accept surrounding whitespace and lowercase
pub fn normalize_token(token: &str) -> String {
    token.trim().to_uppercase()
}

const LINK_COLUMNS: &str = "id, parent_school_id, affiliate_school_id, token, status, created_at";

fn to_link(row: AffiliateRow) -> Result<AffiliateLink, DirectoryError> {
    AffiliateLink::try_from(row).map_err(DirectoryError::InvalidRecord)
}

impl DirectoryStore {
    /// Issue a pending token that another school can claim to become an
    /// affiliate of `parent`.
    ///
    /// Uniqueness is enforced by the table constraint. A collision surfaces
    /// as an insert error rather than being retried.
    pub async fn create_affiliate_token(&self, parent: TenantId) -> Result<AffiliateLink, DirectoryError> {
        self.issue_token(parent, &generate_token()).await
    }

    /// Store a pending token with a known value.
    ///
    /// This is a seeding entry point, for tokens carried over from an earlier
    /// deployment and for fixtures. It still enforces the token format but the
    /// value is not random, so nothing user-facing calls it; live tokens come
    /// from `create_affiliate_token`.
    pub async fn issue_token(&self, parent: TenantId, token: &str) -> Result<AffiliateLink, DirectoryError> {
        self.require_school(parent).await?;
        let token = normalize_token(token);
        if token.len() != TOKEN_LENGTH || !token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)) {
            return Err(DirectoryError::Invalid(format!(
                "token must be {} characters of A-Z and 0-9",
                TOKEN_LENGTH
            )));
        }

        let row: AffiliateRow = sqlx::query_as(&format!(
            "INSERT INTO school_affiliates (parent_school_id, token, status) VALUES (?1, ?2, 'pending') RETURNING {}",
            LINK_COLUMNS
        ))
        .bind(parent)
        .bind(&token)
        .fetch_one(self.pool())
        .await?;

        info!(school_id = parent, link_id = row.id, "Generated affiliate token");
        to_link(row)
    }

    /// Claim a pending token on behalf of `claimer`, activating the link.
    pub async fn claim_token(&self, token: &str, claimer: TenantId) -> Result<AffiliateLink, DirectoryError> {
        let token = normalize_token(token);
        if token.is_empty() {
            return Err(DirectoryError::Invalid("token is required".to_string()));
        }

        let link = self
            .find_link_by_token(&token)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(Missing::Token(token.clone())))?;

        if link.status != LinkStatus::Pending {
            return Err(DirectoryError::AlreadyUsed);
        }
        if link.parent_tenant_id == claimer {
            return Err(DirectoryError::SelfLink(claimer));
        }
        if self.has_active_link(link.parent_tenant_id, claimer).await? {
            return Err(DirectoryError::AlreadyLinked(link.parent_tenant_id, claimer));
        }
        self.require_school(claimer).await?;

        // Both preconditions are re-checked inside the UPDATE so two concurrent
        // claims cannot both win.
        let claimed: Option<AffiliateRow> = sqlx::query_as(&format!(
            r#"
            UPDATE school_affiliates
            SET affiliate_school_id = ?1, status = 'active'
            WHERE id = ?2
              AND status = 'pending'
              AND NOT EXISTS (
                  SELECT 1 FROM school_affiliates
                  WHERE status = 'active'
                    AND ((parent_school_id = ?3 AND affiliate_school_id = ?1)
                      OR (parent_school_id = ?1 AND affiliate_school_id = ?3))
              )
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(claimer)
        .bind(link.id)
        .bind(link.parent_tenant_id)
        .fetch_optional(self.pool())
        .await?;

        match claimed {
            Some(row) => {
                info!(
                    link_id = row.id,
                    parent = row.parent_school_id,
                    affiliate = claimer,
                    "School joined as affiliate"
                );
                to_link(row)
            }
            None => {
                warn!(link_id = link.id, claimer, "Lost race claiming affiliate token");
                match self.find_link_by_token(&token).await? {
                    Some(current) if current.status != LinkStatus::Pending => Err(DirectoryError::AlreadyUsed),
                    _ => Err(DirectoryError::AlreadyLinked(link.parent_tenant_id, claimer)),
                }
            }
        }
    }

    pub async fn find_link_by_token(&self, token: &str) -> Result<Option<AffiliateLink>, DirectoryError> {
        let row: Option<AffiliateRow> = sqlx::query_as(&format!(
            "SELECT {} FROM school_affiliates WHERE token = ?1",
            LINK_COLUMNS
        ))
        .bind(token)
        .fetch_optional(self.pool())
        .await?;
        row.map(to_link).transpose()
    }

    pub async fn get_link(&self, id: i64) -> Result<Option<AffiliateLink>, DirectoryError> {
        let row: Option<AffiliateRow> = sqlx::query_as(&format!(
            "SELECT {} FROM school_affiliates WHERE id = ?1",
            LINK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(to_link).transpose()
    }

    /// True if an active link joins `a` and `b`, in either direction
    pub async fn has_active_link(&self, a: TenantId, b: TenantId) -> Result<bool, DirectoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM school_affiliates
            WHERE status = 'active'
              AND ((parent_school_id = ?1 AND affiliate_school_id = ?2)
                OR (parent_school_id = ?2 AND affiliate_school_id = ?1))
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    /// Active links of `tenant`, split by which side it is on
    pub async fn list_links(&self, tenant: TenantId) -> Result<AffiliateLinks, DirectoryError> {
        let as_parent = self.linked_schools(tenant, Relationship::Affiliate).await?;
        let as_affiliate = self.linked_schools(tenant, Relationship::Parent).await?;
        Ok(AffiliateLinks { as_parent, as_affiliate })
    }

    async fn linked_schools(
        &self,
        tenant: TenantId,
        relationship: Relationship,
    ) -> Result<Vec<LinkedSchool>, DirectoryError> {
        // `relationship` is the role of the other school
        let (own_column, other_column) = match relationship {
            Relationship::Affiliate => ("parent_school_id", "affiliate_school_id"),
            Relationship::Parent => ("affiliate_school_id", "parent_school_id"),
        };

        let rows: Vec<(i64, TenantId, String, String, Option<String>, chrono::NaiveDateTime)> =
            sqlx::query_as(&format!(
                r#"
                SELECT sa.id, s.id, s.name, s.email, s.address, sa.created_at
                FROM school_affiliates sa
                JOIN schools s ON s.id = sa.{other}
                WHERE sa.{own} = ?1 AND sa.status = 'active'
                ORDER BY sa.id
                "#,
                own = own_column,
                other = other_column
            ))
            .bind(tenant)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(link_id, school_id, name, email, address, created_at)| LinkedSchool {
                link_id,
                school_id,
                name,
                email,
                address,
                relationship,
                created_at,
            })
            .collect())
    }

    /// Mark a link removed. Only the two schools on the link may do so; to
    /// anyone else the link does not exist.
    pub async fn revoke_link(&self, link_id: i64, requester: TenantId) -> Result<AffiliateLink, DirectoryError> {
        let link = self
            .get_link(link_id)
            .await?
            .filter(|link| link.involves(requester))
            .ok_or(DirectoryError::NotFound(Missing::Link(link_id)))?;

        if link.status == LinkStatus::Removed {
            return Ok(link);
        }

        let row: AffiliateRow = sqlx::query_as(&format!(
            "UPDATE school_affiliates SET status = 'removed' WHERE id = ?1 RETURNING {}",
            LINK_COLUMNS
        ))
        .bind(link_id)
        .fetch_one(self.pool())
        .await?;

        info!(link_id, requester, "Affiliate link removed");
        to_link(row)
    }
}
