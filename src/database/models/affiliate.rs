use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::types::TenantId;

/// Lifecycle of an affiliation token: `Pending` until claimed, `Active` while
/// the two schools are linked, `Removed` once either side revokes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Active,
    Removed,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Active => "active",
            LinkStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LinkStatus::Pending),
            "active" => Ok(LinkStatus::Active),
            "removed" => Ok(LinkStatus::Removed),
            other => Err(format!("unknown affiliate status '{}'", other)),
        }
    }
}

/// Raw `school_affiliates` row
#[derive(Debug, Clone, FromRow)]
pub struct AffiliateRow {
    pub id: i64,
    pub parent_school_id: TenantId,
    pub affiliate_school_id: Option<TenantId>,
    pub token: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub id: i64,
    pub parent_tenant_id: TenantId,
    pub affiliate_tenant_id: Option<TenantId>,
    pub token: String,
    pub status: LinkStatus,
    pub created_at: NaiveDateTime,
}

impl AffiliateLink {
    /// Whether `tenant_id` is one of the two schools on this link
    pub fn involves(&self, tenant_id: TenantId) -> bool {
        self.parent_tenant_id == tenant_id || self.affiliate_tenant_id == Some(tenant_id)
    }
}

impl TryFrom<AffiliateRow> for AffiliateLink {
    type Error = String;

    fn try_from(row: AffiliateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            parent_tenant_id: row.parent_school_id,
            affiliate_tenant_id: row.affiliate_school_id,
            token: row.token,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

/// Which side of a link the *other* school sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The other school joined using our token
    Affiliate,
    /// We joined the other school's token
    Parent,
}

/// The school on the other end of an active link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedSchool {
    pub link_id: i64,
    pub school_id: TenantId,
    pub name: String,
    pub email: String,
    pub address: Option<String>,
    pub relationship: Relationship,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffiliateLinks {
    /// Schools that joined as our affiliates
    pub as_parent: Vec<LinkedSchool>,
    /// Schools we are an affiliate of
    pub as_affiliate: Vec<LinkedSchool>,
}

impl AffiliateLinks {
    pub fn is_empty(&self) -> bool {
        self.as_parent.is_empty() && self.as_affiliate.is_empty()
    }
}
