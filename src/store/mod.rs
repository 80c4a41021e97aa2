//! Membership and override persistence.
//!
//! The resolver only ever talks to a [`PermissionStore`]. Every call reads the
//! current rows; nothing is cached between calls.

pub mod memory;
pub mod postgres;

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rbac::{Action, Resource, Role};

pub use memory::MemoryPermissionStore;
pub use postgres::PgPermissionStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Membership {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    /// `None` when the stored role is not one this service knows. Such a
    /// member has no role table entries; only their overrides apply.
    pub role: Option<Role>,
    pub created_at: NaiveDateTime,
}

/// A per-member grant or revoke for a single resource and action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CustomPermission {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub member_id: Uuid,
    pub resource: Resource,
    pub action: Action,
    pub granted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMembership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct OverrideChange {
    pub organization_id: Uuid,
    pub member_id: Uuid,
    pub resource: Resource,
    pub action: Action,
    pub granted: bool,
}

pub trait PermissionStore: Send + Sync {
    fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    /// Returns one page of the organization's members and the total count.
    fn list_members(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Membership>, i64), StoreError>;

    /// Fails with [`StoreError::Conflict`] if the user is already a member.
    fn add_member(&self, new: NewMembership) -> Result<Membership, StoreError>;

    fn update_member_role(
        &self,
        member_id: Uuid,
        role: Role,
    ) -> Result<Option<Membership>, StoreError>;

    /// Deletes the membership together with all of its overrides.
    fn remove_member(&self, member_id: Uuid) -> Result<bool, StoreError>;

    /// The authoritative override for the tuple. When duplicate rows exist
    /// the most recently updated one wins.
    fn find_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<Option<CustomPermission>, StoreError>;

    /// All overrides for the member, oldest first.
    fn list_custom_permissions(&self, member_id: Uuid)
        -> Result<Vec<CustomPermission>, StoreError>;

    /// Updates the authoritative row for the tuple, or inserts one.
    fn set_custom_permission(&self, change: OverrideChange)
        -> Result<CustomPermission, StoreError>;

    /// Removes every row for the tuple. Returns whether anything was removed.
    fn remove_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<bool, StoreError>;

    fn ping(&self) -> Result<(), StoreError>;
}
