//! Row types for the `member` and `custom_permission` tables.
//!
//! Roles, resources, actions and the `granted` flag are stored as text. They
//! are parsed into domain types here and nowhere else.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::rbac::{decode_granted, encode_granted, Role};
use crate::store::{CustomPermission, Membership, NewMembership, OverrideChange};

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::member)]
pub struct MemberRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::member)]
pub struct NewMemberRow {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::custom_permission)]
pub struct CustomPermissionRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub member_id: Uuid,
    pub resource: String,
    pub action: String,
    pub granted: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::custom_permission)]
pub struct NewCustomPermissionRow {
    pub organization_id: Uuid,
    pub member_id: Uuid,
    pub resource: String,
    pub action: String,
    pub granted: String,
}

impl From<MemberRow> for Membership {
    fn from(row: MemberRow) -> Self {
        let role = match row.role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(member_id = %row.id, error = %e, "Member has an unrecognized role");
                None
            }
        };

        Membership {
            id: row.id,
            organization_id: row.organization_id,
            user_id: row.user_id,
            role,
            created_at: row.created_at,
        }
    }
}

impl From<&NewMembership> for NewMemberRow {
    fn from(new: &NewMembership) -> Self {
        Self {
            organization_id: new.organization_id,
            user_id: new.user_id,
            role: new.role.as_str().to_string(),
        }
    }
}

impl From<&OverrideChange> for NewCustomPermissionRow {
    fn from(change: &OverrideChange) -> Self {
        Self {
            organization_id: change.organization_id,
            member_id: change.member_id,
            resource: change.resource.as_str().to_string(),
            action: change.action.as_str().to_string(),
            granted: encode_granted(change.granted).to_string(),
        }
    }
}

impl CustomPermissionRow {
    /// Converts to the domain type. Rows naming an unknown resource or action
    /// can never match a check and are skipped.
    pub fn into_domain(self) -> Option<CustomPermission> {
        let (resource, action) = match (self.resource.parse(), self.action.parse()) {
            (Ok(resource), Ok(action)) => (resource, action),
            _ => {
                warn!(
                    custom_permission_id = %self.id,
                    resource = %self.resource,
                    action = %self.action,
                    "Ignoring override with unrecognized resource or action"
                );
                return None;
            }
        };

        Some(CustomPermission {
            id: self.id,
            organization_id: self.organization_id,
            member_id: self.member_id,
            resource,
            action,
            granted: decode_granted(&self.granted),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
