//! In-process store used by tests and embedders.
//!
//! Rows are kept in their encoded form, so unknown roles, malformed `granted`
//! values or duplicate tuples can be seeded with
//! [`MemoryPermissionStore::insert_raw_member`] and
//! [`MemoryPermissionStore::insert_raw_override`].

use chrono::NaiveDateTime;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::{CustomPermissionRow, MemberRow};
use crate::rbac::{encode_granted, Action, Resource, Role};

use super::{
    CustomPermission, Membership, NewMembership, OverrideChange, PermissionStore, StoreError,
};

/// A member row exactly as it would sit in the database.
#[derive(Debug, Clone)]
pub struct RawMember {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

/// An override row exactly as it would sit in the database.
#[derive(Debug, Clone)]
pub struct RawOverride {
    pub organization_id: Uuid,
    pub member_id: Uuid,
    pub resource: String,
    pub action: String,
    pub granted: String,
}

#[derive(Debug, Clone)]
struct StoredOverride {
    row: CustomPermissionRow,
    // Insertion/update sequence; breaks timestamp ties.
    seq: u64,
}

impl StoredOverride {
    fn matches(&self, member_id: Uuid, resource: Resource, action: Action) -> bool {
        self.row.member_id == member_id
            && self.row.resource == resource.as_str()
            && self.row.action == action.as_str()
    }

    fn recency(&self) -> (NaiveDateTime, NaiveDateTime, u64) {
        (self.row.updated_at, self.row.created_at, self.seq)
    }
}

#[derive(Debug, Default)]
struct Tables {
    members: Vec<MemberRow>,
    overrides: Vec<StoredOverride>,
    seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    tables: RwLock<Tables>,
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Inserts a member row without validating its role.
    pub fn insert_raw_member(&self, raw: RawMember) -> Result<Uuid, StoreError> {
        let mut tables = self.write()?;
        let id = Uuid::new_v4();

        tables.members.push(MemberRow {
            id,
            organization_id: raw.organization_id,
            user_id: raw.user_id,
            role: raw.role,
            created_at: now(),
        });

        Ok(id)
    }

    /// Inserts an override row without validating or deduplicating it.
    pub fn insert_raw_override(&self, raw: RawOverride) -> Result<Uuid, StoreError> {
        let mut tables = self.write()?;
        let seq = tables.next_seq();
        let timestamp = now();
        let id = Uuid::new_v4();

        tables.overrides.push(StoredOverride {
            row: CustomPermissionRow {
                id,
                organization_id: raw.organization_id,
                member_id: raw.member_id,
                resource: raw.resource,
                action: raw.action,
                granted: raw.granted,
                created_at: timestamp,
                updated_at: timestamp,
            },
            seq,
        });

        Ok(id)
    }

    /// Number of override rows held for a member, malformed ones included.
    pub fn override_row_count(&self, member_id: Uuid) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .overrides
            .iter()
            .filter(|o| o.row.member_id == member_id)
            .count())
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .read()?
            .members
            .iter()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned()
            .map(Membership::from))
    }

    fn list_members(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Membership>, i64), StoreError> {
        let tables = self.read()?;
        let all: Vec<&MemberRow> = tables
            .members
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .collect();

        let page: Vec<Membership> = all
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|row| Membership::from((*row).clone()))
            .collect();

        Ok((page, all.len() as i64))
    }

    fn add_member(&self, new: NewMembership) -> Result<Membership, StoreError> {
        let mut tables = self.write()?;

        if tables
            .members
            .iter()
            .any(|m| m.user_id == new.user_id && m.organization_id == new.organization_id)
        {
            return Err(StoreError::Conflict(
                "user is already a member of this organization".to_string(),
            ));
        }

        let row = MemberRow {
            id: Uuid::new_v4(),
            organization_id: new.organization_id,
            user_id: new.user_id,
            role: new.role.as_str().to_string(),
            created_at: now(),
        };
        tables.members.push(row.clone());

        Ok(Membership::from(row))
    }

    fn update_member_role(
        &self,
        member_id: Uuid,
        role: Role,
    ) -> Result<Option<Membership>, StoreError> {
        let mut tables = self.write()?;

        Ok(tables
            .members
            .iter_mut()
            .find(|m| m.id == member_id)
            .map(|row| {
                row.role = role.as_str().to_string();
                Membership::from(row.clone())
            }))
    }

    fn remove_member(&self, member_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write()?;

        let before = tables.members.len();
        tables.members.retain(|m| m.id != member_id);
        let removed = tables.members.len() != before;

        tables.overrides.retain(|o| o.row.member_id != member_id);

        Ok(removed)
    }

    fn find_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<Option<CustomPermission>, StoreError> {
        Ok(self
            .read()?
            .overrides
            .iter()
            .filter(|o| o.matches(member_id, resource, action))
            .max_by_key(|o| o.recency())
            .and_then(|o| o.row.clone().into_domain()))
    }

    fn list_custom_permissions(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<CustomPermission>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<&StoredOverride> = tables
            .overrides
            .iter()
            .filter(|o| o.row.member_id == member_id)
            .collect();
        rows.sort_by_key(|o| o.recency());

        Ok(rows
            .into_iter()
            .filter_map(|o| o.row.clone().into_domain())
            .collect())
    }

    fn set_custom_permission(
        &self,
        change: OverrideChange,
    ) -> Result<CustomPermission, StoreError> {
        let mut tables = self.write()?;
        let seq = tables.next_seq();
        let timestamp = now();

        let latest = tables
            .overrides
            .iter_mut()
            .filter(|o| o.matches(change.member_id, change.resource, change.action))
            .max_by_key(|o| o.recency());

        let row = match latest {
            Some(existing) => {
                existing.row.granted = encode_granted(change.granted).to_string();
                existing.row.updated_at = timestamp;
                existing.seq = seq;
                existing.row.clone()
            }
            None => {
                let row = CustomPermissionRow {
                    id: Uuid::new_v4(),
                    organization_id: change.organization_id,
                    member_id: change.member_id,
                    resource: change.resource.as_str().to_string(),
                    action: change.action.as_str().to_string(),
                    granted: encode_granted(change.granted).to_string(),
                    created_at: timestamp,
                    updated_at: timestamp,
                };
                tables.overrides.push(StoredOverride {
                    row: row.clone(),
                    seq,
                });
                row
            }
        };

        let id = row.id;
        row.into_domain()
            .ok_or_else(|| StoreError::InvalidData(format!("custom permission {id} is malformed")))
    }

    fn remove_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;

        let before = tables.overrides.len();
        tables
            .overrides
            .retain(|o| !o.matches(member_id, resource, action));

        Ok(tables.overrides.len() != before)
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}
