//! PostgreSQL store on a diesel r2d2 pool.

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{CustomPermissionRow, MemberRow, NewCustomPermissionRow, NewMemberRow};
use crate::rbac::{encode_granted, Action, Resource, Role};
use crate::schema::{custom_permission, member};
use crate::DbPool;

use super::{
    CustomPermission, Membership, NewMembership, OverrideChange, PermissionStore, StoreError,
};

type PooledConn =
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<diesel::PgConnection>>;

#[derive(Clone)]
pub struct PgPermissionStore {
    pool: DbPool,
}

impl PgPermissionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn conn(&self) -> Result<PooledConn, StoreError> {
        self.pool.get().map_err(|e| {
            error!(error = %e, "Database connection error");
            StoreError::from(e)
        })
    }
}

fn latest_override(
    conn: &mut PgConnection,
    member_id: Uuid,
    resource: Resource,
    action: Action,
) -> QueryResult<Option<CustomPermissionRow>> {
    custom_permission::table
        .filter(custom_permission::member_id.eq(member_id))
        .filter(custom_permission::resource.eq(resource.as_str()))
        .filter(custom_permission::action.eq(action.as_str()))
        .order((
            custom_permission::updated_at.desc(),
            custom_permission::created_at.desc(),
        ))
        .select(CustomPermissionRow::as_select())
        .first(conn)
        .optional()
}

fn override_from_row(row: CustomPermissionRow) -> Result<CustomPermission, StoreError> {
    let id = row.id;
    row.into_domain()
        .ok_or_else(|| StoreError::InvalidData(format!("custom permission {id} is malformed")))
}

impl PermissionStore for PgPermissionStore {
    fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut conn = self.conn()?;

        Ok(member::table
            .filter(member::user_id.eq(user_id))
            .filter(member::organization_id.eq(organization_id))
            .select(MemberRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Membership::from))
    }

    fn list_members(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Membership>, i64), StoreError> {
        let mut conn = self.conn()?;

        let total_count: i64 = member::table
            .filter(member::organization_id.eq(organization_id))
            .count()
            .get_result(&mut conn)?;

        let rows: Vec<MemberRow> = member::table
            .filter(member::organization_id.eq(organization_id))
            .order((member::created_at.asc(), member::id.asc()))
            .limit(limit)
            .offset(offset)
            .select(MemberRow::as_select())
            .load(&mut conn)?;

        Ok((rows.into_iter().map(Membership::from).collect(), total_count))
    }

    fn add_member(&self, new: NewMembership) -> Result<Membership, StoreError> {
        let mut conn = self.conn()?;

        let existing: Option<Uuid> = member::table
            .filter(member::organization_id.eq(new.organization_id))
            .filter(member::user_id.eq(new.user_id))
            .select(member::id)
            .first(&mut conn)
            .optional()?;

        if existing.is_some() {
            return Err(StoreError::Conflict(
                "user is already a member of this organization".to_string(),
            ));
        }

        let row: MemberRow = diesel::insert_into(member::table)
            .values(&NewMemberRow::from(&new))
            .returning(MemberRow::as_returning())
            .get_result(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    StoreError::Conflict(
                        "user is already a member of this organization".to_string(),
                    )
                }
                other => StoreError::Query(other),
            })?;

        info!(
            member_id = %row.id,
            user_id = %row.user_id,
            organization_id = %row.organization_id,
            role = %row.role,
            "Inserted member"
        );
        Ok(Membership::from(row))
    }

    fn update_member_role(
        &self,
        member_id: Uuid,
        role: Role,
    ) -> Result<Option<Membership>, StoreError> {
        let mut conn = self.conn()?;

        Ok(diesel::update(member::table.filter(member::id.eq(member_id)))
            .set(member::role.eq(role.as_str()))
            .returning(MemberRow::as_returning())
            .get_result(&mut conn)
            .optional()?
            .map(Membership::from))
    }

    fn remove_member(&self, member_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;

        let deleted = conn.transaction::<_, DieselError, _>(|conn| {
            let overrides = diesel::delete(
                custom_permission::table.filter(custom_permission::member_id.eq(member_id)),
            )
            .execute(conn)?;

            let members =
                diesel::delete(member::table.filter(member::id.eq(member_id))).execute(conn)?;

            if members > 0 {
                info!(member_id = %member_id, overrides_removed = overrides, "Deleted member");
            }
            Ok(members > 0)
        })?;

        Ok(deleted)
    }

    fn find_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<Option<CustomPermission>, StoreError> {
        let mut conn = self.conn()?;

        // The filter pins resource and action to known tags, so conversion
        // cannot drop the row.
        Ok(latest_override(&mut conn, member_id, resource, action)?
            .and_then(CustomPermissionRow::into_domain))
    }

    fn list_custom_permissions(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<CustomPermission>, StoreError> {
        let mut conn = self.conn()?;

        let rows: Vec<CustomPermissionRow> = custom_permission::table
            .filter(custom_permission::member_id.eq(member_id))
            .order((
                custom_permission::updated_at.asc(),
                custom_permission::created_at.asc(),
            ))
            .select(CustomPermissionRow::as_select())
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .filter_map(CustomPermissionRow::into_domain)
            .collect())
    }

    fn set_custom_permission(
        &self,
        change: OverrideChange,
    ) -> Result<CustomPermission, StoreError> {
        let mut conn = self.conn()?;

        let row = conn.transaction::<_, DieselError, _>(|conn| {
            let existing = latest_override(conn, change.member_id, change.resource, change.action)?;

            match existing {
                Some(current) => diesel::update(
                    custom_permission::table.filter(custom_permission::id.eq(current.id)),
                )
                .set((
                    custom_permission::granted.eq(encode_granted(change.granted)),
                    custom_permission::updated_at.eq(diesel::dsl::now),
                ))
                .returning(CustomPermissionRow::as_returning())
                .get_result(conn),
                None => diesel::insert_into(custom_permission::table)
                    .values(&NewCustomPermissionRow::from(&change))
                    .returning(CustomPermissionRow::as_returning())
                    .get_result(conn),
            }
        })?;

        override_from_row(row)
    }

    fn remove_custom_permission(
        &self,
        member_id: Uuid,
        resource: Resource,
        action: Action,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            custom_permission::table
                .filter(custom_permission::member_id.eq(member_id))
                .filter(custom_permission::resource.eq(resource.as_str()))
                .filter(custom_permission::action.eq(action.as_str())),
        )
        .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}
