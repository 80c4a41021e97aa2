//! Organization member management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    helpers::{find_member, is_owner_change, require_owner, require_permission},
    middleware::OrganizationContext,
    pagination::{PaginationMeta, PaginationParams},
    rbac::{Action, EffectivePermissions, Resource, Role},
    store::{CustomPermission, Membership, NewMembership, StoreError},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[schema(example = "member")]
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[schema(example = "admin")]
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembersListResponse {
    pub data: Vec<Membership>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberRoleResponse {
    pub user_id: Uuid,
    /// `null` when the user is not a member.
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberPermissionsResponse {
    pub user_id: Uuid,
    /// `null` when the stored role is unrecognized.
    pub role: Option<Role>,
    #[schema(value_type = Object)]
    pub role_permissions: EffectivePermissions,
    pub overrides: Vec<CustomPermission>,
    #[schema(value_type = Object)]
    pub effective_permissions: EffectivePermissions,
}

#[utoipa::path(
    get,
    path = "/members",
    tag = "Members",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of members", body = MembersListResponse),
        (status = 403, description = "Missing member:read", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<MembersListResponse>> {
    require_permission(&state, &ctx, Resource::Member, Action::Read)?;

    let (data, total_count) = state.resolver.store().list_members(
        ctx.organization_id,
        pagination.limit(),
        pagination.offset(),
    )?;

    Ok(Json(MembersListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/members",
    tag = "Members",
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = Membership),
        (
            status = 403,
            description = "Missing member:create, or non-owner adding an owner",
            body = ApiError
        ),
        (status = 409, description = "User is already a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Json(payload): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    require_permission(&state, &ctx, Resource::Member, Action::Create)?;
    if payload.role == Role::Owner {
        require_owner(&state, &ctx)?;
    }

    let membership = state
        .resolver
        .store()
        .add_member(NewMembership {
            organization_id: ctx.organization_id,
            user_id: payload.user_id,
            role: payload.role,
        })
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::conflict(
                "User is already a member of this organization",
                "ALREADY_MEMBER",
            ),
            other => other.into(),
        })?;

    info!(
        user_id = %membership.user_id,
        organization_id = %membership.organization_id,
        role = ?membership.role,
        added_by = %ctx.user_id,
        "Added member to organization"
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

#[utoipa::path(
    get,
    path = "/members/{user_id}/role",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "The user's role, or null", body = MemberRoleResponse),
        (status = 403, description = "Missing member:read", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_member_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MemberRoleResponse>> {
    require_permission(&state, &ctx, Resource::Member, Action::Read)?;

    let role = state
        .resolver
        .get_user_role(user_id, ctx.organization_id)?;

    Ok(Json(MemberRoleResponse { user_id, role }))
}

#[utoipa::path(
    put,
    path = "/members/{user_id}/role",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Membership),
        (
            status = 403,
            description = "Missing member:update, or non-owner owner change",
            body = ApiError
        ),
        (status = 404, description = "Not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<Membership>> {
    require_permission(&state, &ctx, Resource::Member, Action::Update)?;

    let target = find_member(&state, &ctx, user_id)?;
    if is_owner_change(target.role, payload.role) {
        require_owner(&state, &ctx)?;
    }

    let updated = state
        .resolver
        .store()
        .update_member_role(target.id, payload.role)?
        .ok_or_else(|| ApiError::not_found("Member not found", "MEMBER_NOT_FOUND"))?;

    info!(
        user_id = %user_id,
        organization_id = %ctx.organization_id,
        from = ?target.role,
        to = ?updated.role,
        changed_by = %ctx.user_id,
        "Changed member role"
    );

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/members/{user_id}",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Member removed"),
        (
            status = 403,
            description = "Missing member:delete, or non-owner owner removal",
            body = ApiError
        ),
        (status = 404, description = "Not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state, &ctx, Resource::Member, Action::Delete)?;

    let target = find_member(&state, &ctx, user_id)?;
    if target.role == Some(Role::Owner) {
        require_owner(&state, &ctx)?;
    }

    if !state.resolver.store().remove_member(target.id)? {
        return Err(ApiError::not_found("Member not found", "MEMBER_NOT_FOUND"));
    }

    info!(
        user_id = %user_id,
        organization_id = %ctx.organization_id,
        removed_by = %ctx.user_id,
        "Removed member from organization"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/members/{user_id}/permissions",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (
            status = 200,
            description = "Role defaults, overrides and the effective result",
            body = MemberPermissionsResponse
        ),
        (status = 403, description = "Missing member:read", body = ApiError),
        (status = 404, description = "Not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_member_permissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MemberPermissionsResponse>> {
    require_permission(&state, &ctx, Resource::Member, Action::Read)?;

    let target = find_member(&state, &ctx, user_id)?;
    let overrides = state.resolver.store().list_custom_permissions(target.id)?;
    let effective_permissions = state
        .resolver
        .get_user_permissions(user_id, ctx.organization_id)?;

    Ok(Json(MemberPermissionsResponse {
        user_id,
        role: target.role,
        role_permissions: state.resolver.table().member_permissions(target.role),
        overrides,
        effective_permissions,
    }))
}
