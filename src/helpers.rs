//! Shared helper functions for handlers.

use axum::{http::StatusCode, Json};
use uuid::Uuid;

use crate::auth::jwt::Claims;
use crate::error::{ApiError, ApiResult};
use crate::middleware::OrganizationContext;
use crate::rbac::{Action, PermissionCheck, Resource, Role};
use crate::store::Membership;
use crate::AppState;

pub fn get_user_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid subject in token", "INVALID_TOKEN"))
}

pub fn get_organization_id(claims: &Claims) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
    let raw = claims.organization_id.as_ref().ok_or_else(|| {
        ApiError::forbidden(
            "Organization context required. Select an organization to access this resource.",
            "ORGANIZATION_CONTEXT_REQUIRED",
        )
    })?;

    Uuid::parse_str(raw).map_err(|_| {
        ApiError::bad_request("Invalid organization context", "INVALID_ORGANIZATION_CONTEXT")
    })
}

/// Fails with 403 unless the caller holds `action` on `resource`.
pub fn require_permission(
    state: &AppState,
    ctx: &OrganizationContext,
    resource: Resource,
    action: Action,
) -> ApiResult<()> {
    state.resolver.require_permission(PermissionCheck {
        user_id: ctx.user_id,
        organization_id: ctx.organization_id,
        resource,
        action,
    })?;
    Ok(())
}

/// Fails with 403 unless the caller owns the organization.
pub fn require_owner(state: &AppState, ctx: &OrganizationContext) -> ApiResult<()> {
    if state
        .resolver
        .is_organization_owner(ctx.user_id, ctx.organization_id)?
    {
        return Ok(());
    }

    tracing::warn!(
        user_id = %ctx.user_id,
        organization_id = %ctx.organization_id,
        "Owner-only operation refused"
    );
    Err(ApiError::forbidden(
        "Only organization owners can manage owners",
        "OWNER_REQUIRED",
    ))
}

/// Looks up a member of the caller's organization, 404 if there is none.
pub fn find_member(
    state: &AppState,
    ctx: &OrganizationContext,
    user_id: Uuid,
) -> ApiResult<Membership> {
    state
        .resolver
        .store()
        .find_membership(user_id, ctx.organization_id)?
        .ok_or_else(|| ApiError::not_found("Member not found", "MEMBER_NOT_FOUND"))
}

pub fn is_owner_change(current: Option<Role>, requested: Role) -> bool {
    current == Some(Role::Owner) || requested == Role::Owner
}
