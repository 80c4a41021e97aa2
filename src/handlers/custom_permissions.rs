//! Per-member permission override handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    helpers::{find_member, require_permission},
    middleware::OrganizationContext,
    rbac::{Action, Resource},
    store::{CustomPermission, OverrideChange},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetCustomPermissionRequest {
    pub user_id: Uuid,
    #[schema(example = "billing")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    #[schema(example = true)]
    pub granted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomPermissionsResponse {
    pub user_id: Uuid,
    pub data: Vec<CustomPermission>,
}

fn parse_tags(resource: &str, action: &str) -> ApiResult<(Resource, Action)> {
    let resource = resource.parse::<Resource>().map_err(|e| {
        ApiError::bad_request(e.to_string(), "UNKNOWN_RESOURCE")
    })?;
    let action = action
        .parse::<Action>()
        .map_err(|e| ApiError::bad_request(e.to_string(), "UNKNOWN_ACTION"))?;
    Ok((resource, action))
}

#[utoipa::path(
    post,
    path = "/custom-permissions",
    tag = "Custom Permissions",
    request_body = SetCustomPermissionRequest,
    responses(
        (status = 200, description = "Override stored", body = CustomPermission),
        (status = 400, description = "Unknown resource or action", body = ApiError),
        (status = 403, description = "Missing member:update", body = ApiError),
        (status = 404, description = "Not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_custom_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Json(payload): Json<SetCustomPermissionRequest>,
) -> ApiResult<Json<CustomPermission>> {
    require_permission(&state, &ctx, Resource::Member, Action::Update)?;

    let (resource, action) = parse_tags(&payload.resource, &payload.action)?;
    let target = find_member(&state, &ctx, payload.user_id)?;

    let stored = state
        .resolver
        .store()
        .set_custom_permission(OverrideChange {
            organization_id: ctx.organization_id,
            member_id: target.id,
            resource,
            action,
            granted: payload.granted,
        })?;

    info!(
        user_id = %payload.user_id,
        organization_id = %ctx.organization_id,
        resource = %resource,
        action = %action,
        granted = stored.granted,
        changed_by = %ctx.user_id,
        "Set custom permission"
    );

    Ok(Json(stored))
}

#[utoipa::path(
    get,
    path = "/custom-permissions/{user_id}",
    tag = "Custom Permissions",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Overrides, oldest first", body = CustomPermissionsResponse),
        (status = 403, description = "Missing member:read", body = ApiError),
        (status = 404, description = "Not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_custom_permissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<CustomPermissionsResponse>> {
    require_permission(&state, &ctx, Resource::Member, Action::Read)?;

    let target = find_member(&state, &ctx, user_id)?;
    let data = state.resolver.store().list_custom_permissions(target.id)?;

    Ok(Json(CustomPermissionsResponse { user_id, data }))
}

#[utoipa::path(
    delete,
    path = "/custom-permissions/{user_id}/{resource}/{action}",
    tag = "Custom Permissions",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("resource" = String, Path, description = "Resource tag"),
        ("action" = String, Path, description = "Action tag")
    ),
    responses(
        (status = 204, description = "Override removed, or there was none"),
        (status = 400, description = "Unknown resource or action", body = ApiError),
        (status = 403, description = "Missing member:update", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_custom_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Path((user_id, resource, action)): Path<(Uuid, String, String)>,
) -> ApiResult<StatusCode> {
    require_permission(&state, &ctx, Resource::Member, Action::Update)?;

    let (resource, action) = parse_tags(&resource, &action)?;

    let Some(target) = state
        .resolver
        .store()
        .find_membership(user_id, ctx.organization_id)?
    else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if state
        .resolver
        .store()
        .remove_custom_permission(target.id, resource, action)?
    {
        info!(
            user_id = %user_id,
            organization_id = %ctx.organization_id,
            resource = %resource,
            action = %action,
            removed_by = %ctx.user_id,
            "Removed custom permission"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
