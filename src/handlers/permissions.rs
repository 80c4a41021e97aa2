//! Permission check handlers.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    helpers::require_permission,
    middleware::OrganizationContext,
    rbac::{Action, DecisionReason, EffectivePermissions, Resource, Role},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckPermissionRequest {
    /// Defaults to the caller.
    pub user_id: Option<Uuid>,
    #[schema(example = "api_key")]
    pub resource: String,
    #[schema(example = "create")]
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPermissionResponse {
    pub user_id: Uuid,
    #[schema(example = "api_key")]
    pub resource: String,
    #[schema(example = "create")]
    pub action: String,
    pub allowed: bool,
    pub reason: DecisionReason,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionQuery {
    #[schema(example = "billing")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckPermissionsBulkRequest {
    pub user_id: Option<Uuid>,
    pub checks: Vec<PermissionQuery>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkPermissionResult {
    pub resource: String,
    pub action: String,
    pub allowed: bool,
    pub reason: DecisionReason,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPermissionsBulkResponse {
    pub user_id: Uuid,
    pub results: Vec<BulkPermissionResult>,
    pub all_allowed: bool,
    /// `resource:action` pairs that were denied.
    #[schema(example = json!(["billing:update"]))]
    pub denied: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyPermissionsResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    /// `null` when the stored role is unrecognized; overrides still apply.
    pub role: Option<Role>,
    #[schema(value_type = Object, example = json!({"billing": ["read"], "member": ["read"]}))]
    pub permissions: EffectivePermissions,
}

/// Checking someone else's permissions discloses their access, which needs
/// `member:read`.
fn resolve_target(
    state: &AppState,
    ctx: &OrganizationContext,
    requested: Option<Uuid>,
) -> ApiResult<Uuid> {
    match requested {
        Some(user_id) if user_id != ctx.user_id => {
            require_permission(state, ctx, Resource::Member, Action::Read)?;
            Ok(user_id)
        }
        _ => Ok(ctx.user_id),
    }
}

#[utoipa::path(
    post,
    path = "/permissions/check",
    tag = "Permissions",
    request_body = CheckPermissionRequest,
    responses(
        (status = 200, description = "Permission check result", body = CheckPermissionResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Missing member:read or org context", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Json(payload): Json<CheckPermissionRequest>,
) -> ApiResult<Json<CheckPermissionResponse>> {
    let user_id = resolve_target(&state, &ctx, payload.user_id)?;

    let decision = state.resolver.check_raw(
        user_id,
        ctx.organization_id,
        &payload.resource,
        &payload.action,
    )?;

    Ok(Json(CheckPermissionResponse {
        user_id,
        resource: payload.resource,
        action: payload.action,
        allowed: decision.allowed,
        reason: decision.reason,
    }))
}

#[utoipa::path(
    post,
    path = "/permissions/check-bulk",
    tag = "Permissions",
    request_body = CheckPermissionsBulkRequest,
    responses(
        (status = 200, description = "Bulk check results", body = CheckPermissionsBulkResponse),
        (status = 400, description = "No checks given", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Missing member:read or org context", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_permissions_bulk(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
    Json(payload): Json<CheckPermissionsBulkRequest>,
) -> ApiResult<Json<CheckPermissionsBulkResponse>> {
    if payload.checks.is_empty() {
        return Err(ApiError::bad_request(
            "At least one check must be provided",
            "INVALID_REQUEST",
        ));
    }

    let user_id = resolve_target(&state, &ctx, payload.user_id)?;

    let mut results = Vec::with_capacity(payload.checks.len());
    let mut denied = Vec::new();

    for query in payload.checks {
        let decision =
            state
                .resolver
                .check_raw(user_id, ctx.organization_id, &query.resource, &query.action)?;

        if !decision.allowed {
            denied.push(format!("{}:{}", query.resource, query.action));
        }
        results.push(BulkPermissionResult {
            resource: query.resource,
            action: query.action,
            allowed: decision.allowed,
            reason: decision.reason,
        });
    }

    Ok(Json(CheckPermissionsBulkResponse {
        user_id,
        all_allowed: denied.is_empty(),
        results,
        denied,
    }))
}

#[utoipa::path(
    get,
    path = "/permissions/me",
    tag = "Permissions",
    responses(
        (status = 200, description = "Caller's role and permissions", body = MyPermissionsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Caller is not a member", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<OrganizationContext>,
) -> ApiResult<Json<MyPermissionsResponse>> {
    let membership = state
        .resolver
        .store()
        .find_membership(ctx.user_id, ctx.organization_id)?
        .ok_or_else(|| ApiError::forbidden("Not a member of this organization", "NOT_A_MEMBER"))?;

    let permissions = state
        .resolver
        .get_user_permissions(ctx.user_id, ctx.organization_id)?;

    Ok(Json(MyPermissionsResponse {
        user_id: ctx.user_id,
        organization_id: ctx.organization_id,
        role: membership.role,
        permissions,
    }))
}
