//! OpenAPI documentation served through Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::pagination::PaginationMeta;
use crate::rbac::{Action, Decision, DecisionReason, Resource, Role};
use crate::store::{CustomPermission, Membership};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "orgwarden API",
        version = "1.0.0",
        description = "Organization role-based access control.\n\n\
        ## Model\n\
        Every member of an organization holds exactly one role \
        (owner, admin, member, viewer, billing). Each role maps resources to allowed actions; \
        `manage` allows every action on the resource. \
        Custom permissions grant or revoke a single resource/action for a single member and take \
        precedence over the role.\n\n\
        ## Authentication\n\
        Every organization endpoint requires `Authorization: Bearer <token>`. \
        The token's `sub` is the caller and its `organization_id` claim selects the organization.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Permissions", description = "Permission checks"),
        (name = "Members", description = "Organization membership and roles"),
        (name = "Custom Permissions", description = "Per-member grants and revokes")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::permissions::check_permission,
        crate::handlers::permissions::check_permissions_bulk,
        crate::handlers::permissions::my_permissions,

        crate::handlers::members::list_members,
        crate::handlers::members::add_member,
        crate::handlers::members::get_member_role,
        crate::handlers::members::update_member_role,
        crate::handlers::members::remove_member,
        crate::handlers::members::get_member_permissions,

        crate::handlers::custom_permissions::set_custom_permission,
        crate::handlers::custom_permissions::list_custom_permissions,
        crate::handlers::custom_permissions::remove_custom_permission,
    ),
    components(
        schemas(
            ApiError,
            PaginationMeta,
            Role,
            Resource,
            Action,
            Decision,
            DecisionReason,
            Membership,
            CustomPermission,

            crate::handlers::health::ServiceStatus,
            crate::handlers::health::ReadinessReport,
            crate::handlers::health::ReadinessChecks,
            crate::handlers::health::Readiness,
            crate::handlers::health::StoreCheck,
            crate::handlers::health::StoreState,

            crate::handlers::permissions::CheckPermissionRequest,
            crate::handlers::permissions::CheckPermissionResponse,
            crate::handlers::permissions::PermissionQuery,
            crate::handlers::permissions::CheckPermissionsBulkRequest,
            crate::handlers::permissions::CheckPermissionsBulkResponse,
            crate::handlers::permissions::BulkPermissionResult,
            crate::handlers::permissions::MyPermissionsResponse,

            crate::handlers::members::AddMemberRequest,
            crate::handlers::members::UpdateRoleRequest,
            crate::handlers::members::MembersListResponse,
            crate::handlers::members::MemberRoleResponse,
            crate::handlers::members::MemberPermissionsResponse,

            crate::handlers::custom_permissions::SetCustomPermissionRequest,
            crate::handlers::custom_permissions::CustomPermissionsResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token carrying `sub` and `organization_id` claims.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_generation() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "orgwarden API");
        assert!(doc.paths.paths.contains_key("/permissions/check"));
        assert!(doc
            .paths
            .paths
            .contains_key("/custom-permissions/{user_id}/{resource}/{action}"));
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components are generated");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("DecisionReason"));
    }
}
