//! Permission check endpoint integration tests.

mod common;

use common::TestApp;
use orgwarden::rbac::{Action, PermissionTable, Resource, Role};
use serde_json::{json, Value};
use uuid::Uuid;

// ============================================================================
// Single Checks
// ============================================================================

#[tokio::test]
async fn check_follows_the_role_table() {
    // Arrange
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Member);

    // Act
    let response = app
        .post(
            "/permissions/check",
            &member.token,
            json!({"resource": "api_key", "action": "create"}),
        )
        .await;

    // Assert
    assert_status!(response, 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["allowed"], true);
    assert_eq!(body["reason"], "granted_by_role");
    assert_eq!(body["user_id"], member.user_id.to_string());
}

#[tokio::test]
async fn check_reports_a_denial_without_failing() {
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Member);

    let response = app
        .post(
            "/permissions/check",
            &member.token,
            json!({"resource": "billing", "action": "read"}),
        )
        .await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "not_granted");
}

#[tokio::test]
async fn check_sees_a_new_override_immediately() {
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Member);
    let request = json!({"resource": "billing", "action": "read"});

    let before: Value = app
        .post("/permissions/check", &member.token, request.clone())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(before["allowed"], false);

    app.seed_raw_override(&member, "billing", "read", "true");

    let after: Value = app
        .post("/permissions/check", &member.token, request)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(after["allowed"], true);
    assert_eq!(after["reason"], "granted_by_override");
}

#[tokio::test]
async fn check_reports_manage_grants() {
    let app = TestApp::spawn().await;
    let owner = app.seed_member(Role::Owner);

    let body: Value = app
        .post(
            "/permissions/check",
            &owner.token,
            json!({"resource": "webhook", "action": "delete"}),
        )
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["allowed"], true);
    assert_eq!(body["reason"], "granted_by_manage");
}

#[tokio::test]
async fn check_denies_non_members() {
    let app = TestApp::spawn().await;
    let outsider = app.token_for(Uuid::new_v4());

    let response = app
        .post(
            "/permissions/check",
            &outsider,
            json!({"resource": "organization", "action": "read"}),
        )
        .await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "not_a_member");
}

#[tokio::test]
async fn check_denies_unknown_tags() {
    let app = TestApp::spawn().await;
    let owner = app.seed_member(Role::Owner);

    let body: Value = app
        .post(
            "/permissions/check",
            &owner.token,
            json!({"resource": "projects", "action": "read"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "unknown_resource");

    let body: Value = app
        .post(
            "/permissions/check",
            &owner.token,
            json!({"resource": "billing", "action": "approve"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "unknown_action");
}

#[tokio::test]
async fn check_uses_the_configured_table() {
    let table =
        PermissionTable::empty().with_actions(Role::Viewer, Resource::Billing, [Action::Read]);
    let app = TestApp::spawn_with_table(table).await;
    let viewer = app.seed_member(Role::Viewer);
    let owner = app.seed_member(Role::Owner);

    let body: Value = app
        .post(
            "/permissions/check-bulk",
            &viewer.token,
            json!({
                "checks": [
                    {"resource": "billing", "action": "read"},
                    {"resource": "organization", "action": "read"}
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["denied"], json!(["organization:read"]));

    let body: Value = app
        .post(
            "/permissions/check",
            &owner.token,
            json!({"resource": "organization", "action": "read"}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["allowed"], false);
}

// ============================================================================
// Checking Other Users
// ============================================================================

#[tokio::test]
async fn check_for_another_user_requires_member_read() {
    let app = TestApp::spawn().await;
    let billing = app.seed_member(Role::Billing);
    let admin = app.seed_member(Role::Admin);

    let response = app
        .post(
            "/permissions/check",
            &billing.token,
            json!({"user_id": admin.user_id, "resource": "member", "action": "create"}),
        )
        .await;

    assert_status!(response, 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn check_for_another_user_answers_for_them() {
    let app = TestApp::spawn().await;
    let viewer = app.seed_member(Role::Viewer);
    let admin = app.seed_member(Role::Admin);

    let response = app
        .post(
            "/permissions/check",
            &viewer.token,
            json!({"user_id": admin.user_id, "resource": "member", "action": "create"}),
        )
        .await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], admin.user_id.to_string());
    assert_eq!(body["allowed"], true);
}

// ============================================================================
// Bulk Checks
// ============================================================================

#[tokio::test]
async fn bulk_check_lists_denied_pairs() {
    let app = TestApp::spawn().await;
    let billing = app.seed_member(Role::Billing);

    let response = app
        .post(
            "/permissions/check-bulk",
            &billing.token,
            json!({
                "checks": [
                    {"resource": "billing", "action": "delete"},
                    {"resource": "organization", "action": "read"},
                    {"resource": "member", "action": "read"},
                    {"resource": "audit_log", "action": "read"}
                ]
            }),
        )
        .await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["all_allowed"], false);
    assert_eq!(body["results"].as_array().unwrap().len(), 4);
    assert_eq!(body["results"][0]["allowed"], true);
    assert_eq!(body["results"][0]["reason"], "granted_by_manage");
    assert_eq!(body["denied"], json!(["member:read", "audit_log:read"]));
}

#[tokio::test]
async fn bulk_check_all_allowed() {
    let app = TestApp::spawn().await;
    let admin = app.seed_member(Role::Admin);

    let body: Value = app
        .post(
            "/permissions/check-bulk",
            &admin.token,
            json!({
                "checks": [
                    {"resource": "member", "action": "delete"},
                    {"resource": "settings", "action": "update"}
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["all_allowed"], true);
    assert_eq!(body["denied"], json!([]));
}

#[tokio::test]
async fn bulk_check_rejects_an_empty_list() {
    let app = TestApp::spawn().await;
    let admin = app.seed_member(Role::Admin);

    let response = app
        .post("/permissions/check-bulk", &admin.token, json!({"checks": []}))
        .await;

    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST");
}

// ============================================================================
// Effective Permissions
// ============================================================================

#[tokio::test]
async fn my_permissions_returns_role_and_effective_map() {
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Member);

    let response = app.get("/permissions/me", &member.token).await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "member");
    assert_eq!(body["organization_id"], app.organization_id.to_string());
    assert_eq!(body["permissions"]["api_key"], json!(["create", "read"]));
    assert_eq!(body["permissions"]["billing"], json!([]));
    assert_eq!(body["permissions"].as_object().unwrap().len(), 9);
}

#[tokio::test]
async fn my_permissions_reflect_overrides() {
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Member);
    app.seed_raw_override(&member, "billing", "create", "true");
    app.seed_raw_override(&member, "api_key", "create", "false");

    let body: Value = app
        .get("/permissions/me", &member.token)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["permissions"]["billing"], json!(["create"]));
    assert_eq!(body["permissions"]["api_key"], json!(["read"]));
}

#[tokio::test]
async fn unrecognized_roles_keep_only_their_overrides() {
    let app = TestApp::spawn().await;
    let member = app.seed_raw_member("superuser");
    app.seed_raw_override(&member, "billing", "read", "true");

    let body: Value = app
        .post(
            "/permissions/check-bulk",
            &member.token,
            json!({
                "checks": [
                    {"resource": "billing", "action": "read"},
                    {"resource": "organization", "action": "read"}
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["results"][0]["reason"], "granted_by_override");
    assert_eq!(body["results"][1]["reason"], "not_granted");
    assert_eq!(body["denied"], json!(["organization:read"]));

    let response = app.get("/permissions/me", &member.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["role"].is_null());
    assert_eq!(body["permissions"]["billing"], json!(["read"]));
    assert_eq!(body["permissions"]["organization"], json!([]));
}

#[tokio::test]
async fn my_permissions_rejects_non_members() {
    let app = TestApp::spawn().await;
    let outsider = app.token_for(Uuid::new_v4());

    let response = app.get("/permissions/me", &outsider).await;

    assert_status!(response, 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_A_MEMBER");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/permissions/me").await;

    assert_status!(response, 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_AUTH_HEADER");
}

#[tokio::test]
async fn forged_tokens_are_rejected() {
    let app = TestApp::spawn().await;
    let other = TestApp::spawn().await;
    let member = app.seed_member(Role::Owner);
    let forged = other.token_in(member.user_id, Some(app.organization_id));

    let response = app.get("/permissions/me", &forged).await;

    assert_status!(response, 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn tokens_without_an_organization_are_forbidden() {
    let app = TestApp::spawn().await;
    let member = app.seed_member(Role::Owner);
    let token = app.token_in(member.user_id, None);

    let response = app
        .post(
            "/permissions/check",
            &token,
            json!({"resource": "organization", "action": "read"}),
        )
        .await;

    assert_status!(response, 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ORGANIZATION_CONTEXT_REQUIRED");
}
