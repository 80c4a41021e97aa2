//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] runs the real router on an ephemeral port, backed by an
//! in-memory store and a freshly generated signing key, so tests need no
//! database and never share state.

#![allow(dead_code)]

use jwt_simple::prelude::Ed25519KeyPair;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use orgwarden::{
    auth::JwtConfig,
    create_router,
    rbac::{PermissionTable, Role},
    store::{
        memory::{RawMember, RawOverride},
        MemoryPermissionStore, NewMembership, PermissionStore,
    },
    telemetry::MetricsState,
    AppState, Config,
};

/// Set `TEST_LOG=1` to see server logs while tests run.
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("orgwarden=debug"))
            .with_test_writer()
            .try_init();
    }
});

pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub store: Arc<MemoryPermissionStore>,
    pub jwt: JwtConfig,
    pub organization_id: Uuid,
}

/// A seeded organization member and a token for acting as them.
#[derive(Debug, Clone)]
pub struct TestMember {
    pub user_id: Uuid,
    pub member_id: Uuid,
    pub role: Option<Role>,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_table(PermissionTable::defaults()).await
    }

    pub async fn spawn_with_table(table: PermissionTable) -> Self {
        Lazy::force(&TRACING);

        let config = Config::default_for_testing();
        let store = Arc::new(MemoryPermissionStore::new());
        let jwt = JwtConfig::from_key_pair(Ed25519KeyPair::generate())
            .with_issuer("orgwarden-test");

        let state = AppState::new(
            store.clone(),
            table,
            jwt.clone(),
            MetricsState::disabled(),
        );
        let app = create_router(state, &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            jwt,
            organization_id: Uuid::new_v4(),
        }
    }

    /// Token for `user_id` acting in the app's organization.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.token_in(user_id, Some(self.organization_id))
    }

    pub fn token_in(&self, user_id: Uuid, organization_id: Option<Uuid>) -> String {
        self.jwt
            .generate_access_token(user_id, organization_id)
            .expect("Failed to sign test token")
    }

    pub fn seed_member(&self, role: Role) -> TestMember {
        self.seed_user(Uuid::new_v4(), role)
    }

    pub fn seed_user(&self, user_id: Uuid, role: Role) -> TestMember {
        let membership = self
            .store
            .add_member(NewMembership {
                organization_id: self.organization_id,
                user_id,
                role,
            })
            .expect("Failed to seed member");

        TestMember {
            user_id,
            member_id: membership.id,
            role: Some(role),
            token: self.token_for(user_id),
        }
    }

    /// Seeds a member whose stored role text is taken verbatim.
    pub fn seed_raw_member(&self, role: &str) -> TestMember {
        let user_id = Uuid::new_v4();
        let member_id = self
            .store
            .insert_raw_member(RawMember {
                organization_id: self.organization_id,
                user_id,
                role: role.to_string(),
            })
            .expect("Failed to seed member");

        TestMember {
            user_id,
            member_id,
            role: role.parse().ok(),
            token: self.token_for(user_id),
        }
    }

    /// Stores an override row verbatim, bypassing validation.
    pub fn seed_raw_override(
        &self,
        member: &TestMember,
        resource: &str,
        action: &str,
        granted: &str,
    ) {
        self.store
            .insert_raw_override(RawOverride {
                organization_id: self.organization_id,
                member_id: member.member_id,
                resource: resource.to_string(),
                action: action.to_string(),
                granted: granted.to_string(),
            })
            .expect("Failed to seed override");
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send GET request")
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send POST request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send PUT request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send DELETE request")
    }

    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }
}

/// Asserts that a response has a specific status code.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status().as_u16(),
            $expected,
            "Expected status {}, got {}",
            $expected,
            $response.status()
        );
    };
}
