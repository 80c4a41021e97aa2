//! Liveness, readiness and service status endpoints.
//!
//! Readiness is the only check with a dependency: the permission store must
//! answer a ping, otherwise authorization decisions cannot be made.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{store::PermissionStore, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    #[schema(example = "healthy")]
    pub status: &'static str,
    #[schema(example = "orgwarden")]
    pub service: &'static str,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Up,
    Down,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreCheck {
    pub status: StoreState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 2)]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub store: StoreCheck,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessReport {
    pub status: Readiness,
    pub checks: ReadinessChecks,
}

impl StoreCheck {
    fn run(store: &dyn PermissionStore) -> Self {
        let started = Instant::now();
        match store.ping() {
            Ok(()) => Self {
                status: StoreState::Up,
                latency_ms: Some(started.elapsed().as_millis().try_into().unwrap_or(u64::MAX)),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Permission store ping failed");
                Self {
                    status: StoreState::Down,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl ReadinessReport {
    fn from_store(store: StoreCheck) -> Self {
        let status = match store.status {
            StoreState::Up => Readiness::Ready,
            StoreState::Down => Readiness::NotReady,
        };
        Self {
            status,
            checks: ReadinessChecks { store },
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.status {
            Readiness::Ready => StatusCode::OK,
            Readiness::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Process is serving", content_type = "text/plain"))
)]
pub async fn health_check_simple() -> &'static str {
    "OK"
}

#[utoipa::path(
    get,
    path = "/health/status",
    tag = "Health",
    responses((status = 200, description = "Service name and version", body = ServiceStatus))
)]
pub async fn health_check() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Permission store reachable", body = ReadinessReport),
        (status = 503, description = "Permission store unreachable", body = ReadinessReport)
    )
)]
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = ReadinessReport::from_store(StoreCheck::run(state.resolver.store().as_ref()));
    (report.status_code(), Json(report))
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn live_check() -> StatusCode {
    StatusCode::OK
}
