//! orgwarden - organization role-based access control.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod rbac;
pub mod schema;
pub mod store;
pub mod telemetry;

use axum::{
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::jwt::JwtConfig;
use middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use rbac::{AuthorizationResolver, PermissionTable};
use store::PermissionStore;
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<AuthorizationResolver>,
    pub jwt_config: Arc<JwtConfig>,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PermissionStore>,
        table: PermissionTable,
        jwt_config: JwtConfig,
        metrics: MetricsState,
    ) -> Self {
        Self {
            resolver: Arc::new(AuthorizationResolver::new(store, table)),
            jwt_config: Arc::new(jwt_config),
            metrics,
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .with_state(state.clone());

    let organization_routes = Router::new()
        .route(
            "/permissions/check",
            post(handlers::permissions::check_permission),
        )
        .route(
            "/permissions/check-bulk",
            post(handlers::permissions::check_permissions_bulk),
        )
        .route("/permissions/me", get(handlers::permissions::my_permissions))
        .route(
            "/members",
            get(handlers::members::list_members).post(handlers::members::add_member),
        )
        .route(
            "/members/{user_id}",
            delete(handlers::members::remove_member),
        )
        .route(
            "/members/{user_id}/role",
            get(handlers::members::get_member_role).put(handlers::members::update_member_role),
        )
        .route(
            "/members/{user_id}/permissions",
            get(handlers::members::get_member_permissions),
        )
        .route(
            "/custom-permissions",
            post(handlers::custom_permissions::set_custom_permission),
        )
        .route(
            "/custom-permissions/{user_id}",
            get(handlers::custom_permissions::list_custom_permissions),
        )
        .route(
            "/custom-permissions/{user_id}/{resource}/{action}",
            delete(handlers::custom_permissions::remove_custom_permission),
        )
        .layer(axum_middleware::from_fn(
            middleware::auth::organization_auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state);

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(organization_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    error::ApiError::not_found("Not found", "NOT_FOUND")
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::HeaderName;
    use axum::http::{HeaderValue, Method};

    let is_wildcard_origin = config.cors.allowed_origins.contains(&"*".to_string())
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = match (config.cors.allow_credentials, is_wildcard_origin) {
        // Credentials cannot be combined with `*`, so echo the caller's origin.
        (true, true) => {
            CorsLayer::new().allow_origin(tower_http::cors::AllowOrigin::mirror_request())
        }
        (_, false) => CorsLayer::new().allow_origin(origins),
        (false, true) => CorsLayer::new().allow_origin(Any),
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.cors.allow_credentials)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn create_db_pool(config: &config::Config) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;
pub use telemetry::shutdown_telemetry;
