use orgwarden::{
    auth::JwtConfig, create_db_pool, create_router, init_tracing, rbac::PermissionTable,
    shutdown_telemetry, store::PgPermissionStore, telemetry::MetricsState, AppState, Config,
};
use std::sync::Arc;
use tracing::{error, info, warn};

fn exit_with(message: &str, e: &dyn std::fmt::Display) -> ! {
    error!(error = %e, "{message}");
    shutdown_telemetry();
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config);

    info!(
        service = "orgwarden",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    let table = PermissionTable::load(config.rbac.policy_path.as_deref())
        .unwrap_or_else(|e| exit_with("Failed to load permission table", &e));
    if let Some(path) = &config.rbac.policy_path {
        info!(policy_path = %path, "Loaded permission table");
    }

    let jwt_config = JwtConfig::from_env(config.jwt.issuer.clone(), config.jwt.audience.clone())
        .unwrap_or_else(|e| exit_with("Failed to load token verification key", &e));

    info!(
        database_url = %config.database.url.split('@').next_back().unwrap_or("***"),
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let db_pool = create_db_pool(&config)
        .unwrap_or_else(|e| exit_with("Failed to create database pool", &e));

    info!("Database connection pool created");

    let state = AppState::new(
        Arc::new(PgPermissionStore::new(db_pool)),
        table,
        jwt_config,
        MetricsState::new(config.telemetry.metrics_enabled),
    );
    let app = create_router(state, &config);

    let http_addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| exit_with("Failed to bind HTTP server", &e));

    info!(
        http_address = %http_addr,
        docs_url = %format!("http://{}/swagger-ui", http_addr),
        "HTTP server ready"
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        error!(error = %e, "HTTP server error");
    }

    shutdown_telemetry();

    info!("Server shutdown complete");
}
