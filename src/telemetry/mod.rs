//! Observability: tracing, metrics, and OpenTelemetry integration.

pub mod metrics;
pub mod tracing;

pub use metrics::{record_permission_check, record_request_latency, MetricsState};
pub use tracing::{init_telemetry, shutdown_telemetry};
