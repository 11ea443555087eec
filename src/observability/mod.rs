//! Observability: Prometheus metrics and OpenTelemetry tracing bootstrap.

pub mod metrics;
pub mod otel;
