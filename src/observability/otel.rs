//! # OpenTelemetry Support
//!
//! Provides optional OpenTelemetry tracing integration, enabled purely from
//! environment variables (there is no per-resource otel configuration in this
//! controller's CRDs):
//!
//! - `DD_API_KEY` present -> initialise Datadog tracing via `datadog-opentelemetry`.
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` present -> log the configured endpoint (OTLP
//!   exporter wiring is not yet implemented).
//! - Neither set -> skip, the caller falls back to plain `tracing_subscriber::fmt()`.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Tracer provider handle retained only so it can be shut down gracefully on exit.
#[derive(Debug)]
pub enum TracerProviderHandle {
    Datadog(opentelemetry_sdk::trace::SdkTracerProvider),
}

/// Initialise OpenTelemetry tracing from environment variables.
///
/// Returns `Ok(None)` if no exporter is configured.
///
/// # Errors
///
/// Returns an error if Datadog initialisation fails.
pub fn init_otel() -> Result<Option<TracerProviderHandle>> {
    if std::env::var("DD_API_KEY").is_ok() {
        info!("DD_API_KEY found in environment, initializing Datadog tracing");
        return init_datadog();
    }

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        info!("OTEL_EXPORTER_OTLP_ENDPOINT detected, but OTLP exporter implementation is pending");
        return Ok(None);
    }

    info!("no OpenTelemetry configuration found, skipping otel initialization");
    Ok(None)
}

fn init_datadog() -> Result<Option<TracerProviderHandle>> {
    if std::env::var("DD_SERVICE").is_err() {
        std::env::set_var("DD_SERVICE", "adhar-platform-controller");
    }
    if std::env::var("DD_VERSION").is_err() {
        std::env::set_var("DD_VERSION", env!("CARGO_PKG_VERSION"));
    }
    if std::env::var("DD_SITE").is_err() {
        std::env::set_var("DD_SITE", "datadoghq.com");
    }
    if std::env::var("DD_TRACE_AGENT_URL").is_err() {
        std::env::set_var("DD_TRACE_AGENT_URL", "http://localhost:8126");
    }

    info!(
        "initializing Datadog OpenTelemetry tracing: service={}, version={}",
        std::env::var("DD_SERVICE").unwrap_or_default(),
        std::env::var("DD_VERSION").unwrap_or_default(),
    );

    let tracer_provider = datadog_opentelemetry::tracing().init();
    info!("Datadog OpenTelemetry tracing initialized");
    Ok(Some(TracerProviderHandle::Datadog(tracer_provider)))
}

/// Flush and shut down the tracer provider before process exit.
pub fn shutdown_otel(tracer_provider: Option<TracerProviderHandle>) {
    let Some(TracerProviderHandle::Datadog(provider)) = tracer_provider else {
        return;
    };
    if let Err(e) = provider.shutdown_with_timeout(Duration::from_secs(5)) {
        warn!("error shutting down Datadog tracer provider: {}", e);
    }
}
