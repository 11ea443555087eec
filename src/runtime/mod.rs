//! Operator start-up sequencing: crypto provider install, tracing/otel bootstrap,
//! metrics registration, HTTP server start-up, and reconciling pre-existing
//! resources before the watch loops begin.

pub mod initialization;
