//! Reconcile functions for the two owned CRDs, and the shared types/manifest
//! helpers they're built from.

pub mod custom_package;
pub mod git_repository;
pub mod manifest;
pub mod types;

pub use types::{resource_key, BackoffState, ReconcilerError, SharedReconcilerState};
