//! Core types shared by both reconcile loops: the error type `reconcile()`
//! returns to `kube_runtime`, per-resource backoff bookkeeping, and the shared
//! runtime context threaded into every reconcile call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kube::runtime::events::Reporter;
use kube::Client;
use thiserror::Error;

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::git::error::GitOpsError;
use crate::git::lock_registry::RepoLockRegistry;
use crate::gitserver::GitServerClient;
use crate::resolver::ResolverBases;

/// Error type returned by both reconcile functions to `kube_runtime::Controller`.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Git(#[from] GitOpsError),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Per-resource Fibonacci backoff bookkeeping, keyed by `namespace/name` in
/// [`SharedReconcilerState::backoff_states`].
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Runtime context shared by the `GitRepository` and `CustomPackage` reconcile
/// loops. Cheaply cloneable; every clone shares the same underlying state.
#[derive(Clone)]
pub struct SharedReconcilerState {
    pub client: Client,
    pub repo_locks: RepoLockRegistry,
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub resolver_bases: ResolverBases,
    pub config: ControllerConfig,
    pub reporter: Reporter,
}

impl std::fmt::Debug for SharedReconcilerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedReconcilerState").finish_non_exhaustive()
    }
}

impl SharedReconcilerState {
    #[must_use]
    pub fn new(client: Client, resolver_bases: ResolverBases, config: ControllerConfig) -> Self {
        Self {
            client,
            repo_locks: RepoLockRegistry::new(),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            resolver_bases,
            config,
            reporter: "adhar-platform-controller".into(),
        }
    }

    /// Build a client for the in-cluster Git server's admin API, addressed from
    /// inside the cluster.
    #[must_use]
    pub fn git_server_client(&self, internal_base_url: &str) -> GitServerClient {
        GitServerClient::new(internal_base_url)
    }
}

/// Key a resource by CRD kind as well as `namespace/name`, so that a
/// `GitRepository` and a `CustomPackage` that happen to share a namespace and
/// name never collide in the shared backoff map.
#[must_use]
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}
