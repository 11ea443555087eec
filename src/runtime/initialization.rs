//! # Initialization
//!
//! Start-up sequencing for the operator binary: rustls crypto provider install,
//! tracing/OpenTelemetry bootstrap, metrics registration, HTTP server start-up,
//! Kubernetes client creation, and reconciling pre-existing resources before the
//! watch loops begin.

use std::sync::Arc;

use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::{error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::reconciler::{custom_package, git_repository, SharedReconcilerState};
use crate::crd::{CustomPackage, GitRepository};
use crate::observability;
use crate::server::{start_server, ServerState};

/// Everything [`main`](crate) needs to start the two watch loops.
pub struct InitializationResult {
    pub client: Client,
    pub git_repositories: Api<GitRepository>,
    pub custom_packages: Api<CustomPackage>,
    pub reconciler: Arc<SharedReconcilerState>,
    pub server_state: Arc<ServerState>,
    pub otel_tracer_provider: Option<observability::otel::TracerProviderHandle>,
    pub config: ControllerConfig,
}

/// Run the full start-up sequence described in the module docs.
///
/// # Errors
///
/// Returns an error if the HTTP server fails to bind, the Kubernetes client
/// cannot be constructed, or an existing-resource listing call fails outright
/// (individual reconcile failures during that pass are logged and skipped).
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("failed to install rustls crypto provider"));

    let config = ControllerConfig::from_env();

    let otel_tracer_provider = observability::otel::init_otel().context("failed to initialize OpenTelemetry")?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("adhar_platform_controller={}", config.log_level).into());
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        warn!("tracing subscriber already installed, skipping: {e}");
    }

    info!(
        "starting adhar-platform-controller v{} (built {}, commit {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH"),
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState { is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)) });
    let server_port = config.metrics_port;
    let server_state_for_task = server_state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_for_task).await {
            error!("HTTP server error: {e}");
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default().await.context("failed to build Kubernetes client")?;

    let git_repositories: Api<GitRepository> = Api::all(client.clone());
    let custom_packages: Api<CustomPackage> = Api::all(client.clone());

    let reconciler = Arc::new(SharedReconcilerState::new(client.clone(), config.resolver_bases(), config.clone()));

    reconcile_existing_git_repositories(&git_repositories, &reconciler).await?;
    reconcile_existing_custom_packages(&custom_packages, &reconciler).await?;

    info!("controller initialized, starting watch loops");

    Ok(InitializationResult {
        client,
        git_repositories,
        custom_packages,
        reconciler,
        server_state,
        otel_tracer_provider,
        config,
    })
}

async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};

    let startup_timeout = std::time::Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = std::time::Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start = std::time::Instant::now();
    let _ = config;

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("HTTP server is ready");
            break;
        }
        if start.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!("HTTP server failed to become ready within {}s", startup_timeout.as_secs()));
        }
        tokio::time::sleep(poll_interval).await;
    }
    Ok(())
}

async fn reconcile_existing_git_repositories(
    api: &Api<GitRepository>,
    reconciler: &Arc<SharedReconcilerState>,
) -> Result<()> {
    let list = match api.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            warn!("GitRepository CRD not yet queryable, skipping startup reconcile pass: {e}");
            return Ok(());
        }
    };
    info!("reconciling {} existing GitRepository resources at startup", list.items.len());
    for item in list.items {
        let name = item.name_any();
        if let Err(e) = git_repository::reconcile(Arc::new(item), reconciler.clone()).await {
            error!("startup reconcile of GitRepository {name} failed: {e}");
        }
    }
    Ok(())
}

async fn reconcile_existing_custom_packages(
    api: &Api<CustomPackage>,
    reconciler: &Arc<SharedReconcilerState>,
) -> Result<()> {
    let list = match api.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            warn!("CustomPackage CRD not yet queryable, skipping startup reconcile pass: {e}");
            return Ok(());
        }
    };
    info!("reconciling {} existing CustomPackage resources at startup", list.items.len());
    for item in list.items {
        let name = item.name_any();
        if let Err(e) = custom_package::reconcile(Arc::new(item), reconciler.clone()).await {
            error!("startup reconcile of CustomPackage {name} failed: {e}");
        }
    }
    Ok(())
}
