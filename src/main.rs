//! Adhar Platform Controller binary entry point.
//!
//! Starts two independent `kube_runtime::Controller` watch loops, one for
//! [`adhar_platform_controller::crd::GitRepository`] and one for
//! [`adhar_platform_controller::crd::CustomPackage`], running concurrently on
//! the same shared [`adhar_platform_controller::controller::reconciler::SharedReconcilerState`].

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use futures::StreamExt;
use kube::ResourceExt;
use kube_runtime::{watcher, Controller};
use tracing::{info, warn};

use adhar_platform_controller::controller::error_policy::{handle_watch_stream_error, make_error_action};
use adhar_platform_controller::controller::reconciler::{custom_package, git_repository};
use adhar_platform_controller::observability::otel;
use adhar_platform_controller::runtime::initialization::initialize;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let init = initialize().await?;

    init.server_state.is_ready.store(true, std::sync::atomic::Ordering::Relaxed);

    let shutdown_state = init.server_state.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal, marking not ready");
        shutdown_state.is_ready.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    let git_repository_loop = run_git_repository_watch_loop(init.git_repositories.clone(), init.reconciler.clone(), init.server_state.clone(), init.config.clone());
    let custom_package_loop = run_custom_package_watch_loop(init.custom_packages.clone(), init.reconciler.clone(), init.server_state.clone(), init.config.clone());

    tokio::join!(git_repository_loop, custom_package_loop);

    otel::shutdown_otel(init.otel_tracer_provider);
    info!("controller stopped gracefully");
    Ok(())
}

async fn run_git_repository_watch_loop(
    api: kube::Api<adhar_platform_controller::crd::GitRepository>,
    ctx: Arc<adhar_platform_controller::controller::reconciler::SharedReconcilerState>,
    server_state: Arc<adhar_platform_controller::server::ServerState>,
    config: adhar_platform_controller::config::ControllerConfig,
) {
    let rate_limit_backoff_ms = Arc::new(AtomicU64::new(config.backoff_min_secs.saturating_mul(1000)));

    loop {
        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("shutdown requested, exiting GitRepository watch loop");
            break;
        }

        let backoff_clone = rate_limit_backoff_ms.clone();
        let config = config.clone();

        Controller::new(api.clone(), watcher::Config::default())
            .shutdown_on_signal()
            .run(
                git_repository::reconcile,
                move |obj, error, ctx| {
                    let key = adhar_platform_controller::controller::reconciler::resource_key(
                        "git-repository",
                        &obj.namespace().unwrap_or_default(),
                        &obj.name_any(),
                    );
                    make_error_action("git-repository", &key, error, ctx)
                },
                ctx.clone(),
            )
            .filter_map(move |result| {
                let backoff = backoff_clone.clone();
                let config = config.clone();
                async move {
                    match result {
                        Ok(_) => {
                            backoff.store(config.backoff_min_secs.saturating_mul(1000), std::sync::atomic::Ordering::Relaxed);
                            Some(())
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                config.backoff_max_secs.saturating_mul(1000),
                                config.watch_restart_delay_secs,
                            )
                            .await
                        }
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .await;

        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        warn!("GitRepository watch stream ended, restarting in {}s", ctx.config.watch_restart_delay_after_end_secs);
        tokio::time::sleep(ctx.config.watch_restart_delay_after_end_duration()).await;
    }
}

async fn run_custom_package_watch_loop(
    api: kube::Api<adhar_platform_controller::crd::CustomPackage>,
    ctx: Arc<adhar_platform_controller::controller::reconciler::SharedReconcilerState>,
    server_state: Arc<adhar_platform_controller::server::ServerState>,
    config: adhar_platform_controller::config::ControllerConfig,
) {
    let rate_limit_backoff_ms = Arc::new(AtomicU64::new(config.backoff_min_secs.saturating_mul(1000)));

    loop {
        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            info!("shutdown requested, exiting CustomPackage watch loop");
            break;
        }

        let backoff_clone = rate_limit_backoff_ms.clone();
        let config = config.clone();

        Controller::new(api.clone(), watcher::Config::default())
            .shutdown_on_signal()
            .run(
                custom_package::reconcile,
                move |obj, error, ctx| {
                    let key = adhar_platform_controller::controller::reconciler::resource_key(
                        "custom-package",
                        &obj.namespace().unwrap_or_default(),
                        &obj.name_any(),
                    );
                    make_error_action("custom-package", &key, error, ctx)
                },
                ctx.clone(),
            )
            .filter_map(move |result| {
                let backoff = backoff_clone.clone();
                let config = config.clone();
                async move {
                    match result {
                        Ok(_) => {
                            backoff.store(config.backoff_min_secs.saturating_mul(1000), std::sync::atomic::Ordering::Relaxed);
                            Some(())
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                config.backoff_max_secs.saturating_mul(1000),
                                config.watch_restart_delay_secs,
                            )
                            .await
                        }
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .await;

        if !server_state.is_ready.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        warn!("CustomPackage watch stream ended, restarting in {}s", ctx.config.watch_restart_delay_after_end_secs);
        tokio::time::sleep(ctx.config.watch_restart_delay_after_end_duration()).await;
    }
}
