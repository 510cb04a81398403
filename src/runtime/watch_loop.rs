//! # Watch Loop
//!
//! Controller watch loop that monitors `Duplicator` resources, namespaces and
//! (optionally) source objects, and triggers reconciliation when changes are
//! detected.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_WATCH_BACKOFF_MAX_MS, DEFAULT_WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{DirectiveKey, Outcome, Reconciler, ReconcilerError};
use crate::controller::router::{NamespaceRouter, SourceRouter};
use crate::crd::Duplicator;
use crate::observability;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::Api;
use kube::Client;
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// Sets up the kube-runtime controller over every `Duplicator` in the cluster,
/// routes namespace (and source object) events to the directives they affect,
/// and restarts the controller whenever its stream ends until shutdown.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_duration_ms = Arc::new(AtomicU64::new(DEFAULT_WATCH_BACKOFF_START_MS));

    let shutdown_server_state = Arc::clone(&server_state);
    let shutdown_reconciler = Arc::clone(&reconciler);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");

        shutdown_server_state.set_ready(false);
        shutdown_reconciler.cancel();
        info!("Marked server as not ready, in-flight reconciliations will stop at their next store call");
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );
        let _watch_guard = watch_span.enter();

        info!("Starting controller watch loop...");
        run_controller(
            client.clone(),
            Arc::clone(&reconciler),
            &config,
            Arc::clone(&backoff_duration_ms),
        )
        .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            config.watch_restart_delay_after_end_secs
        );
        tokio::time::sleep(config.watch_restart_delay_after_end_duration()).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Build one controller instance and drive it until its stream ends
async fn run_controller(
    client: Client,
    reconciler: Arc<Reconciler>,
    config: &ControllerConfig,
    backoff: Arc<AtomicU64>,
) {
    let directives: Api<Duplicator> = Api::all(client.clone());
    let mut controller = Controller::new(directives, watcher::Config::default().any_semantic());

    // Routers resolve events against the controller's own directive cache
    let namespace_router = NamespaceRouter::new(controller.store());
    controller = controller.watches(
        Api::<Namespace>::all(client.clone()),
        watcher::Config::default(),
        move |namespace| namespace_router.route(&namespace),
    );

    if config.watch_source_objects {
        let configmap_router = SourceRouter::new(controller.store());
        let secret_router = SourceRouter::new(controller.store());
        controller = controller
            .watches(
                Api::<ConfigMap>::all(client.clone()),
                watcher::Config::default(),
                move |configmap| configmap_router.route(&configmap),
            )
            .watches(
                Api::<Secret>::all(client),
                watcher::Config::default(),
                move |secret| secret_router.route(&secret),
            );
    }

    let resync_interval = config.resync_interval();
    let backoff_min_secs = config.backoff_min_secs;
    let backoff_max_secs = config.backoff_max_secs;
    let watch_restart_delay_secs = config.watch_restart_delay_secs;

    controller
        .with_config(
            controller::Config::default().concurrency(config.max_concurrent_reconciliations),
        )
        .shutdown_on_signal()
        .run(
            move |obj, ctx| reconcile(obj, ctx, resync_interval),
            move |obj, error, ctx| {
                handle_reconciliation_error(&obj, error, &ctx, backoff_min_secs, backoff_max_secs)
            },
            reconciler,
        )
        .filter_map(move |event| {
            let backoff = Arc::clone(&backoff);
            async move {
                match &event {
                    Ok(_) => {
                        backoff.store(DEFAULT_WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                        debug!("watch.event.success");
                        Some(event)
                    }
                    // Already handled by the error policy
                    Err(controller::Error::ReconcilerFailed(..)) => None,
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        handle_watch_stream_error(
                            &error_string,
                            &backoff,
                            DEFAULT_WATCH_BACKOFF_MAX_MS,
                            watch_restart_delay_secs,
                        )
                        .await
                        .map(|()| event)
                    }
                }
            }
        })
        .for_each(|_| futures::future::ready(()))
        .await;
}

/// Reconcile one directive and map the outcome onto the work queue
///
/// - `Done` resets the retry history and schedules the periodic resync
/// - `Fatal` waits for the directive to change; its status already says why
/// - `Retry` hands the error to the error policy for backoff
async fn reconcile(
    obj: Arc<Duplicator>,
    ctx: Arc<Reconciler>,
    resync_interval: Duration,
) -> Result<Action, ReconcilerError> {
    let key = DirectiveKey::from_resource(&obj);
    match ctx.reconcile_directive(&key).await {
        Outcome::Done => {
            ctx.reset_backoff(&key);
            observability::metrics::increment_requeues_total("resync");
            Ok(Action::requeue(resync_interval))
        }
        Outcome::Fatal(error) => {
            debug!(directive = %key, reason = error.reason(), "waiting for the directive to change");
            Ok(Action::await_change())
        }
        Outcome::Retry(error) => Err(error),
    }
}

/// Resolve on SIGINT, or on SIGTERM where the platform has it
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}, listening for SIGINT only", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
