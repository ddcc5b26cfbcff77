//! # Watch Loop
//!
//! Watches `Cryostat` resources and the objects they own, and triggers
//! reconciliation when any of them change.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::{Cryostat, Route};
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal is received
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let cryostats: Api<Cryostat> = Api::all(client.clone());
    let mut controller = Controller::new(cryostats, watcher::Config::default())
        .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
        .owns(
            Api::<PersistentVolumeClaim>::all(client.clone()),
            watcher::Config::default(),
        );
    if reconciler.capabilities.platform.is_openshift() {
        controller = controller.owns(Api::<Route>::all(client), watcher::Config::default());
    }

    info!("Starting controller watch loop...");
    controller
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => debug!(object = %object, "watch.event.success"),
                Err(e) => warn!(error = %e, "Controller stream error"),
            }
        })
        .instrument(tracing::info_span!("controller.watch", operation = "watch_loop"))
        .await;

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controller stopped gracefully");
    Ok(())
}
