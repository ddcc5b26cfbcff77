//! # Reconciliation Logic
//!
//! Main reconciliation pass for `Cryostat` resources.

use crate::controller::reconciler::finalize::{cleanup, ensure_finalizer, DeletionPhase};
use crate::controller::reconciler::types::{Interrupt, Reconciler, ReconcilerError};
use crate::controller::reconciler::{exposure, rbac, tls, workload};
use crate::controller::store::ObjectKey;
use crate::crd::{Cryostat, CryostatStatus};
use crate::observability;
use crate::resources::console::console_link;
use crate::resources::secrets::{grafana_secret, jmx_secret};
use crate::resources::storage::persistent_volume_claim;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Entry point for the controller runtime
///
/// The object handed in only identifies the instance: the pass re-reads it
/// from the store and derives everything from what it finds there.
pub async fn reconcile(cr: Arc<Cryostat>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::of(cr.as_ref()).ok_or(ReconcilerError::MissingObjectKey("metadata.name"))?;
    reconcile_instance(&ctx, &key).await
}

/// Run one pass for the instance at `key`
pub async fn reconcile_instance(ctx: &Reconciler, key: &ObjectKey) -> Result<Action, ReconcilerError> {
    let span = tracing::info_span!(
        "reconcile",
        namespace = key.namespace.as_deref().unwrap_or_default(),
        name = %key.name,
        kind = "Cryostat"
    );
    async {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();
        let result = run(ctx, key).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.reset_backoff(&key.to_string());
        }
        result
    }
    .instrument(span)
    .await
}

async fn run(ctx: &Reconciler, key: &ObjectKey) -> Result<Action, ReconcilerError> {
    let Some(cr) = ctx.fetch::<Cryostat>(key).await? else {
        debug!("Cryostat no longer exists");
        return Ok(Action::await_change());
    };
    match DeletionPhase::of(Some(&cr)) {
        DeletionPhase::Deleting => return cleanup(ctx, &cr).await,
        DeletionPhase::Finalizing | DeletionPhase::Gone => return Ok(Action::await_change()),
        DeletionPhase::Active => {}
    }

    match converge(ctx, cr).await {
        Ok(()) => {
            info!("Reconciled");
            Ok(Action::await_change())
        }
        Err(Interrupt::NotReady(reason)) => {
            let delay = ctx.config.not_ready_requeue_duration();
            info!(%reason, delay_secs = delay.as_secs(), "Waiting on the platform");
            observability::metrics::increment_requeues_total("not-ready");
            Ok(Action::requeue(delay))
        }
        Err(Interrupt::Failed(error)) => Err(error),
    }
}

/// Steps run in a fixed order: later steps use the URLs and TLS material of earlier ones
async fn converge(ctx: &Reconciler, cr: Cryostat) -> Result<(), Interrupt> {
    let mut cr = ensure_finalizer(ctx, cr).await?;

    ctx.ensure_exists(&persistent_volume_claim(&cr)).await?;
    ctx.ensure_exists(&grafana_secret(&cr)).await?;
    ctx.ensure_exists(&jmx_secret(&cr)).await?;

    let tls = tls::ensure(ctx, &cr).await?;
    rbac::ensure(ctx, &cr).await?;
    let urls = exposure::ensure_services(ctx, &cr, tls.as_ref()).await?;
    workload::ensure(ctx, &cr, &urls, tls.is_some()).await?;

    let Some(core_url) = urls.core.as_ref().map(ToString::to_string) else {
        debug!("Core endpoint is not exposed");
        return Ok(());
    };
    let recorded = cr.status.as_ref().map(|s| s.application_url.as_str());
    if recorded != Some(core_url.as_str()) {
        info!(url = %core_url, "Updating application URL");
        cr.status = Some(CryostatStatus {
            application_url: core_url.clone(),
        });
        cr = ctx.update_status(&cr).await?;
    }

    if ctx.capabilities.platform.is_openshift() {
        ctx.ensure_exists(&console_link(&cr, &core_url)).await?;
    }
    Ok(())
}
