//! # Workload
//!
//! The Cryostat Deployment. An existing Deployment is rewritten when its
//! recorded pod template hash differs from the desired one or when its live
//! pod template no longer carries the desired pod spec and selector labels.
//! Only the pod spec, the template labels and the two operator annotations
//! change. Replicas, template annotations and anything else set on the live
//! object are left alone.

use crate::constants::{DEFAULT_FS_GROUP, SUPPLEMENTAL_GROUPS_ANNOTATION};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::crd::Cryostat;
use crate::resources::deployment::{
    deployment, parse_supplemental_groups, recorded_template_hash, template_applied, DeploymentMode,
    WorkloadInputs,
};
use crate::resources::ServiceUrls;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use tracing::{debug, info};

fn deployment_key(cr: &Cryostat) -> ObjectKey {
    ObjectKey::namespaced(cr.namespace().unwrap_or_default(), cr.name_any())
}

/// Delete the live Deployment if it was built for `stale` mode
///
/// Failure is reported as [`ReconcilerError::StaleWorkload`], which is
/// retried on a fixed delay.
pub(crate) async fn remove_stale(
    ctx: &Reconciler,
    cr: &Cryostat,
    stale: DeploymentMode,
) -> Result<(), ReconcilerError> {
    let key = deployment_key(cr);
    let Some(live) = ctx.fetch::<Deployment>(&key).await? else {
        return Ok(());
    };
    if DeploymentMode::of(&live) != Some(stale) {
        return Ok(());
    }

    info!(mode = stale.as_str(), "Deleting Deployment built for the other mode");
    ctx.remove::<Deployment>(&key)
        .await
        .map_err(|source| ReconcilerError::StaleWorkload {
            key: key.to_string(),
            source,
        })?;
    Ok(())
}

/// fsGroup for the pod
///
/// On OpenShift the namespace's supplemental groups annotation decides it;
/// elsewhere, or when the annotation is absent, the default group is used.
pub(crate) async fn fs_group(ctx: &Reconciler, cr: &Cryostat) -> Result<i64, ReconcilerError> {
    if !ctx.capabilities.platform.is_openshift() {
        return Ok(DEFAULT_FS_GROUP);
    }
    let key = ObjectKey::cluster(cr.namespace().unwrap_or_default());
    let namespace = ctx
        .fetch::<Namespace>(&key)
        .await?
        .ok_or_else(|| ReconcilerError::missing::<Namespace>(&key))?;

    match namespace.annotations().get(SUPPLEMENTAL_GROUPS_ANNOTATION) {
        None => Ok(DEFAULT_FS_GROUP),
        Some(value) => parse_supplemental_groups(value).ok_or_else(|| {
            ReconcilerError::ConfigurationMismatch(format!(
                "namespace {key} has malformed {SUPPLEMENTAL_GROUPS_ANNOTATION} annotation {value:?}"
            ))
        }),
    }
}

/// Create the Deployment or bring its pod template up to date
pub(crate) async fn ensure(
    ctx: &Reconciler,
    cr: &Cryostat,
    urls: &ServiceUrls,
    tls: bool,
) -> Result<(), ReconcilerError> {
    let fs_group = fs_group(ctx, cr).await?;
    let desired = deployment(
        cr,
        WorkloadInputs {
            images: &ctx.config.images,
            urls,
            tls,
            fs_group,
        },
    )?;
    let key = deployment_key(cr);

    let Some(mut live) = ctx.fetch::<Deployment>(&key).await? else {
        ctx.create(&desired).await?;
        return Ok(());
    };

    let up_to_date = recorded_template_hash(&live) == recorded_template_hash(&desired)
        && DeploymentMode::of(&live) == Some(DeploymentMode::for_instance(cr))
        && template_applied(&live, &desired)?;
    if up_to_date {
        debug!("Deployment is up to date");
        return Ok(());
    }

    let annotations = live.metadata.annotations.get_or_insert_with(Default::default);
    annotations.extend(desired.metadata.annotations.unwrap_or_default());
    if let Some(desired_spec) = desired.spec {
        let template = &mut live.spec.get_or_insert_with(Default::default).template;
        template.spec = desired_spec.template.spec;
        template
            .metadata
            .get_or_insert_with(Default::default)
            .labels
            .get_or_insert_with(Default::default)
            .extend(desired_spec.template.metadata.and_then(|m| m.labels).unwrap_or_default());
    }
    info!("Updating Deployment pod template");
    ctx.update(&live).await?;
    Ok(())
}
