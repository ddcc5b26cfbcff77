//! # Finalizer
//!
//! Namespaced dependents are owned by the `Cryostat` and garbage collected
//! with it. The ClusterRoleBinding and ConsoleLink are cluster-scoped and
//! cannot be owned, so the finalizer removes them before the instance goes.
//!
//! ```text
//! Active --(deletion requested)--> Deleting --(cleanup done)--> Finalizing --> Gone
//! ```
//!
//! A failed cleanup leaves the finalizer in place; the next pass retries it.

use crate::constants::CRYOSTAT_FINALIZER;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::crd::{ConsoleLink, Cryostat};
use crate::resources::cluster_scoped_name;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::info;

/// Where an instance is in its deletion lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPhase {
    /// Not being deleted
    Active,
    /// Deletion requested, cleanup still pending
    Deleting,
    /// Cleanup done, waiting on other finalizers
    Finalizing,
    /// The instance no longer exists
    Gone,
}

impl DeletionPhase {
    pub fn of(cr: Option<&Cryostat>) -> Self {
        match cr {
            None => Self::Gone,
            Some(cr) if cr.metadata.deletion_timestamp.is_none() => Self::Active,
            Some(cr) if has_finalizer(cr) => Self::Deleting,
            Some(_) => Self::Finalizing,
        }
    }
}

fn has_finalizer(cr: &Cryostat) -> bool {
    cr.finalizers().iter().any(|f| f == CRYOSTAT_FINALIZER)
}

/// Add the finalizer if absent, returning the instance as stored
pub(crate) async fn ensure_finalizer(ctx: &Reconciler, cr: Cryostat) -> Result<Cryostat, ReconcilerError> {
    if has_finalizer(&cr) {
        return Ok(cr);
    }
    let mut updated = cr;
    updated.finalizers_mut().push(CRYOSTAT_FINALIZER.to_string());
    info!("Adding finalizer");
    ctx.update(&updated).await
}

/// Remove cluster-scoped dependents, then release the instance
pub(crate) async fn cleanup(ctx: &Reconciler, cr: &Cryostat) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::cluster(cluster_scoped_name(cr));

    if ctx.delete::<ClusterRoleBinding>(&key).await? {
        info!(binding = %key, "Deleted ClusterRoleBinding");
    }
    if ctx.capabilities.platform.is_openshift() && ctx.delete::<ConsoleLink>(&key).await? {
        info!(link = %key, "Deleted ConsoleLink");
    }

    let mut released = cr.clone();
    released
        .finalizers_mut()
        .retain(|finalizer| finalizer != CRYOSTAT_FINALIZER);
    ctx.update(&released).await?;
    info!("Removed finalizer");
    Ok(Action::await_change())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CryostatSpec;
    use crate::resources::test_support::cryostat;

    fn deleting(finalizers: &[&str]) -> Cryostat {
        let mut cr = cryostat("demo", "default", CryostatSpec::default());
        cr.metadata.deletion_timestamp =
            serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap();
        cr.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
        cr
    }

    #[test]
    fn phases() {
        let active = cryostat("demo", "default", CryostatSpec::default());
        assert_eq!(DeletionPhase::of(Some(&active)), DeletionPhase::Active);
        assert_eq!(
            DeletionPhase::of(Some(&deleting(&[CRYOSTAT_FINALIZER]))),
            DeletionPhase::Deleting
        );
        assert_eq!(
            DeletionPhase::of(Some(&deleting(&["example.com/other"]))),
            DeletionPhase::Finalizing
        );
        assert_eq!(DeletionPhase::of(None), DeletionPhase::Gone);
    }
}
