//! # RBAC
//!
//! Identity and permissions of the Cryostat pod. All four objects are
//! created once and never modified, so an externally deleted one is simply
//! recreated on the next pass.

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::Cryostat;
use crate::resources::rbac::{cluster_role_binding, role, role_binding, service_account};

pub(crate) async fn ensure(ctx: &Reconciler, cr: &Cryostat) -> Result<(), ReconcilerError> {
    ctx.ensure_exists(&service_account(cr)).await?;
    ctx.ensure_exists(&role(cr)).await?;
    ctx.ensure_exists(&role_binding(cr)).await?;
    ctx.ensure_exists(&cluster_role_binding(cr)).await?;
    Ok(())
}
