//! # TLS
//!
//! Private CA chain issued by cert-manager. Skipped when the instance opts
//! out, and skipped with a warning when cert-manager is not installed.

use crate::controller::reconciler::types::{Interrupt, Reconciler, ReconcilerError};
use crate::controller::store::ObjectKey;
use crate::crd::Cryostat;
use crate::resources::certificates::{
    ca_certificate, ca_issuer, ca_name, core_certificate, grafana_certificate, self_signed_issuer,
    CA_CERT_KEY,
};
use crate::resources::secrets::keystore_secret;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use tracing::warn;

/// TLS inputs for the Routes and the Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    /// PEM bundle of the instance's CA, trusted by re-encrypting Routes
    pub ca_cert: String,
}

/// Ensure the CA chain and serving certificates, returning the CA once everything is issued
pub(crate) async fn ensure(ctx: &Reconciler, cr: &Cryostat) -> Result<Option<TlsMaterial>, Interrupt> {
    if !cr.spec.tls_enabled() {
        return Ok(None);
    }
    if !ctx.capabilities.cert_manager {
        warn!("cert-manager is not installed, continuing without TLS");
        return Ok(None);
    }

    ctx.ensure_exists(&keystore_secret(cr)).await?;
    ctx.ensure_exists(&self_signed_issuer(cr)).await?;
    let ca = ctx.ensure_exists(&ca_certificate(cr)).await?;
    ctx.ensure_exists(&ca_issuer(cr)).await?;
    let core = ctx.ensure_exists(&core_certificate(cr)).await?;
    let grafana = ctx.ensure_exists(&grafana_certificate(cr)).await?;

    if let Some(pending) = [&ca, &core, &grafana].into_iter().find(|c| !c.is_ready()) {
        return Err(Interrupt::NotReady(format!(
            "Certificate {} is not ready",
            pending.name_any()
        )));
    }

    Ok(Some(read_ca(ctx, cr).await?))
}

async fn read_ca(ctx: &Reconciler, cr: &Cryostat) -> Result<TlsMaterial, ReconcilerError> {
    let key = ObjectKey::namespaced(cr.namespace().unwrap_or_default(), ca_name(cr));
    let secret = ctx
        .fetch::<Secret>(&key)
        .await?
        .ok_or_else(|| ReconcilerError::missing::<Secret>(&key))?;
    let ca_cert = secret
        .data
        .as_ref()
        .and_then(|data| data.get(CA_CERT_KEY))
        .ok_or_else(|| ReconcilerError::MissingDependency {
            kind: "Secret key".to_string(),
            key: format!("{key}[{CA_CERT_KEY}]"),
        })?;
    Ok(TlsMaterial {
        ca_cert: String::from_utf8_lossy(&ca_cert.0).into_owned(),
    })
}
