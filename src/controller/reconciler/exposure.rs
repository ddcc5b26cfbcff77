//! # Exposure
//!
//! Makes the Cryostat Services reachable from outside the cluster and
//! resolves the URL each one is reachable at.
//!
//! The strategy is fixed at startup from the platform:
//!
//! - **Route**: every Service gets a Route. The router assigns the host
//!   asynchronously; until it does, the endpoint is not ready.
//! - **Ingress**: only endpoints with an `ingressSpec` in the instance's
//!   `networkOptions` are exposed. No configuration means no exposure.

use crate::config::Platform;
use crate::controller::reconciler::tls::TlsMaterial;
use crate::controller::reconciler::types::{Interrupt, Reconciler, ReconcilerError};
use crate::controller::reconciler::workload;
use crate::controller::store::ObjectKey;
use crate::crd::{Cryostat, Route, RouteTlsConfig};
use crate::resources::deployment::DeploymentMode;
use crate::resources::network::{ingress, ingress_url, route, route_host};
use crate::resources::services::{exposed_target_port, service};
use crate::resources::{Endpoint, ExternalUrl, Scheme, ServiceUrls};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Route,
    Ingress,
}

impl Exposure {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::OpenShift => Self::Route,
            Platform::Kubernetes => Self::Ingress,
        }
    }

    /// Expose `service` and resolve its URL. `None` means the endpoint is not exposed.
    pub(crate) async fn expose(
        self,
        ctx: &Reconciler,
        cr: &Cryostat,
        service: &Service,
        tls: Option<&TlsMaterial>,
    ) -> Result<Option<ExternalUrl>, Interrupt> {
        let service_name = service.name_any();
        let endpoint = Endpoint::for_service(cr, &service_name).ok_or_else(|| {
            ReconcilerError::ConfigurationMismatch(format!(
                "Service {service_name} is not an endpoint of Cryostat {}",
                cr.name_any()
            ))
        })?;

        match self {
            Self::Route => expose_with_route(ctx, cr, service, tls).await.map(Some),
            Self::Ingress => Ok(expose_with_ingress(ctx, cr, endpoint, &service_name).await?),
        }
    }

    /// Remove whatever exposes the Service named `service_name`
    pub(crate) async fn withdraw(
        self,
        ctx: &Reconciler,
        cr: &Cryostat,
        service_name: &str,
    ) -> Result<(), ReconcilerError> {
        let key = ObjectKey::namespaced(cr.namespace().unwrap_or_default(), service_name);
        let existed = match self {
            Self::Route => ctx.delete::<Route>(&key).await?,
            Self::Ingress => ctx.delete::<Ingress>(&key).await?,
        };
        if existed {
            info!(service = service_name, "Withdrew exposure");
        }
        Ok(())
    }
}

async fn expose_with_route(
    ctx: &Reconciler,
    cr: &Cryostat,
    service: &Service,
    tls: Option<&TlsMaterial>,
) -> Result<ExternalUrl, Interrupt> {
    let service_name = service.name_any();
    let tls_config = match tls {
        Some(material) => RouteTlsConfig::reencrypt(material.ca_cert.as_str()),
        None => RouteTlsConfig::edge(),
    };
    let desired = route(cr, &service_name, exposed_target_port(service), tls_config);
    let key = ObjectKey::namespaced(cr.namespace().unwrap_or_default(), &service_name);

    let live = match ctx.fetch::<Route>(&key).await? {
        None => ctx.create(&desired).await?,
        Some(live) if live.spec.routes_like(&desired.spec) => live,
        Some(mut live) => {
            // The platform-assigned host is kept
            live.spec.retarget(desired.spec);
            ctx.update(&live).await?
        }
    };

    match route_host(&live) {
        // Both TLS variants terminate at the router
        Some(host) => Ok(ExternalUrl::new(Scheme::Https, host)),
        None => Err(Interrupt::NotReady(format!("Route {key} has no host yet"))),
    }
}

async fn expose_with_ingress(
    ctx: &Reconciler,
    cr: &Cryostat,
    endpoint: Endpoint,
    service_name: &str,
) -> Result<Option<ExternalUrl>, ReconcilerError> {
    let config = cr
        .spec
        .network_options
        .as_ref()
        .and_then(|options| endpoint.network_config(options));
    let Some((config, spec)) = config.and_then(|c| c.ingress_spec.as_ref().map(|s| (c, s))) else {
        debug!(%endpoint, "No ingress configured");
        return Ok(None);
    };

    ctx.ensure_exists(&ingress(cr, service_name, config, spec))
        .await?;
    Ok(Some(ingress_url(spec)))
}

/// Ensure the Services of the instance's mode are present and exposed
///
/// In full mode a Deployment left over from minimal mode is deleted; in
/// minimal mode the Grafana Service, its exposure and a full-mode
/// Deployment are.
pub(crate) async fn ensure_services(
    ctx: &Reconciler,
    cr: &Cryostat,
    tls: Option<&TlsMaterial>,
) -> Result<ServiceUrls, Interrupt> {
    let mut urls = ServiceUrls::default();

    match DeploymentMode::for_instance(cr) {
        DeploymentMode::Full => {
            urls.grafana = ensure_endpoint(ctx, cr, Endpoint::Grafana, tls).await?;
            workload::remove_stale(ctx, cr, DeploymentMode::Minimal).await?;
        }
        DeploymentMode::Minimal => {
            let grafana = Endpoint::Grafana.service_name(cr);
            ctx.exposure.withdraw(ctx, cr, &grafana).await?;
            let key = ObjectKey::namespaced(cr.namespace().unwrap_or_default(), grafana);
            ctx.delete::<Service>(&key).await?;
            workload::remove_stale(ctx, cr, DeploymentMode::Full).await?;
        }
    }

    for endpoint in [Endpoint::Core, Endpoint::Command] {
        let url = ensure_endpoint(ctx, cr, endpoint, tls).await?;
        urls.set(endpoint, url);
    }
    Ok(urls)
}

async fn ensure_endpoint(
    ctx: &Reconciler,
    cr: &Cryostat,
    endpoint: Endpoint,
    tls: Option<&TlsMaterial>,
) -> Result<Option<ExternalUrl>, Interrupt> {
    let service = ctx.ensure_exists(&service(cr, endpoint)).await?;
    ctx.exposure.expose(ctx, cr, &service, tls).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterCapabilities, OperatorConfig};
    use crate::controller::store::{KindRegistry, MemoryStore, Objects};
    use crate::crd::{CryostatSpec, NetworkConfiguration, NetworkConfigurationList, TlsTermination};
    use crate::resources::test_support::cryostat;
    use k8s_openapi::api::networking::v1::{IngressRule, IngressSpec, IngressTLS};
    use std::sync::Arc;

    fn reconciler(store: &MemoryStore, platform: Platform) -> Reconciler {
        let capabilities = ClusterCapabilities {
            platform,
            cert_manager: false,
        };
        let objects = Objects::new(
            Arc::new(store.clone()),
            Arc::new(KindRegistry::for_cluster(capabilities)),
        );
        Reconciler::new(objects, capabilities, OperatorConfig::default())
    }

    fn ingress_config(host: &str, tls: bool) -> NetworkConfiguration {
        NetworkConfiguration {
            ingress_spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(host.to_string()),
                    http: None,
                }]),
                tls: tls.then(|| vec![IngressTLS::default()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unknown_service_is_a_configuration_mismatch() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store, Platform::OpenShift);
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let mut other = service(&cr, Endpoint::Core);
        other.metadata.name = Some("unrelated".to_string());

        let result = ctx.exposure.expose(&ctx, &cr, &other, None).await;
        assert!(matches!(
            result,
            Err(Interrupt::Failed(ReconcilerError::ConfigurationMismatch(_)))
        ));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn route_without_host_is_not_ready() {
        let store = MemoryStore::new();
        store.assign_route_hosts(false);
        let ctx = reconciler(&store, Platform::OpenShift);
        let cr = cryostat("demo", "default", CryostatSpec::default());

        let result = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Core), None)
            .await;
        assert!(matches!(result, Err(Interrupt::NotReady(_))));

        store.assign_route_hosts(true);
        let url = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Core), None)
            .await
            .unwrap();
        assert_eq!(
            url.map(|u| u.to_string()).as_deref(),
            Some("https://demo-default.apps.example.com")
        );
    }

    #[tokio::test]
    async fn route_tls_switches_to_reencrypt_without_losing_host() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store, Platform::OpenShift);
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let svc = service(&cr, Endpoint::Core);
        ctx.exposure.expose(&ctx, &cr, &svc, None).await.unwrap();

        let material = TlsMaterial {
            ca_cert: "-----BEGIN CERTIFICATE-----".to_string(),
        };
        let url = ctx
            .exposure
            .expose(&ctx, &cr, &svc, Some(&material))
            .await
            .unwrap();
        assert_eq!(url.map(|u| u.host).as_deref(), Some("demo-default.apps.example.com"));

        let key = ObjectKey::namespaced("default", "demo");
        let live = ctx.fetch::<Route>(&key).await.unwrap().unwrap();
        let tls = live.spec.tls.unwrap();
        assert_eq!(tls.termination, TlsTermination::Reencrypt);
        assert_eq!(tls.destination_ca_certificate.as_deref(), Some("-----BEGIN CERTIFICATE-----"));

        let writes = store.writes();
        ctx.exposure
            .expose(&ctx, &cr, &svc, Some(&material))
            .await
            .unwrap();
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn route_update_keeps_fields_set_by_others() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store, Platform::OpenShift);
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let svc = service(&cr, Endpoint::Core);
        ctx.exposure.expose(&ctx, &cr, &svc, None).await.unwrap();

        let key = ObjectKey::namespaced("default", "demo");
        let mut live = ctx.fetch::<Route>(&key).await.unwrap().unwrap();
        live.spec
            .unmodelled
            .insert("wildcardPolicy".to_string(), serde_json::json!("None"));
        live.spec
            .to
            .unmodelled
            .insert("weight".to_string(), serde_json::json!(100));
        ctx.update(&live).await.unwrap();

        let writes = store.writes();
        ctx.exposure.expose(&ctx, &cr, &svc, None).await.unwrap();
        assert_eq!(store.writes(), writes);

        let material = TlsMaterial {
            ca_cert: "-----BEGIN CERTIFICATE-----".to_string(),
        };
        ctx.exposure
            .expose(&ctx, &cr, &svc, Some(&material))
            .await
            .unwrap();
        assert_eq!(store.writes(), writes + 1);
        let live = ctx.fetch::<Route>(&key).await.unwrap().unwrap();
        assert_eq!(
            live.spec.unmodelled.get("wildcardPolicy"),
            Some(&serde_json::json!("None"))
        );
        assert_eq!(live.spec.to.unmodelled.get("weight"), Some(&serde_json::json!(100)));
        assert_eq!(
            live.spec.tls.map(|tls| tls.termination),
            Some(TlsTermination::Reencrypt)
        );
    }

    #[tokio::test]
    async fn ingress_requires_configuration() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store, Platform::Kubernetes);
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let url = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Core), None)
            .await
            .unwrap();
        assert_eq!(url, None);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn ingress_url_follows_configuration() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store, Platform::Kubernetes);
        let cr = cryostat(
            "demo",
            "default",
            CryostatSpec {
                network_options: Some(NetworkConfigurationList {
                    core_config: Some(ingress_config("testing.cryostat", true)),
                    command_config: Some(ingress_config("testing.cryostat-command", false)),
                    grafana_config: Some(NetworkConfiguration::default()),
                }),
                ..Default::default()
            },
        );

        let core = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Core), None)
            .await
            .unwrap();
        assert_eq!(core.map(|u| u.to_string()).as_deref(), Some("https://testing.cryostat"));

        let command = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Command), None)
            .await
            .unwrap();
        assert_eq!(
            command.map(|u| u.to_string()).as_deref(),
            Some("http://testing.cryostat-command")
        );

        let grafana = ctx
            .exposure
            .expose(&ctx, &cr, &service(&cr, Endpoint::Grafana), None)
            .await
            .unwrap();
        assert_eq!(grafana, None);
        assert_eq!(store.count("Ingress"), 2);
    }
}
