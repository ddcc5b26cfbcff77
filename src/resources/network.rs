//! Route and Ingress manifests exposing a Service outside the cluster.

use crate::crd::{
    Cryostat, NetworkConfiguration, Route, RoutePort, RouteSpec, RouteTargetReference,
    RouteTlsConfig,
};
use crate::resources::{owned_meta, ExternalUrl, Scheme};
use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Route with the same name as the Service it targets
pub fn route(
    cr: &Cryostat,
    service_name: &str,
    target_port: Option<IntOrString>,
    tls: RouteTlsConfig,
) -> Route {
    Route {
        metadata: owned_meta(cr, service_name),
        spec: route_spec(service_name, target_port, tls),
        status: None,
    }
}

pub fn route_spec(
    service_name: &str,
    target_port: Option<IntOrString>,
    tls: RouteTlsConfig,
) -> RouteSpec {
    RouteSpec {
        host: None,
        to: RouteTargetReference {
            kind: "Service".to_string(),
            name: service_name.to_string(),
            ..Default::default()
        },
        port: target_port.map(|target_port| RoutePort { target_port }),
        tls: Some(tls),
        ..Default::default()
    }
}

/// Host assigned by the router, once admitted
pub fn route_host(route: &Route) -> Option<&str> {
    route
        .status
        .as_ref()
        .and_then(|status| status.ingress.first())
        .and_then(|ingress| ingress.host.as_deref())
        .filter(|host| !host.is_empty())
}

/// Ingress built verbatim from the user's configuration
pub fn ingress(
    cr: &Cryostat,
    service_name: &str,
    config: &NetworkConfiguration,
    spec: &IngressSpec,
) -> Ingress {
    let mut meta = owned_meta(cr, service_name);
    if !config.annotations.is_empty() {
        meta.annotations = Some(config.annotations.clone());
    }
    if !config.labels.is_empty() {
        meta.labels = Some(config.labels.clone());
    }
    Ingress {
        metadata: meta,
        spec: Some(spec.clone()),
        ..Default::default()
    }
}

/// URL served by an Ingress: https when a TLS block is declared, host from the first rule
pub fn ingress_url(spec: &IngressSpec) -> ExternalUrl {
    let scheme = if spec.tls.is_some() {
        Scheme::Https
    } else {
        Scheme::Http
    };
    let host = spec
        .rules
        .as_ref()
        .and_then(|rules| rules.first())
        .and_then(|rule| rule.host.clone())
        .unwrap_or_default();
    ExternalUrl::new(scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{CryostatSpec, RouteIngress, RouteStatus, TlsTermination};
    use crate::resources::test_support::cryostat;
    use k8s_openapi::api::networking::v1::{IngressRule, IngressTLS};
    use std::collections::BTreeMap;

    #[test]
    fn route_targets_service_port() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let route = route(&cr, "demo", Some(IntOrString::Int(8181)), RouteTlsConfig::edge());
        assert_eq!(route.metadata.name.as_deref(), Some("demo"));
        assert_eq!(route.spec.to.name, "demo");
        assert_eq!(route.spec.port.map(|p| p.target_port), Some(IntOrString::Int(8181)));
        assert_eq!(route.spec.tls.map(|t| t.termination), Some(TlsTermination::Edge));
        assert_eq!(route_host(&Route::new("demo", RouteSpec::default())), None);
    }

    #[test]
    fn route_host_from_first_ingress() {
        let mut route = Route::new("demo", RouteSpec::default());
        route.status = Some(RouteStatus {
            ingress: vec![RouteIngress {
                host: Some("demo.apps.example.com".to_string()),
                router_name: None,
            }],
        });
        assert_eq!(route_host(&route), Some("demo.apps.example.com"));
    }

    #[test]
    fn ingress_passes_configuration_through() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let spec = IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some("testing.demo".to_string()),
                http: None,
            }]),
            ..Default::default()
        };
        let config = NetworkConfiguration {
            annotations: BTreeMap::from([(
                "nginx.ingress.kubernetes.io/backend-protocol".to_string(),
                "HTTPS".to_string(),
            )]),
            labels: BTreeMap::new(),
            ingress_spec: Some(spec.clone()),
        };
        let ingress = ingress(&cr, "demo", &config, &spec);
        assert_eq!(ingress.metadata.annotations.map(|a| a.len()), Some(1));
        assert_eq!(ingress.metadata.labels, None);
        assert_eq!(ingress_url(&spec).to_string(), "http://testing.demo");

        let tls_spec = IngressSpec {
            tls: Some(vec![IngressTLS::default()]),
            ..Default::default()
        };
        assert_eq!(ingress_url(&tls_spec).to_string(), "https://");
    }
}
