//! # OpenShift Types
//!
//! Minimal typed views of the OpenShift `Route` and `ConsoleLink` kinds.
//! Only the fields the operator reads or writes are modelled. The Route
//! spec, its target and its TLS block keep every other field in `unmodelled`,
//! so a Route read from the cluster and replaced keeps settings such as
//! `wildcardPolicy`, `to.weight` or `tls.certificate`.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Route",
    group = "route.openshift.io",
    version = "v1",
    namespaced,
    status = "RouteStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Assigned by the router when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub to: RouteTargetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTlsConfig>,
    #[serde(flatten)]
    pub unmodelled: BTreeMap<String, Value>,
}

impl RouteSpec {
    /// Target, port and TLS settings equal `desired`'s, unmodelled fields aside
    #[must_use]
    pub fn routes_like(&self, desired: &Self) -> bool {
        let tls_like = match (&self.tls, &desired.tls) {
            (Some(live), Some(desired)) => {
                live.termination == desired.termination
                    && live.insecure_edge_termination_policy == desired.insecure_edge_termination_policy
                    && live.destination_ca_certificate == desired.destination_ca_certificate
            }
            (live, desired) => live.is_none() && desired.is_none(),
        };
        self.to.kind == desired.to.kind
            && self.to.name == desired.to.name
            && self.port == desired.port
            && tls_like
    }

    /// Take target, port and TLS settings from `desired`, keeping unmodelled fields
    pub fn retarget(&mut self, desired: Self) {
        self.to.kind = desired.to.kind;
        self.to.name = desired.to.name;
        self.port = desired.port;
        match (&mut self.tls, desired.tls) {
            (Some(live), Some(tls)) => {
                live.termination = tls.termination;
                live.insecure_edge_termination_policy = tls.insecure_edge_termination_policy;
                live.destination_ca_certificate = tls.destination_ca_certificate;
            }
            (live, tls) => *live = tls,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
    #[serde(flatten)]
    pub unmodelled: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TlsTermination {
    Edge,
    Passthrough,
    Reencrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum InsecureEdgeTerminationPolicy {
    Allow,
    None,
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTlsConfig {
    pub termination: TlsTermination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<InsecureEdgeTerminationPolicy>,
    #[serde(
        default,
        rename = "destinationCACertificate",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_ca_certificate: Option<String>,
    #[serde(flatten)]
    pub unmodelled: BTreeMap<String, Value>,
}

impl RouteTlsConfig {
    /// Edge termination redirecting plain HTTP to HTTPS
    #[must_use]
    pub fn edge() -> Self {
        Self {
            termination: TlsTermination::Edge,
            insecure_edge_termination_policy: Some(InsecureEdgeTerminationPolicy::Redirect),
            destination_ca_certificate: None,
            unmodelled: BTreeMap::new(),
        }
    }

    /// Re-encrypt towards a backend serving a certificate signed by `ca_cert`
    #[must_use]
    pub fn reencrypt(ca_cert: impl Into<String>) -> Self {
        Self {
            termination: TlsTermination::Reencrypt,
            insecure_edge_termination_policy: None,
            destination_ca_certificate: Some(ca_cert.into()),
            unmodelled: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,
}

/// Link shown in the OpenShift console. Cluster-scoped.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(kind = "ConsoleLink", group = "console.openshift.io", version = "v1")]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLinkSpec {
    pub text: String,
    pub href: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_dashboard: Option<NamespaceDashboardSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDashboardSpec {
    #[serde(default)]
    pub namespaces: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_route() -> Route {
        serde_json::from_value(json!({
            "apiVersion": "route.openshift.io/v1",
            "kind": "Route",
            "metadata": { "name": "demo", "namespace": "default" },
            "spec": {
                "host": "demo-default.apps.example.com",
                "wildcardPolicy": "None",
                "to": { "kind": "Service", "name": "demo", "weight": 100 },
                "tls": {
                    "termination": "edge",
                    "insecureEdgeTerminationPolicy": "Redirect",
                    "certificate": "-----BEGIN CERTIFICATE-----"
                }
            }
        }))
        .unwrap()
    }

    fn desired(tls: RouteTlsConfig) -> RouteSpec {
        RouteSpec {
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: "demo".to_string(),
                ..Default::default()
            },
            tls: Some(tls),
            ..Default::default()
        }
    }

    #[test]
    fn server_fields_do_not_count_as_changes() {
        let live = live_route();
        assert!(live.spec.routes_like(&desired(RouteTlsConfig::edge())));
        assert!(!live.spec.routes_like(&desired(RouteTlsConfig::reencrypt("ca"))));
    }

    #[test]
    fn retarget_keeps_unmodelled_fields() {
        let mut live = live_route();
        live.spec.retarget(desired(RouteTlsConfig::reencrypt("ca")));

        let value = serde_json::to_value(&live).unwrap();
        let spec = &value["spec"];
        assert_eq!(spec["wildcardPolicy"], "None");
        assert_eq!(spec["host"], "demo-default.apps.example.com");
        assert_eq!(spec["to"]["weight"], 100);
        assert_eq!(spec["tls"]["termination"], "reencrypt");
        assert_eq!(spec["tls"]["destinationCACertificate"], "ca");
        assert_eq!(spec["tls"]["certificate"], "-----BEGIN CERTIFICATE-----");
        assert!(spec["tls"].get("insecureEdgeTerminationPolicy").is_none());
    }
}
