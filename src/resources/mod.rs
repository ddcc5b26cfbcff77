//! # Resources
//!
//! Pure builders mapping a `Cryostat` to the manifests of its dependent
//! objects. Nothing here talks to the cluster; the reconciler decides when
//! each object is created, updated or deleted.
//!
//! ## Module Structure
//!
//! - `storage.rs` - PersistentVolumeClaim
//! - `secrets.rs` - Generated credential secrets
//! - `certificates.rs` - cert-manager Issuers and Certificates
//! - `rbac.rs` - ServiceAccount, Role, RoleBinding, ClusterRoleBinding
//! - `services.rs` - Core, command channel and Grafana Services
//! - `network.rs` - Route and Ingress exposure
//! - `deployment.rs` - The Cryostat Deployment and its pod template
//! - `console.rs` - OpenShift ConsoleLink

pub mod certificates;
pub mod console;
pub mod deployment;
pub mod network;
pub mod rbac;
pub mod secrets;
pub mod services;
pub mod storage;

use crate::crd::{Cryostat, NetworkConfiguration, NetworkConfigurationList};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata for a namespaced object controlled by the instance
pub fn owned_meta(cr: &Cryostat, name: impl Into<String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: cr.namespace(),
        owner_references: cr.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}

/// Name shared by every cluster-scoped object created for the instance
///
/// Derived from the namespace and name so that instances with the same name
/// in different namespaces never collide.
pub fn cluster_scoped_name(cr: &Cryostat) -> String {
    let key = format!("{}/{}", cr.namespace().unwrap_or_default(), cr.name_any());
    format!("cryostat-{:x}", Sha256::digest(key.as_bytes()))
}

/// Labels selecting the Cryostat pod
pub fn selector_labels(cr: &Cryostat) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), cr.name_any()),
        ("kind".to_string(), "cryostat".to_string()),
    ])
}

pub fn app_labels(cr: &Cryostat) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), cr.name_any())])
}

/// The three externally reachable endpoints of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Web UI and HTTP API
    Core,
    /// WebSocket command channel
    Command,
    /// Grafana dashboard
    Grafana,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Core, Endpoint::Command, Endpoint::Grafana];

    pub fn service_name(self, cr: &Cryostat) -> String {
        let name = cr.name_any();
        match self {
            Self::Core => name,
            Self::Command => format!("{name}-command"),
            Self::Grafana => format!("{name}-grafana"),
        }
    }

    /// Match a Service name against the three derived names
    pub fn for_service(cr: &Cryostat, service_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.service_name(cr) == service_name)
    }

    pub fn network_config(self, options: &NetworkConfigurationList) -> Option<&NetworkConfiguration> {
        match self {
            Self::Core => options.core_config.as_ref(),
            Self::Command => options.command_config.as_ref(),
            Self::Grafana => options.grafana_config.as_ref(),
        }
    }

    pub fn component(self) -> &'static str {
        match self {
            Self::Core => "cryostat",
            Self::Command => "command-channel",
            Self::Grafana => "grafana",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Port the endpoint is reached on from outside the cluster
    pub fn external_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Https => f.write_str("https"),
        }
    }
}

/// Externally reachable address of an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalUrl {
    pub scheme: Scheme,
    pub host: String,
}

impl ExternalUrl {
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
        }
    }
}

impl fmt::Display for ExternalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

/// URLs resolved during one reconcile pass. Only the core URL is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUrls {
    pub core: Option<ExternalUrl>,
    pub command: Option<ExternalUrl>,
    pub grafana: Option<ExternalUrl>,
}

impl ServiceUrls {
    pub fn set(&mut self, endpoint: Endpoint, url: Option<ExternalUrl>) {
        match endpoint {
            Endpoint::Core => self.core = url,
            Endpoint::Command => self.command = url,
            Endpoint::Grafana => self.grafana = url,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crd::{Cryostat, CryostatSpec};

    /// A `Cryostat` as read back from the API server, with a uid for owner references
    pub fn cryostat(name: &str, namespace: &str, spec: CryostatSpec) -> Cryostat {
        let mut cr = Cryostat::new(name, spec);
        cr.metadata.namespace = Some(namespace.to_string());
        cr.metadata.uid = Some("0b4a1d52-8b5f-4a3c-9f4e-3c1d2e5f6a7b".to_string());
        cr
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::cryostat;
    use super::*;
    use crate::crd::CryostatSpec;

    #[test]
    fn cluster_scoped_name_hashes_namespace_and_name() {
        let cr = cryostat("cryostat", "default", CryostatSpec::default());
        assert_eq!(
            cluster_scoped_name(&cr),
            "cryostat-9ecd5050500c2566765bc593edfcce12434283e5da32a27476bc4a1569304a02"
        );
    }

    #[test]
    fn owned_meta_sets_controller_reference() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let meta = owned_meta(&cr, "demo-jmx-auth");
        let owners = meta.owner_references.unwrap_or_default();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Cryostat");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(meta.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn endpoints_resolve_from_service_names() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        assert_eq!(Endpoint::for_service(&cr, "demo"), Some(Endpoint::Core));
        assert_eq!(Endpoint::for_service(&cr, "demo-command"), Some(Endpoint::Command));
        assert_eq!(Endpoint::for_service(&cr, "demo-grafana"), Some(Endpoint::Grafana));
        assert_eq!(Endpoint::for_service(&cr, "demo-other"), None);
    }

    #[test]
    fn url_display() {
        let url = ExternalUrl::new(Scheme::Https, "demo.apps.example.com");
        assert_eq!(url.to_string(), "https://demo.apps.example.com");
        assert_eq!(Scheme::Http.external_port(), 80);
    }
}
