//! # Cryostat Spec
//!
//! The `Cryostat` custom resource describes a desired Cryostat installation.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: operator.cryostat.io/v1beta1
//! kind: Cryostat
//! metadata:
//!   name: demo
//!   namespace: default
//! spec:
//!   minimal: false
//!   enableCertManager: true
//!   trustedCertSecrets:
//!     - secretName: my-ca
//!       certificateKey: ca.crt
//! ```

use crate::crd::status::CryostatStatus;
use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
use k8s_openapi::api::networking::v1::IngressSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Cryostat",
    group = "operator.cryostat.io",
    version = "v1beta1",
    namespaced,
    status = "CryostatStatus",
    shortname = "cryostat",
    printcolumn = r#"{"name":"Application URL", "type":"string", "jsonPath":".status.applicationUrl"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CryostatSpec {
    /// Deploy a pared-down Cryostat without the Grafana dashboard and JFR datasource
    #[serde(default)]
    pub minimal: bool,
    /// Use cert-manager to secure in-cluster communication. Defaults to true when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_cert_manager: Option<bool>,
    /// Additional CA certificates Cryostat should trust when connecting to targets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_cert_secrets: Vec<CertificateSecret>,
    /// JFR event templates to preconfigure from ConfigMaps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_templates: Vec<TemplateConfigMap>,
    /// Overrides for the persistent volume claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_options: Option<StorageConfiguration>,
    /// Ingress configuration for each exposed service. Only used on clusters without Routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_options: Option<NetworkConfigurationList>,
}

impl CryostatSpec {
    /// TLS is opt-out: an unset flag means enabled
    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.enable_cert_manager.unwrap_or(true)
    }
}

/// Secret holding a CA certificate to add to Cryostat's trust store
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSecret {
    pub secret_name: String,
    /// Key within the secret holding the certificate. Defaults to `tls.crt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_key: Option<String>,
}

impl CertificateSecret {
    #[must_use]
    pub fn key(&self) -> &str {
        self.certificate_key.as_deref().unwrap_or("tls.crt")
    }
}

/// ConfigMap entry holding a JFR event template
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfigMap {
    pub config_map_name: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PersistentVolumeClaimConfig>,
}

/// Annotations, labels and spec applied to the claim when it is first created
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PersistentVolumeClaimSpec>,
}

/// Per-endpoint ingress configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigurationList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_config: Option<NetworkConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_config: Option<NetworkConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_config: Option<NetworkConfiguration>,
}

/// Passed through verbatim to the generated Ingress
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_spec: Option<IngressSpec>,
}
