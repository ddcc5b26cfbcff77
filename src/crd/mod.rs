//! # Custom Resource Definitions
//!
//! CRD types owned or consumed by the operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `Cryostat` resource and its configuration blocks
//! - `status.rs` - Status written back by the reconciler
//! - `openshift.rs` - OpenShift `Route` and `ConsoleLink` (consumed, not owned)
//! - `cert_manager.rs` - cert-manager `Issuer` and `Certificate` (consumed, not owned)

mod cert_manager;
mod openshift;
mod spec;
mod status;

pub use cert_manager::{
    CaIssuer, Certificate, CertificateCondition, CertificateSpec, CertificateStatus, Issuer,
    IssuerRef, IssuerSpec, Keystores, Pkcs12Keystore, SecretKeySelector, SelfSignedIssuer,
};
pub use openshift::{
    ConsoleLink, ConsoleLinkSpec, InsecureEdgeTerminationPolicy, NamespaceDashboardSpec, Route,
    RouteIngress, RoutePort, RouteSpec, RouteStatus, RouteTargetReference, RouteTlsConfig,
    TlsTermination,
};
pub use spec::{
    CertificateSecret, Cryostat, CryostatSpec, NetworkConfiguration, NetworkConfigurationList,
    PersistentVolumeClaimConfig, StorageConfiguration, TemplateConfigMap,
};
pub use status::CryostatStatus;
