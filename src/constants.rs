//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Durations and ports here are defaults; [`crate::config::OperatorConfig`]
//! lets each of them be overridden from the environment.

/// Finalizer placed on every `Cryostat` until cluster-scoped cleanup completes
pub const CRYOSTAT_FINALIZER: &str = "operator.cryostat.io/cryostat.finalizer";

/// Annotation recording which topology a Deployment was built for
pub const DEPLOYMENT_MODE_ANNOTATION: &str = "operator.cryostat.io/deployment-mode";

/// Annotation holding the sha256 of the pod template last written by the operator
pub const POD_TEMPLATE_HASH_ANNOTATION: &str = "operator.cryostat.io/pod-template-hash";

/// OpenShift namespace annotation listing the supplemental group range
pub const SUPPLEMENTAL_GROUPS_ANNOTATION: &str = "openshift.io/sa.scc.supplemental-groups";

/// Field manager reported to the API server
pub const FIELD_MANAGER: &str = "cryostat-operator";

/// Environment variable overriding the core application image
pub const CORE_IMAGE_ENV: &str = "RELATED_IMAGE_CORE";

/// Environment variable overriding the JFR datasource image
pub const DATASOURCE_IMAGE_ENV: &str = "RELATED_IMAGE_DATASOURCE";

/// Environment variable overriding the Grafana dashboard image
pub const GRAFANA_IMAGE_ENV: &str = "RELATED_IMAGE_GRAFANA";

pub const DEFAULT_CORE_IMAGE: &str = "quay.io/cryostat/cryostat:latest";
pub const DEFAULT_DATASOURCE_IMAGE: &str = "quay.io/cryostat/jfr-datasource:latest";
pub const DEFAULT_GRAFANA_IMAGE: &str = "quay.io/cryostat/cryostat-grafana-dashboard:latest";

/// fsGroup used when the namespace does not constrain supplemental groups
pub const DEFAULT_FS_GROUP: i64 = 18500;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Requeue interval while a Route host or a Certificate is still being provisioned (seconds)
pub const DEFAULT_NOT_READY_REQUEUE_SECS: u64 = 5;

/// Retry interval after failing to delete a Deployment built for the other topology (seconds)
pub const DEFAULT_STALE_WORKLOAD_REQUEUE_SECS: u64 = 10;

/// Exponential backoff starting value for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_START_SECS: u64 = 1;

/// Exponential backoff ceiling for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default persistent volume claim size
pub const DEFAULT_STORAGE_REQUEST: &str = "500Mi";

/// ClusterRole bound to each Cryostat's service account
pub const CLUSTER_ROLE_NAME: &str = "cryostat-operator-cryostat";

/// Container ports
pub const CORE_WEB_PORT: i32 = 8181;
pub const CORE_COMMAND_PORT: i32 = 9090;
pub const CORE_JMX_PORT: i32 = 9091;
pub const GRAFANA_PORT: i32 = 3000;
pub const DATASOURCE_PORT: i32 = 8080;
