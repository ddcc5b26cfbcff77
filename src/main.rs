//! # Cryostat Operator
//!
//! A Kubernetes operator that deploys Cryostat, the JDK Flight Recorder
//! management service, from a `Cryostat` custom resource.
//!
//! ## Overview
//!
//! For every `Cryostat` the operator converges:
//!
//! 1. **Storage and credentials** - PersistentVolumeClaim, Grafana and JMX secrets
//! 2. **TLS** - A private CA chain issued by cert-manager, when installed
//! 3. **RBAC** - ServiceAccount, Role, RoleBinding and ClusterRoleBinding
//! 4. **Exposure** - Services plus Routes on OpenShift or Ingresses elsewhere
//! 5. **Workload** - The Cryostat Deployment, in full or minimal mode
//! 6. **Status** - The externally reachable application URL
//!
//! Cluster-scoped dependents are removed by a finalizer on deletion.

use anyhow::Result;
use clap::Parser;
use cryostat_operator::config::{OperatorConfig, PlatformSetting};
use cryostat_operator::runtime::{initialization, watch_loop};

/// Cryostat operator
#[derive(Parser, Debug)]
#[command(name = "cryostat-operator", version, about)]
struct Args {
    /// Platform to target; `auto` detects OpenShift from the served API groups
    #[arg(long, env = "CRYOSTAT_PLATFORM", value_enum)]
    platform: Option<PlatformSetting>,

    /// Port of the metrics and probe server
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = OperatorConfig::from_env();
    if let Some(platform) = args.platform {
        config.platform = platform;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }

    let init = initialization::initialize(config).await?;
    watch_loop::run_watch_loop(init.client, init.reconciler, init.server_state).await
}
