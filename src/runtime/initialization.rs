//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client creation and capability discovery.

use crate::config::{ClusterCapabilities, LogFormat, OperatorConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::store::{KindRegistry, KubeStore, Objects};
use crate::observability;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("capabilities", &self.reconciler.capabilities)
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence over the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cryostat_operator=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
pub async fn initialize(config: OperatorConfig) -> Result<InitializationResult> {
    // Must run before any client is built: rustls 0.23 has no implicit provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    init_tracing(config.log_format);

    info!("Starting Cryostat operator");
    info!(
        "Build info: date={}, revision={}",
        env!("CRYOSTAT_OPERATOR_BUILD_DATE"),
        env!("CRYOSTAT_OPERATOR_REVISION")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });
    let server_state_clone = Arc::clone(&server_state);
    let port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let capabilities = discover_capabilities(&client, &config).await?;
    info!(
        platform = %capabilities.platform,
        cert_manager = capabilities.cert_manager,
        "Discovered cluster capabilities"
    );

    let registry = Arc::new(KindRegistry::for_cluster(capabilities));
    let objects = Objects::new(Arc::new(KubeStore::new(client.clone())), registry);
    let reconciler = Arc::new(Reconciler::new(objects, capabilities, config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Decide the platform and cert-manager availability from the served API groups
async fn discover_capabilities(
    client: &Client,
    config: &OperatorConfig,
) -> Result<ClusterCapabilities> {
    let groups = client
        .list_api_groups()
        .await
        .context("Failed to list API groups")?;
    let names: Vec<&str> = groups.groups.iter().map(|g| g.name.as_str()).collect();
    Ok(ClusterCapabilities::discover(
        config.platform,
        names.iter().copied(),
    ))
}

/// Wait for the HTTP server to bind before the controller starts
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let start_time = Instant::now();
    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > SERVER_STARTUP_TIMEOUT {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                SERVER_STARTUP_TIMEOUT.as_secs()
            ));
        }
        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
}
