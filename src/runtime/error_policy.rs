//! # Error Policy
//!
//! Requeue delays for failed reconciliations.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::Cryostat;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle a reconciliation error
///
/// A failed delete of a Deployment built for the other mode is retried on
/// a fixed delay. Everything else backs off exponentially per resource;
/// the backoff is reset by the next successful pass.
pub fn handle_reconciliation_error(
    obj: Arc<Cryostat>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        namespace = namespace,
        name = name,
        kind = "Cryostat",
        reason = error.reason()
    );
    let _error_guard = error_span.enter();

    error!(error = %error, "Reconciliation failed");
    observability::metrics::increment_reconciliation_errors(error.reason());

    Action::requeue(requeue_delay(&ctx, &format!("{namespace}/{name}"), error))
}

/// Delay before the next attempt for the resource at `resource_key`
pub fn requeue_delay(ctx: &Reconciler, resource_key: &str, error: &ReconcilerError) -> Duration {
    if error.has_fixed_retry() {
        let delay = ctx.config.stale_workload_requeue_duration();
        info!(delay_secs = delay.as_secs(), "Retrying on a fixed delay");
        observability::metrics::increment_requeues_total("fixed-retry");
        return delay;
    }

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key.to_string())
                .or_insert_with(|| {
                    BackoffState::new(ctx.config.backoff_start_secs, ctx.config.backoff_max_secs)
                });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
            (ctx.config.backoff_max_secs, 0)
        }
    };

    info!(
        delay_secs = backoff_seconds,
        error_count, "Retrying with exponential backoff"
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Duration::from_secs(backoff_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterCapabilities, OperatorConfig, Platform};
    use crate::controller::store::{KindRegistry, MemoryStore, Objects, StoreError};

    fn reconciler() -> Reconciler {
        let capabilities = ClusterCapabilities {
            platform: Platform::Kubernetes,
            cert_manager: false,
        };
        let objects = Objects::new(
            Arc::new(MemoryStore::new()),
            Arc::new(KindRegistry::for_cluster(capabilities)),
        );
        Reconciler::new(objects, capabilities, OperatorConfig::default())
    }

    fn transient() -> ReconcilerError {
        ReconcilerError::ConfigurationMismatch("boom".to_string())
    }

    #[test]
    fn backoff_doubles_until_reset() {
        let ctx = reconciler();
        let delays: Vec<u64> = (0..4)
            .map(|_| requeue_delay(&ctx, "default/demo", &transient()).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8]);

        // other instances keep their own state
        assert_eq!(requeue_delay(&ctx, "default/other", &transient()).as_secs(), 1);

        ctx.reset_backoff("default/demo");
        assert_eq!(requeue_delay(&ctx, "default/demo", &transient()).as_secs(), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let ctx = reconciler();
        let last = (0..20)
            .map(|_| requeue_delay(&ctx, "default/demo", &transient()).as_secs())
            .last();
        assert_eq!(last, Some(300));
    }

    #[test]
    fn stale_workload_uses_fixed_delay() {
        let ctx = reconciler();
        let error = ReconcilerError::StaleWorkload {
            key: "default/demo".to_string(),
            source: StoreError::Transport("connection reset".to_string()),
        };
        for _ in 0..3 {
            assert_eq!(requeue_delay(&ctx, "default/demo", &error), Duration::from_secs(10));
        }
    }
}
