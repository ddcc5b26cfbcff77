//! # Types
//!
//! Core types for the reconciler.

use crate::config::{ClusterCapabilities, OperatorConfig};
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::reconciler::exposure::Exposure;
use crate::controller::store::{ObjectKey, Objects, StoreError, Verb};
use crate::observability;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to {verb} {kind} {key}: {source}")]
    Store {
        verb: Verb,
        kind: String,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Deleting a Deployment built for the other mode failed
    #[error("failed to delete Deployment {key} built for the other mode: {source}")]
    StaleWorkload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("object has no {0}")]
    MissingObjectKey(&'static str),

    #[error("{kind} {key} does not exist")]
    MissingDependency { kind: String, key: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconcilerError {
    /// Label used for the error metric
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Store { .. } => "store",
            Self::StaleWorkload { .. } => "stale-workload",
            Self::ConfigurationMismatch(_) => "configuration-mismatch",
            Self::MissingObjectKey(_) => "missing-object-key",
            Self::MissingDependency { .. } => "missing-dependency",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Errors retried on a fixed schedule instead of the exponential backoff
    #[must_use]
    pub fn has_fixed_retry(&self) -> bool {
        matches!(self, Self::StaleWorkload { .. })
    }

    pub(crate) fn missing<K: Resource<DynamicType = ()>>(key: &ObjectKey) -> Self {
        Self::MissingDependency {
            kind: K::kind(&()).into_owned(),
            key: key.to_string(),
        }
    }
}

/// Why a pass stopped before converging
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// Waiting on the platform, e.g. a Route host or a Certificate. Requeued, not an error.
    NotReady(String),
    Failed(ReconcilerError),
}

impl From<ReconcilerError> for Interrupt {
    fn from(error: ReconcilerError) -> Self {
        Self::Failed(error)
    }
}

impl From<serde_json::Error> for Interrupt {
    fn from(error: serde_json::Error) -> Self {
        Self::Failed(ReconcilerError::Serialization(error))
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: ExponentialBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(start_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: ExponentialBackoff::new(start_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context of every reconciliation
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub objects: Objects,
    pub capabilities: ClusterCapabilities,
    pub config: OperatorConfig,
    /// How Services are exposed, chosen once from the platform
    pub exposure: Exposure,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(objects: Objects, capabilities: ClusterCapabilities, config: OperatorConfig) -> Self {
        Self {
            objects,
            capabilities,
            exposure: Exposure::for_platform(capabilities.platform),
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reset the backoff of a resource after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                if state.error_count > 0 {
                    debug!(resource = resource_key, "Backoff reset");
                }
                state.reset();
            }
        }
    }

    pub(crate) async fn fetch<K>(&self, key: &ObjectKey) -> Result<Option<K>, ReconcilerError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let result = self.objects.get::<K>(key).await;
        observed::<K, _>(Verb::Get, key, result)
    }

    pub(crate) async fn create<K>(&self, object: &K) -> Result<K, ReconcilerError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let key = key_of(object)?;
        debug!(kind = %K::kind(&()), key = %key, "Creating");
        let result = self.objects.create(object).await;
        observed::<K, _>(Verb::Create, &key, result)
    }

    pub(crate) async fn update<K>(&self, object: &K) -> Result<K, ReconcilerError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let key = key_of(object)?;
        debug!(kind = %K::kind(&()), key = %key, "Updating");
        let result = self.objects.update(object).await;
        observed::<K, _>(Verb::Update, &key, result)
    }

    pub(crate) async fn update_status<K>(&self, object: &K) -> Result<K, ReconcilerError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let key = key_of(object)?;
        let result = self.objects.update_status(object).await;
        observed::<K, _>(Verb::UpdateStatus, &key, result)
    }

    /// Delete an object; not-found is success. Returns whether it existed.
    pub(crate) async fn remove<K>(&self, key: &ObjectKey) -> Result<bool, StoreError>
    where
        K: Resource<DynamicType = ()>,
    {
        let result = self.objects.delete::<K>(key).await;
        let kind = K::kind(&());
        match &result {
            Ok(true) => {
                debug!(kind = %kind, key = %key, "Deleted");
                observability::metrics::record_object_operation(&kind, Verb::Delete.as_str());
            }
            Ok(false) => {
                observability::metrics::record_object_operation(&kind, Verb::Delete.as_str());
            }
            Err(_) => {
                observability::metrics::increment_object_operation_errors(&kind, Verb::Delete.as_str());
            }
        }
        result
    }

    /// [`remove`](Self::remove) with the store error wrapped for the caller
    pub(crate) async fn delete<K>(&self, key: &ObjectKey) -> Result<bool, ReconcilerError>
    where
        K: Resource<DynamicType = ()>,
    {
        self.remove::<K>(key)
            .await
            .map_err(|source| store_error::<K>(Verb::Delete, key, source))
    }

    /// Create `desired` unless an object with its name exists; the live object is never changed
    pub(crate) async fn ensure_exists<K>(&self, desired: &K) -> Result<K, ReconcilerError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let key = key_of(desired)?;
        match self.fetch::<K>(&key).await? {
            Some(live) => Ok(live),
            None => self.create(desired).await,
        }
    }
}

fn key_of<K: Resource>(object: &K) -> Result<ObjectKey, ReconcilerError> {
    ObjectKey::of(object).ok_or(ReconcilerError::MissingObjectKey("metadata.name"))
}

fn store_error<K: Resource<DynamicType = ()>>(
    verb: Verb,
    key: &ObjectKey,
    source: StoreError,
) -> ReconcilerError {
    ReconcilerError::Store {
        verb,
        kind: K::kind(&()).into_owned(),
        key: key.to_string(),
        source,
    }
}

/// Count the call and attach kind and key to a failure
fn observed<K, T>(
    verb: Verb,
    key: &ObjectKey,
    result: Result<T, StoreError>,
) -> Result<T, ReconcilerError>
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    match result {
        Ok(value) => {
            observability::metrics::record_object_operation(&kind, verb.as_str());
            Ok(value)
        }
        Err(source) => {
            observability::metrics::increment_object_operation_errors(&kind, verb.as_str());
            Err(store_error::<K>(verb, key, source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::{KindRegistry, MemoryStore};
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    fn reconciler(store: &MemoryStore) -> Reconciler {
        let capabilities = ClusterCapabilities {
            platform: crate::config::Platform::Kubernetes,
            cert_manager: false,
        };
        let objects = Objects::new(
            Arc::new(store.clone()),
            Arc::new(KindRegistry::for_cluster(capabilities)),
        );
        Reconciler::new(objects, capabilities, OperatorConfig::default())
    }

    fn secret(value: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("creds".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            string_data: Some([("password".to_string(), value.to_string())].into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ensure_exists_never_overwrites() {
        let store = MemoryStore::new();
        let ctx = reconciler(&store);
        ctx.ensure_exists(&secret("first")).await.unwrap();
        let live = ctx.ensure_exists(&secret("second")).await.unwrap();
        assert_eq!(
            live.string_data.and_then(|d| d.get("password").cloned()).as_deref(),
            Some("first")
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn store_failures_name_kind_and_key() {
        let store = MemoryStore::new();
        store.fail(crate::controller::store::Verb::Create, "Secret");
        let ctx = reconciler(&store);
        let error = ctx.ensure_exists(&secret("value")).await.unwrap_err();
        assert_eq!(error.reason(), "store");
        assert!(error.to_string().starts_with("failed to create Secret default/creds"));
    }

    #[test]
    fn only_stale_workload_has_fixed_retry() {
        let stale = ReconcilerError::StaleWorkload {
            key: "default/demo".to_string(),
            source: StoreError::Transport("connection reset".to_string()),
        };
        assert!(stale.has_fixed_retry());
        assert!(!ReconcilerError::ConfigurationMismatch("x".to_string()).has_fixed_retry());
    }
}
