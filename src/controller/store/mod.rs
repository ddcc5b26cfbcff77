//! # Object Store
//!
//! Narrow interface to the cluster's declarative object store. The
//! reconciler only ever gets, creates, replaces, replaces status or deletes a
//! single object keyed by kind, namespace and name.
//!
//! [`ObjectStore`] is object-safe and untyped (`DynamicObject`); [`Objects`]
//! layers typed access on top using the [`KindRegistry`] built at startup.
//!
//! ## Module Structure
//!
//! - `registry.rs` - Kinds the operator manages, mapped to their API resources
//! - `cluster.rs` - `KubeStore`, backed by the Kubernetes API server
//! - `memory.rs` - `MemoryStore`, an in-process store with fault injection,
//!   built for tests and behind the `test-util` feature

mod cluster;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod registry;

pub use cluster::KubeStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryStore, Operation};
pub use registry::KindRegistry;

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Namespace and name of an object. Cluster-scoped objects have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an existing object, `None` when it has no name
    pub fn of<K: Resource>(object: &K) -> Option<Self> {
        let meta = object.meta();
        Some(Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone()?,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Store operation, as named in errors, metrics and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateStatus => "update_status",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kind {0} is not registered")]
    UnknownKind(String),

    #[error("object has no name")]
    MissingName,
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 409 => {
                if response.reason == "AlreadyExists" {
                    StoreError::AlreadyExists(response.message)
                } else {
                    StoreError::Conflict(response.message)
                }
            }
            kube::Error::Api(response) => StoreError::Api {
                code: response.code,
                message: response.message,
            },
            kube::Error::SerdeError(e) => StoreError::Serialization(e),
            other => StoreError::Transport(other.to_string()),
        }
    }
}

/// Single-object operations against a declarative object store.
///
/// Not-found is never an error: `get` returns `None` and `delete` returns
/// `false`. Writes use optimistic concurrency on `metadata.resourceVersion`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the whole object except its status
    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace only the status subresource
    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Returns whether the object existed
    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<bool, StoreError>;
}

/// Typed access to an [`ObjectStore`] for registered kinds
#[derive(Clone)]
pub struct Objects {
    store: Arc<dyn ObjectStore>,
    registry: Arc<KindRegistry>,
}

impl fmt::Debug for Objects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objects")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Objects {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<KindRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub async fn get<K>(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let resource = self.registry.resource::<K>()?;
        match self.store.get(resource, key).await? {
            Some(object) => Ok(Some(from_dynamic(object)?)),
            None => Ok(None),
        }
    }

    pub async fn create<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let resource = self.registry.resource::<K>()?;
        let created = self.store.create(resource, &to_dynamic(object)?).await?;
        from_dynamic(created)
    }

    pub async fn update<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let resource = self.registry.resource::<K>()?;
        let updated = self.store.update(resource, &to_dynamic(object)?).await?;
        from_dynamic(updated)
    }

    pub async fn update_status<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let resource = self.registry.resource::<K>()?;
        let updated = self
            .store
            .update_status(resource, &to_dynamic(object)?)
            .await?;
        from_dynamic(updated)
    }

    pub async fn delete<K>(&self, key: &ObjectKey) -> Result<bool, StoreError>
    where
        K: Resource<DynamicType = ()>,
    {
        let resource = self.registry.resource::<K>()?;
        self.store.delete(resource, key).await
    }
}

fn to_dynamic<K: Serialize>(object: &K) -> Result<DynamicObject, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

fn from_dynamic<K: DeserializeOwned>(object: DynamicObject) -> Result<K, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}
