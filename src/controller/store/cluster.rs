//! Object store backed by the Kubernetes API server.

use crate::constants::FIELD_MANAGER;
use crate::controller::store::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::api::{ApiResource, DeleteParams, DynamicObject, PostParams};
use kube::{Api, Client};
use std::fmt;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

fn name_of(object: &DynamicObject) -> Result<&str, StoreError> {
    object
        .metadata
        .name
        .as_deref()
        .ok_or(StoreError::MissingName)
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let api = self.api(resource, key.namespace.as_deref());
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = name_of(object)?;
        debug!(kind = %resource.kind, name, "Creating object");
        let api = self.api(resource, object.metadata.namespace.as_deref());
        Ok(api.create(&Self::post_params(), object).await?)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = name_of(object)?;
        debug!(kind = %resource.kind, name, "Replacing object");
        let api = self.api(resource, object.metadata.namespace.as_deref());
        Ok(api.replace(name, &Self::post_params(), object).await?)
    }

    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = name_of(object)?;
        debug!(kind = %resource.kind, name, "Replacing status");
        let api = self.api(resource, object.metadata.namespace.as_deref());
        let body = serde_json::to_vec(object)?;
        Ok(api
            .replace_status(name, &Self::post_params(), body)
            .await?)
    }

    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<bool, StoreError> {
        debug!(kind = %resource.kind, key = %key, "Deleting object");
        let api = self.api(resource, key.namespace.as_deref());
        match api.delete(&key.name, &DeleteParams::background()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
