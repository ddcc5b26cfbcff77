//! # Kind Registry
//!
//! Immutable map from each kind the operator touches to its `ApiResource`.
//! Built once at startup from the cluster's capabilities, so kinds the
//! cluster does not serve (Routes off OpenShift, cert-manager kinds without
//! cert-manager) are rejected before any request is made.

use crate::config::ClusterCapabilities;
use crate::controller::store::StoreError;
use crate::crd::{Certificate, ConsoleLink, Cryostat, Issuer, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Namespace, PersistentVolumeClaim, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, Role, RoleBinding};
use kube::api::ApiResource;
use kube::Resource;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, ApiResource>,
}

impl KindRegistry {
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    /// Every kind the operator manages on a cluster with the given capabilities
    pub fn for_cluster(capabilities: ClusterCapabilities) -> Self {
        let mut builder = Self::builder()
            .with::<Cryostat>()
            .with::<Namespace>()
            .with::<PersistentVolumeClaim>()
            .with::<Secret>()
            .with::<ServiceAccount>()
            .with::<Role>()
            .with::<RoleBinding>()
            .with::<ClusterRoleBinding>()
            .with::<Service>()
            .with::<Ingress>()
            .with::<Deployment>();
        if capabilities.platform.is_openshift() {
            builder = builder.with::<Route>().with::<ConsoleLink>();
        }
        if capabilities.cert_manager {
            builder = builder.with::<Issuer>().with::<Certificate>();
        }
        builder.build()
    }

    pub fn resource<K>(&self) -> Result<&ApiResource, StoreError>
    where
        K: Resource<DynamicType = ()>,
    {
        let key = kind_key::<K>();
        self.kinds.get(&key).ok_or(StoreError::UnknownKind(key))
    }

    pub fn contains<K>(&self) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        self.kinds.contains_key(&kind_key::<K>())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct KindRegistryBuilder {
    kinds: BTreeMap<String, ApiResource>,
}

impl KindRegistryBuilder {
    #[must_use]
    pub fn with<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        self.kinds.insert(kind_key::<K>(), ApiResource::erase::<K>(&()));
        self
    }

    pub fn build(self) -> KindRegistry {
        KindRegistry { kinds: self.kinds }
    }
}

fn kind_key<K: Resource<DynamicType = ()>>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}
