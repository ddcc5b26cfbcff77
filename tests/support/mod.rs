//! Shared harness for reconciliation tests
//!
//! Builds a reconciler over an in-memory store seeded with the instance's
//! namespace and the instance itself.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use cryostat_operator::config::{ClusterCapabilities, OperatorConfig, Platform};
use cryostat_operator::controller::reconciler::{reconcile_instance, Reconciler, ReconcilerError};
use cryostat_operator::controller::store::{KindRegistry, MemoryStore, ObjectKey, Objects};
use cryostat_operator::crd::{Cryostat, CryostatSpec};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use kube::Resource;
use kube_runtime::controller::Action;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const NAME: &str = "demo";
pub const NAMESPACE: &str = "default";

pub struct Harness {
    pub store: MemoryStore,
    pub ctx: Reconciler,
}

impl Harness {
    pub fn new(platform: Platform, cert_manager: bool) -> Self {
        let capabilities = ClusterCapabilities {
            platform,
            cert_manager,
        };
        let store = MemoryStore::new();
        let objects = Objects::new(
            Arc::new(store.clone()),
            Arc::new(KindRegistry::for_cluster(capabilities)),
        );
        let ctx = Reconciler::new(objects, capabilities, OperatorConfig::default());
        Self { store, ctx }
    }

    pub fn openshift() -> Self {
        Self::new(Platform::OpenShift, true)
    }

    pub async fn seed_namespace(&self) {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.ctx.objects.create(&namespace).await.unwrap();
    }

    pub async fn seed(&self, spec: CryostatSpec) -> Cryostat {
        self.seed_namespace().await;
        self.ctx.objects.create(&Cryostat::new(NAME, spec).within(NAMESPACE)).await.unwrap()
    }

    pub fn key() -> ObjectKey {
        ObjectKey::namespaced(NAMESPACE, NAME)
    }

    pub fn key_for(name: &str) -> ObjectKey {
        ObjectKey::namespaced(NAMESPACE, name)
    }

    pub async fn reconcile(&self) -> Result<Action, ReconcilerError> {
        reconcile_instance(&self.ctx, &Self::key()).await
    }

    pub async fn get<K>(&self, key: &ObjectKey) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        self.ctx.objects.get::<K>(key).await.unwrap()
    }

    pub async fn instance(&self) -> Option<Cryostat> {
        self.get::<Cryostat>(&Self::key()).await
    }

    pub async fn application_url(&self) -> Option<String> {
        self.instance()
            .await
            .and_then(|cr| cr.status)
            .map(|status| status.application_url)
    }

    pub async fn update_spec(&self, update: impl FnOnce(&mut CryostatSpec)) {
        let mut cr = self.instance().await.unwrap();
        update(&mut cr.spec);
        self.ctx.objects.update(&cr).await.unwrap();
    }
}

trait Within {
    fn within(self, namespace: &str) -> Self;
}

impl Within for Cryostat {
    fn within(mut self, namespace: &str) -> Self {
        self.metadata.namespace = Some(namespace.to_string());
        self
    }
}
