//! # In-Memory Store
//!
//! An [`ObjectStore`] kept in process memory. It follows the API server's
//! rules closely enough to drive the reconciler in tests:
//!
//! - created objects get a `uid` and a `resourceVersion`; a stale
//!   `resourceVersion` on update is a conflict
//! - `update` never touches status and `update_status` touches nothing else
//! - deleting an object with finalizers only marks it for deletion; it goes
//!   away once an update clears the last finalizer
//!
//! Two controllers the operator depends on are simulated: the OpenShift
//! router assigns a host to every Route, and cert-manager marks Certificates
//! ready and writes their secrets. Either can be switched off to observe the
//! reconciler waiting. Any verb can be made to fail for a kind.

use crate::controller::store::{ObjectKey, ObjectStore, StoreError, Verb};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::ByteString;
use kube::api::{ApiResource, DynamicObject};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Domain under which simulated Route hosts are assigned
const ROUTE_DOMAIN: &str = "apps.example.com";

/// A successful write, as recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub verb: Verb,
    pub kind: String,
    pub key: ObjectKey,
}

type StoredKey = (String, ObjectKey);

#[derive(Debug)]
struct State {
    objects: BTreeMap<StoredKey, DynamicObject>,
    resource_version: u64,
    journal: Vec<Operation>,
    faults: BTreeSet<(Verb, String)>,
    assign_route_hosts: bool,
    issue_certificates: bool,
    write_certificate_secrets: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            resource_version: 0,
            journal: Vec::new(),
            faults: BTreeSet::new(),
            assign_route_hosts: true,
            issue_certificates: true,
            write_certificate_secrets: true,
        }
    }
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn check_fault(&self, verb: Verb, resource: &ApiResource) -> Result<(), StoreError> {
        if self.faults.contains(&(verb, resource.kind.clone())) {
            return Err(StoreError::Api {
                code: 500,
                message: format!("injected {verb} failure for {}", resource.kind),
            });
        }
        Ok(())
    }

    fn record(&mut self, verb: Verb, resource: &ApiResource, key: &ObjectKey) {
        trace!(%verb, kind = %resource.kind, key = %key, "Recorded write");
        self.journal.push(Operation {
            verb,
            kind: resource.kind.clone(),
            key: key.clone(),
        });
    }

    /// Run the simulated platform controllers against one object
    fn simulate(&mut self, kind: &str, key: &ObjectKey) {
        let stored_key = (kind.to_string(), key.clone());
        let Some(object) = self.objects.get(&stored_key) else {
            return;
        };
        if kind == ROUTE_KIND && self.assign_route_hosts {
            if object.data.pointer("/status/ingress/0/host").is_some() {
                return;
            }
            let host = object
                .data
                .pointer("/spec/host")
                .and_then(Value::as_str)
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!(
                        "{}-{}.{ROUTE_DOMAIN}",
                        key.name,
                        key.namespace.as_deref().unwrap_or_default()
                    )
                });
            let version = self.next_resource_version();
            if let Some(route) = self.objects.get_mut(&stored_key) {
                route.data["status"] = json!({
                    "ingress": [{ "host": host, "routerName": "default" }]
                });
                route.metadata.resource_version = Some(version);
            }
        } else if kind == CERTIFICATE_KIND && self.issue_certificates {
            if object.data.pointer("/status/conditions/0").is_some() {
                return;
            }
            let secret_name = object
                .data
                .pointer("/spec/secretName")
                .and_then(Value::as_str)
                .map(str::to_string);
            let version = self.next_resource_version();
            if let Some(certificate) = self.objects.get_mut(&stored_key) {
                certificate.data["status"] = json!({
                    "conditions": [{
                        "type": "Ready",
                        "status": "True",
                        "reason": "Ready",
                        "message": "Certificate is up to date and has not expired"
                    }]
                });
                certificate.metadata.resource_version = Some(version);
            }
            if let (Some(secret_name), true) = (secret_name, self.write_certificate_secrets) {
                self.write_certificate_secret(key.namespace.clone(), secret_name);
            }
        }
    }

    fn write_certificate_secret(&mut self, namespace: Option<String>, name: String) {
        let key = ObjectKey {
            namespace: namespace.clone(),
            name: name.clone(),
        };
        let stored_key = (SECRET_KIND.to_string(), key);
        if self.objects.contains_key(&stored_key) {
            return;
        }
        let pem = |label: &str| {
            ByteString(format!("-----BEGIN {label}-----\n{name}\n-----END {label}-----\n").into_bytes())
        };
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace,
                ..Default::default()
            },
            type_: Some("kubernetes.io/tls".to_string()),
            data: Some(BTreeMap::from([
                ("ca.crt".to_string(), pem("CERTIFICATE")),
                ("tls.crt".to_string(), pem("CERTIFICATE")),
                ("tls.key".to_string(), pem("PRIVATE KEY")),
            ])),
            ..Default::default()
        };
        let Ok(mut object) = serde_json::to_value(&secret)
            .and_then(serde_json::from_value::<DynamicObject>)
        else {
            return;
        };
        object.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        object.metadata.resource_version = Some(self.next_resource_version());
        self.objects.insert(stored_key, object);
    }

    fn simulate_all(&mut self, kind: &str) {
        let keys: Vec<ObjectKey> = self
            .objects
            .keys()
            .filter(|(stored_kind, _)| stored_kind == kind)
            .map(|(_, key)| key.clone())
            .collect();
        for key in keys {
            self.simulate(kind, &key);
        }
    }
}

const ROUTE_KIND: &str = "route.openshift.io/v1/Route";
const CERTIFICATE_KIND: &str = "cert-manager.io/v1/Certificate";
const SECRET_KIND: &str = "v1/Secret";

fn kind_of(resource: &ApiResource) -> String {
    format!("{}/{}", resource.api_version, resource.kind)
}

fn key_of(object: &DynamicObject) -> Result<ObjectKey, StoreError> {
    Ok(ObjectKey {
        namespace: object.metadata.namespace.clone(),
        name: object.metadata.name.clone().ok_or(StoreError::MissingName)?,
    })
}

fn check_version(stored: &DynamicObject, incoming: &DynamicObject, key: &ObjectKey) -> Result<(), StoreError> {
    match (&incoming.metadata.resource_version, &stored.metadata.resource_version) {
        (Some(incoming), Some(stored)) if incoming != stored => Err(StoreError::Conflict(format!(
            "{key} has resourceVersion {stored}, not {incoming}"
        ))),
        _ => Ok(()),
    }
}

/// Current time in the API server's timestamp format
fn now() -> Option<Time> {
    serde_json::from_value(json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))).ok()
}

fn has_finalizers(object: &DynamicObject) -> bool {
    object
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| !finalizers.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of successful writes so far
    pub fn writes(&self) -> usize {
        self.state().journal.len()
    }

    /// Successful writes in the order they happened
    pub fn journal(&self) -> Vec<Operation> {
        self.state().journal.clone()
    }

    /// Make every `verb` on objects of `kind` (e.g. `"Deployment"`) fail
    pub fn fail(&self, verb: Verb, kind: &str) {
        self.state().faults.insert((verb, kind.to_string()));
    }

    pub fn heal(&self, verb: Verb, kind: &str) {
        self.state().faults.remove(&(verb, kind.to_string()));
    }

    /// Toggle Route host assignment; enabling it admits every pending Route
    pub fn assign_route_hosts(&self, enabled: bool) {
        let mut state = self.state();
        state.assign_route_hosts = enabled;
        state.simulate_all(ROUTE_KIND);
    }

    /// Toggle Certificate issuance; enabling it issues every pending Certificate
    pub fn issue_certificates(&self, enabled: bool) {
        let mut state = self.state();
        state.issue_certificates = enabled;
        state.simulate_all(CERTIFICATE_KIND);
    }

    /// Toggle whether issued Certificates get their secret written
    pub fn write_certificate_secrets(&self, enabled: bool) {
        self.state().write_certificate_secrets = enabled;
    }

    /// Number of stored objects of a kind, counted by kind name
    pub fn count(&self, kind: &str) -> usize {
        self.state()
            .objects
            .keys()
            .filter(|(stored_kind, _)| stored_kind.rsplit('/').next() == Some(kind))
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let state = self.state();
        state.check_fault(Verb::Get, resource)?;
        Ok(state.objects.get(&(kind_of(resource), key.clone())).cloned())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state();
        state.check_fault(Verb::Create, resource)?;
        let key = key_of(object)?;
        let kind = kind_of(resource);
        let stored_key = (kind.clone(), key.clone());
        if state.objects.contains_key(&stored_key) {
            return Err(StoreError::AlreadyExists(format!("{} {key}", resource.kind)));
        }

        let mut created = object.clone();
        created.types = Some(kube::api::TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.metadata.creation_timestamp = now();
        created.metadata.resource_version = Some(state.next_resource_version());
        state.objects.insert(stored_key.clone(), created);
        state.record(Verb::Create, resource, &key);
        state.simulate(&kind, &key);

        state
            .objects
            .get(&stored_key)
            .cloned()
            .ok_or(StoreError::MissingName)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state();
        state.check_fault(Verb::Update, resource)?;
        let key = key_of(object)?;
        let stored_key = (kind_of(resource), key.clone());
        let Some(stored) = state.objects.get(&stored_key) else {
            return Err(StoreError::Api {
                code: 404,
                message: format!("{} {key} not found", resource.kind),
            });
        };
        check_version(stored, object, &key)?;

        let mut updated = object.clone();
        updated.types = stored.types.clone();
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.creation_timestamp = stored.metadata.creation_timestamp.clone();
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        match stored.data.get("status") {
            Some(status) => updated.data["status"] = status.clone(),
            None => {
                if let Some(data) = updated.data.as_object_mut() {
                    data.remove("status");
                }
            }
        }
        updated.metadata.resource_version = Some(state.next_resource_version());
        state.record(Verb::Update, resource, &key);

        if updated.metadata.deletion_timestamp.is_some() && !has_finalizers(&updated) {
            state.objects.remove(&stored_key);
            return Ok(updated);
        }
        state.objects.insert(stored_key, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut state = self.state();
        state.check_fault(Verb::UpdateStatus, resource)?;
        let key = key_of(object)?;
        let stored_key = (kind_of(resource), key.clone());
        let Some(stored) = state.objects.get(&stored_key) else {
            return Err(StoreError::Api {
                code: 404,
                message: format!("{} {key} not found", resource.kind),
            });
        };
        check_version(stored, object, &key)?;

        let mut updated = stored.clone();
        updated.data["status"] = object.data.get("status").cloned().unwrap_or(Value::Null);
        updated.metadata.resource_version = Some(state.next_resource_version());
        state.objects.insert(stored_key, updated.clone());
        state.record(Verb::UpdateStatus, resource, &key);
        Ok(updated)
    }

    async fn delete(&self, resource: &ApiResource, key: &ObjectKey) -> Result<bool, StoreError> {
        let mut state = self.state();
        state.check_fault(Verb::Delete, resource)?;
        let stored_key = (kind_of(resource), key.clone());
        let Some(stored) = state.objects.get(&stored_key) else {
            return Ok(false);
        };

        if has_finalizers(stored) {
            if stored.metadata.deletion_timestamp.is_none() {
                let version = state.next_resource_version();
                if let Some(marked) = state.objects.get_mut(&stored_key) {
                    marked.metadata.deletion_timestamp = now();
                    marked.metadata.resource_version = Some(version);
                }
                state.record(Verb::Delete, resource, key);
            }
            return Ok(true);
        }

        state.objects.remove(&stored_key);
        state.record(Verb::Delete, resource, key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Certificate, CertificateSpec, Route, RouteSpec};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::Resource;

    fn dynamic<K: serde::Serialize>(object: &K) -> DynamicObject {
        serde_json::from_value(serde_json::to_value(object).unwrap()).unwrap()
    }

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stale_resource_version_conflicts() {
        let store = MemoryStore::new();
        let resource = ApiResource::erase::<ConfigMap>(&());
        let created = store.create(&resource, &dynamic(&config_map("a"))).await.unwrap();
        let updated = store.update(&resource, &created).await.unwrap();
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);

        let result = store.update(&resource, &created).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let result = store.create(&resource, &created).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn finalizers_defer_removal() {
        let store = MemoryStore::new();
        let resource = ApiResource::erase::<ConfigMap>(&());
        let mut cm = config_map("guarded");
        cm.metadata.finalizers = Some(vec!["example.com/cleanup".to_string()]);
        store.create(&resource, &dynamic(&cm)).await.unwrap();

        let key = ObjectKey::namespaced("default", "guarded");
        assert!(store.delete(&resource, &key).await.unwrap());
        let mut marked = store.get(&resource, &key).await.unwrap().unwrap();
        assert!(marked.metadata.deletion_timestamp.is_some());

        marked.metadata.finalizers = None;
        store.update(&resource, &marked).await.unwrap();
        assert!(store.get(&resource, &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_faults_fail_only_the_named_kind() {
        let store = MemoryStore::new();
        let resource = ApiResource::erase::<ConfigMap>(&());
        store.fail(Verb::Create, "ConfigMap");
        let result = store.create(&resource, &dynamic(&config_map("a"))).await;
        assert!(matches!(result, Err(StoreError::Api { code: 500, .. })));

        store.heal(Verb::Create, "ConfigMap");
        store.create(&resource, &dynamic(&config_map("a"))).await.unwrap();
        assert_eq!(store.count("ConfigMap"), 1);
    }

    #[tokio::test]
    async fn routes_are_admitted_when_enabled() {
        let store = MemoryStore::new();
        store.assign_route_hosts(false);
        let resource = ApiResource::erase::<Route>(&());
        let mut route = Route::new("demo", RouteSpec::default());
        route.meta_mut().namespace = Some("default".to_string());
        let created = store.create(&resource, &dynamic(&route)).await.unwrap();
        assert!(created.data.pointer("/status/ingress/0/host").is_none());

        store.assign_route_hosts(true);
        let key = ObjectKey::namespaced("default", "demo");
        let admitted = store.get(&resource, &key).await.unwrap().unwrap();
        assert_eq!(
            admitted.data.pointer("/status/ingress/0/host"),
            Some(&json!("demo-default.apps.example.com"))
        );
    }

    #[tokio::test]
    async fn certificates_are_issued_with_secrets() {
        let store = MemoryStore::new();
        let resource = ApiResource::erase::<Certificate>(&());
        let mut cert = Certificate::new(
            "demo-ca",
            CertificateSpec {
                secret_name: "demo-ca".to_string(),
                ..Default::default()
            },
        );
        cert.meta_mut().namespace = Some("default".to_string());
        let created = store.create(&resource, &dynamic(&cert)).await.unwrap();
        let issued: Certificate = serde_json::from_value(serde_json::to_value(created).unwrap()).unwrap();
        assert!(issued.is_ready());

        let secrets = ApiResource::erase::<Secret>(&());
        let key = ObjectKey::namespaced("default", "demo-ca");
        let secret = store.get(&secrets, &key).await.unwrap().unwrap();
        assert!(secret.data.pointer("/data/ca.crt").is_some());
    }
}
