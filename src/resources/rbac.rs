//! Service account and permissions for the Cryostat pod.
//!
//! Cryostat discovers JVM targets through Endpoints and resolves their owning
//! workloads, so its Role only grants read access to those kinds.

use crate::constants::CLUSTER_ROLE_NAME;
use crate::crd::Cryostat;
use crate::resources::{cluster_scoped_name, owned_meta};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

pub fn service_account(cr: &Cryostat) -> ServiceAccount {
    ServiceAccount {
        metadata: owned_meta(cr, cr.name_any()),
        ..Default::default()
    }
}

pub fn role(cr: &Cryostat) -> Role {
    Role {
        metadata: owned_meta(cr, cr.name_any()),
        rules: Some(vec![
            rule("", &["endpoints"], &["get", "list", "watch"]),
            rule("", &["pods", "replicationcontrollers"], &["get"]),
            rule(
                "apps",
                &["replicasets", "deployments", "daemonsets", "statefulsets"],
                &["get"],
            ),
            rule("apps.openshift.io", &["deploymentconfigs"], &["get"]),
            rule("route.openshift.io", &["routes"], &["get", "list"]),
        ]),
    }
}

pub fn role_binding(cr: &Cryostat) -> RoleBinding {
    RoleBinding {
        metadata: owned_meta(cr, cr.name_any()),
        subjects: Some(vec![service_account_subject(cr)]),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: cr.name_any(),
        },
    }
}

/// Cluster-scoped, so no owner reference: removed by the finalizer instead
pub fn cluster_role_binding(cr: &Cryostat) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(cluster_scoped_name(cr)),
            ..Default::default()
        },
        subjects: Some(vec![service_account_subject(cr)]),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
    }
}

fn service_account_subject(cr: &Cryostat) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: cr.name_any(),
        namespace: cr.namespace(),
        ..Default::default()
    }
}

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}
