//! # Deletion Tests
//!
//! Finalizer handling: cluster-scoped dependents go before the finalizer,
//! and a failed cleanup keeps the instance around.

mod support;

use cryostat_operator::constants::CRYOSTAT_FINALIZER;
use cryostat_operator::controller::reconciler::DeletionPhase;
use cryostat_operator::controller::store::{ObjectKey, Verb};
use cryostat_operator::crd::{ConsoleLink, Cryostat, CryostatSpec};
use cryostat_operator::resources::cluster_scoped_name;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use support::Harness;

async fn converged() -> (Harness, ObjectKey) {
    let harness = Harness::openshift();
    let cr = harness.seed(CryostatSpec::default()).await;
    harness.reconcile().await.unwrap();
    (harness, ObjectKey::cluster(cluster_scoped_name(&cr)))
}

async fn request_deletion(harness: &Harness) {
    harness
        .ctx
        .objects
        .delete::<Cryostat>(&Harness::key())
        .await
        .unwrap();
}

#[tokio::test]
async fn first_pass_adds_finalizer() {
    let (harness, _) = converged().await;
    let cr = harness.instance().await.unwrap();
    assert_eq!(cr.finalizers(), [CRYOSTAT_FINALIZER.to_string()]);
    assert_eq!(DeletionPhase::of(Some(&cr)), DeletionPhase::Active);
}

#[tokio::test]
async fn cluster_scoped_dependents_go_before_finalizer() {
    let (harness, cluster_key) = converged().await;
    request_deletion(&harness).await;
    let cr = harness.instance().await.unwrap();
    assert_eq!(DeletionPhase::of(Some(&cr)), DeletionPhase::Deleting);

    let before = harness.store.journal().len();
    let action = harness.reconcile().await.unwrap();
    assert_eq!(action, Action::await_change());

    let journal = harness.store.journal();
    let writes: Vec<(Verb, &str)> = journal[before..]
        .iter()
        .map(|op| (op.verb, op.kind.as_str()))
        .collect();
    assert_eq!(
        writes,
        vec![
            (Verb::Delete, "ClusterRoleBinding"),
            (Verb::Delete, "ConsoleLink"),
            (Verb::Update, "Cryostat"),
        ]
    );

    assert!(harness.get::<ClusterRoleBinding>(&cluster_key).await.is_none());
    assert!(harness.get::<ConsoleLink>(&cluster_key).await.is_none());
    assert!(harness.instance().await.is_none());

    let action = harness.reconcile().await.unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn failed_cleanup_keeps_finalizer() {
    let (harness, cluster_key) = converged().await;
    request_deletion(&harness).await;
    harness.store.fail(Verb::Delete, "ClusterRoleBinding");

    let error = harness.reconcile().await.unwrap_err();
    assert_eq!(error.reason(), "store");
    let cr = harness.instance().await.unwrap();
    assert!(cr.finalizers().iter().any(|f| f == CRYOSTAT_FINALIZER));
    assert!(harness.get::<ClusterRoleBinding>(&cluster_key).await.is_some());

    harness.store.heal(Verb::Delete, "ClusterRoleBinding");
    harness.reconcile().await.unwrap();
    assert!(harness.instance().await.is_none());
}

#[tokio::test]
async fn already_removed_dependents_are_not_an_error() {
    let (harness, cluster_key) = converged().await;
    harness
        .ctx
        .objects
        .delete::<ClusterRoleBinding>(&cluster_key)
        .await
        .unwrap();
    harness
        .ctx
        .objects
        .delete::<ConsoleLink>(&cluster_key)
        .await
        .unwrap();
    request_deletion(&harness).await;

    harness.reconcile().await.unwrap();
    assert!(harness.instance().await.is_none());
}

#[tokio::test]
async fn other_finalizers_hold_the_instance() {
    let (harness, _) = converged().await;
    let mut cr = harness.instance().await.unwrap();
    cr.finalizers_mut().push("example.com/backup".to_string());
    harness.ctx.objects.update(&cr).await.unwrap();
    request_deletion(&harness).await;

    harness.reconcile().await.unwrap();
    let cr = harness.instance().await.unwrap();
    assert_eq!(DeletionPhase::of(Some(&cr)), DeletionPhase::Finalizing);

    let writes = harness.store.writes();
    let action = harness.reconcile().await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(harness.store.writes(), writes);
}
