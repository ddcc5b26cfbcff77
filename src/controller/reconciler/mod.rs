//! # Reconciler
//!
//! Core reconciliation logic for `Cryostat` resources.
//!
//! The reconciler re-derives the full desired state from the `Cryostat`
//! alone on every pass and issues only the writes needed to converge. Every
//! step is idempotent, so a pass interrupted at any point is simply resumed
//! by the next one.
//!
//! ## Reconciliation Flow
//!
//! 1. Load the instance; gone means nothing to do
//! 2. Being deleted: run the finalizer cleanup instead
//! 3. Add the finalizer
//! 4. Persistent volume claim
//! 5. Credential secrets
//! 6. cert-manager CA chain and serving certificates
//! 7. ServiceAccount, Role, RoleBinding, ClusterRoleBinding
//! 8. Services and their exposure, removing what minimal mode does not use
//! 9. Deployment
//! 10. Status
//! 11. ConsoleLink
//!
//! A Route without a host or a Certificate not yet issued requeues the pass
//! after a short fixed delay without reporting an error.

pub mod exposure;
pub mod finalize;
pub mod rbac;
pub mod reconcile;
pub mod tls;
pub mod types;
pub mod workload;

pub use exposure::Exposure;
pub use finalize::DeletionPhase;
pub use reconcile::{reconcile, reconcile_instance};
pub use tls::TlsMaterial;
pub use types::{BackoffState, Reconciler, ReconcilerError};
