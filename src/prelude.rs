//! # Prelude
//!
//! Re-exports commonly used types.
//!
//! ```rust
//! use cryostat_operator::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, reconcile_instance, BackoffState, DeletionPhase, Exposure, Reconciler,
    ReconcilerError, TlsMaterial,
};

pub use crate::controller::store::{
    KindRegistry, KubeStore, ObjectKey, ObjectStore, Objects, StoreError, Verb,
};

#[cfg(any(test, feature = "test-util"))]
pub use crate::controller::store::MemoryStore;

pub use crate::config::{ClusterCapabilities, OperatorConfig, Platform, PlatformSetting};
