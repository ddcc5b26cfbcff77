//! # Controller
//!
//! Core controller modules for the Cryostat operator.
//!
//! - `backoff`: Exponential backoff for failed reconciliations
//! - `reconciler`: Convergence of a `Cryostat` and its dependents
//! - `store`: Object access, against the cluster or in memory

pub mod backoff;
pub mod reconciler;
pub mod store;
