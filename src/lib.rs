//! Cryostat Operator Library
//!
//! Core functionality of the Cryostat operator. Unit tests live next to the
//! code; end-to-end reconciliation tests run against the in-memory store in
//! `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use cryostat_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod resources;
pub mod runtime;
pub mod server;
