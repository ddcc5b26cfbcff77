//! # Configuration
//!
//! Operator settings loaded once at startup.
//!
//! ## Module Structure
//!
//! - `operator.rs` - `OperatorConfig` read from environment variables
//! - `platform.rs` - Route-capable vs plain Kubernetes dispatch

mod operator;
mod platform;

pub use operator::{ImageTags, LogFormat, OperatorConfig};
pub use platform::{ClusterCapabilities, Platform, PlatformSetting};
