//! # Operator Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::config::PlatformSetting;
use crate::constants::*;
use std::time::Duration;

/// Container images for the three Cryostat components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTags {
    pub core: String,
    pub datasource: String,
    pub grafana: String,
}

impl Default for ImageTags {
    fn default() -> Self {
        Self {
            core: DEFAULT_CORE_IMAGE.to_string(),
            datasource: DEFAULT_DATASOURCE_IMAGE.to_string(),
            grafana: DEFAULT_GRAFANA_IMAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Operator-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// The platform and metrics port can additionally be set from the command line.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Port of the HTTP server exposing metrics and probes
    pub metrics_port: u16,
    /// Forced platform, or `Auto` to detect it from API discovery
    pub platform: PlatformSetting,
    /// Images used in the generated Deployment
    pub images: ImageTags,
    /// Exponential backoff starting value (seconds)
    pub backoff_start_secs: u64,
    /// Exponential backoff ceiling (seconds)
    pub backoff_max_secs: u64,
    /// Requeue delay while a Route host or Certificate is pending (seconds)
    pub not_ready_requeue_secs: u64,
    /// Retry delay after a failed delete of a Deployment built for the other mode (seconds)
    pub stale_workload_requeue_secs: u64,
    /// Log output format (text, json)
    pub log_format: LogFormat,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            platform: PlatformSetting::Auto,
            images: ImageTags::default(),
            backoff_start_secs: DEFAULT_BACKOFF_START_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            not_ready_requeue_secs: DEFAULT_NOT_READY_REQUEUE_SECS,
            stale_workload_requeue_secs: DEFAULT_STALE_WORKLOAD_REQUEUE_SECS,
            log_format: LogFormat::Text,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            metrics_port: parsed_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            platform: parsed_or_default(&lookup, "CRYOSTAT_PLATFORM", PlatformSetting::Auto),
            images: ImageTags {
                core: non_empty_or_default(&lookup, CORE_IMAGE_ENV, DEFAULT_CORE_IMAGE),
                datasource: non_empty_or_default(
                    &lookup,
                    DATASOURCE_IMAGE_ENV,
                    DEFAULT_DATASOURCE_IMAGE,
                ),
                grafana: non_empty_or_default(&lookup, GRAFANA_IMAGE_ENV, DEFAULT_GRAFANA_IMAGE),
            },
            backoff_start_secs: parsed_or_default(
                &lookup,
                "BACKOFF_START_SECS",
                DEFAULT_BACKOFF_START_SECS,
            ),
            backoff_max_secs: parsed_or_default(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            not_ready_requeue_secs: parsed_or_default(
                &lookup,
                "NOT_READY_REQUEUE_SECS",
                DEFAULT_NOT_READY_REQUEUE_SECS,
            ),
            stale_workload_requeue_secs: parsed_or_default(
                &lookup,
                "STALE_WORKLOAD_REQUEUE_SECS",
                DEFAULT_STALE_WORKLOAD_REQUEUE_SECS,
            ),
            log_format: parsed_or_default(&lookup, "LOG_FORMAT", LogFormat::Text),
        }
    }

    pub fn not_ready_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.not_ready_requeue_secs)
    }

    pub fn stale_workload_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.stale_workload_requeue_secs)
    }
}

/// Read and parse a value, falling back to the default when unset or unparseable
fn parsed_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Empty values count as unset
fn non_empty_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
