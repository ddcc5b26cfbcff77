//! # Platform
//!
//! The operator behaves differently on clusters that serve the OpenShift
//! `route.openshift.io` API group: services are exposed through Routes and a
//! ConsoleLink is published. Detection happens once at startup.

use clap::ValueEnum;

/// API group whose presence marks a Route-capable cluster
pub const ROUTE_API_GROUP: &str = "route.openshift.io";

/// API group served when cert-manager is installed
pub const CERT_MANAGER_API_GROUP: &str = "cert-manager.io";

/// Requested platform, as given on the command line or in `CRYOSTAT_PLATFORM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PlatformSetting {
    #[default]
    Auto,
    #[value(name = "openshift")]
    OpenShift,
    Kubernetes,
}

impl std::str::FromStr for PlatformSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Routes and ConsoleLinks are available
    OpenShift,
    /// Exposure through user-configured Ingresses only
    Kubernetes,
}

impl Platform {
    /// Resolve the platform from a setting and the API groups served by the cluster
    pub fn resolve<'a>(
        setting: PlatformSetting,
        api_groups: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        match setting {
            PlatformSetting::OpenShift => Self::OpenShift,
            PlatformSetting::Kubernetes => Self::Kubernetes,
            PlatformSetting::Auto => {
                if api_groups.into_iter().any(|g| g == ROUTE_API_GROUP) {
                    Self::OpenShift
                } else {
                    Self::Kubernetes
                }
            }
        }
    }

    #[must_use]
    pub fn is_openshift(self) -> bool {
        matches!(self, Self::OpenShift)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenShift => write!(f, "openshift"),
            Self::Kubernetes => write!(f, "kubernetes"),
        }
    }
}

/// What the cluster offers, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCapabilities {
    pub platform: Platform,
    pub cert_manager: bool,
}

impl ClusterCapabilities {
    pub fn discover<'a>(
        setting: PlatformSetting,
        api_groups: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Self {
        Self {
            platform: Platform::resolve(setting, api_groups.clone()),
            cert_manager: api_groups
                .into_iter()
                .any(|g| g == CERT_MANAGER_API_GROUP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detects_route_group() {
        let groups = ["apps", "route.openshift.io", "cert-manager.io"];
        let caps = ClusterCapabilities::discover(PlatformSetting::Auto, groups.iter().copied());
        assert_eq!(caps.platform, Platform::OpenShift);
        assert!(caps.cert_manager);

        let caps = ClusterCapabilities::discover(PlatformSetting::Auto, ["apps"].iter().copied());
        assert_eq!(caps.platform, Platform::Kubernetes);
        assert!(!caps.cert_manager);
    }

    #[test]
    fn explicit_setting_wins() {
        let platform = Platform::resolve(PlatformSetting::Kubernetes, ["route.openshift.io"]);
        assert_eq!(platform, Platform::Kubernetes);
        assert_eq!("OpenShift".parse::<PlatformSetting>(), Ok(PlatformSetting::OpenShift));
    }
}
