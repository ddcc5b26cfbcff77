//! Link to the Cryostat web UI on the OpenShift namespace dashboard.

use crate::crd::{ConsoleLink, ConsoleLinkSpec, Cryostat, NamespaceDashboardSpec};
use crate::resources::cluster_scoped_name;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

pub fn console_link(cr: &Cryostat, url: &str) -> ConsoleLink {
    ConsoleLink {
        metadata: ObjectMeta {
            name: Some(cluster_scoped_name(cr)),
            ..Default::default()
        },
        spec: ConsoleLinkSpec {
            text: "Cryostat".to_string(),
            href: url.to_string(),
            location: "NamespaceDashboard".to_string(),
            namespace_dashboard: Some(NamespaceDashboardSpec {
                namespaces: cr.namespace().into_iter().collect(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CryostatSpec;
    use crate::resources::test_support::cryostat;

    #[test]
    fn link_scoped_to_instance_namespace() {
        let cr = cryostat("cryostat", "default", CryostatSpec::default());
        let link = console_link(&cr, "https://cryostat.example.com");
        assert_eq!(
            link.metadata.name.as_deref(),
            Some("cryostat-9ecd5050500c2566765bc593edfcce12434283e5da32a27476bc4a1569304a02")
        );
        assert_eq!(link.spec.href, "https://cryostat.example.com");
        assert_eq!(
            link.spec.namespace_dashboard.map(|d| d.namespaces),
            Some(vec!["default".to_string()])
        );
    }
}
