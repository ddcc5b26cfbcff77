//! Services in front of the Cryostat pod.
//!
//! The first port of each Service is the one exposed through a Route or Ingress.

use crate::constants::{CORE_COMMAND_PORT, CORE_JMX_PORT, CORE_WEB_PORT, GRAFANA_PORT};
use crate::crd::Cryostat;
use crate::resources::{owned_meta, selector_labels, Endpoint};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub fn service(cr: &Cryostat, endpoint: Endpoint) -> Service {
    let ports = match endpoint {
        Endpoint::Core => vec![
            port("cryostat-http", CORE_WEB_PORT),
            port("jfr-jmx", CORE_JMX_PORT),
        ],
        Endpoint::Command => vec![port("cryostat-command", CORE_COMMAND_PORT)],
        Endpoint::Grafana => vec![port("grafana-http", GRAFANA_PORT)],
    };

    let mut meta = owned_meta(cr, endpoint.service_name(cr));
    meta.labels = Some(BTreeMap::from([
        ("app".to_string(), cr.name_any()),
        ("component".to_string(), endpoint.component().to_string()),
    ]));

    Service {
        metadata: meta,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(cr)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Target port of the exposed (first) port
pub fn exposed_target_port(service: &Service) -> Option<IntOrString> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|port| {
            port.target_port
                .clone()
                .unwrap_or(IntOrString::Int(port.port))
        })
}

fn port(name: &str, number: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port: number,
        target_port: Some(IntOrString::Int(number)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CryostatSpec;
    use crate::resources::test_support::cryostat;

    #[test]
    fn core_service_exposes_web_port_first() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let svc = service(&cr, Endpoint::Core);
        assert_eq!(svc.metadata.name.as_deref(), Some("demo"));
        assert_eq!(exposed_target_port(&svc), Some(IntOrString::Int(8181)));

        let spec = svc.spec.unwrap_or_default();
        let ports: Vec<i32> = spec.ports.unwrap_or_default().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![8181, 9091]);
        assert_eq!(spec.selector, Some(selector_labels(&cr)));
    }

    #[test]
    fn auxiliary_services() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let command = service(&cr, Endpoint::Command);
        let grafana = service(&cr, Endpoint::Grafana);
        assert_eq!(command.metadata.name.as_deref(), Some("demo-command"));
        assert_eq!(exposed_target_port(&command), Some(IntOrString::Int(9090)));
        assert_eq!(grafana.metadata.name.as_deref(), Some("demo-grafana"));
        assert_eq!(exposed_target_port(&grafana), Some(IntOrString::Int(3000)));
    }
}
