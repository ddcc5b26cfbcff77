//! cert-manager objects forming a private CA chain per instance.
//!
//! A self-signed Issuer signs the CA Certificate, whose key pair backs a CA
//! Issuer, which in turn signs the core and Grafana serving certificates.

use crate::crd::{
    Certificate, CertificateSpec, Cryostat, Issuer, IssuerRef, IssuerSpec, Keystores,
    Pkcs12Keystore, SecretKeySelector,
};
use crate::resources::secrets::{keystore_secret_name, KEYSTORE_PASSWORD_KEY};
use crate::resources::{owned_meta, Endpoint};
use kube::ResourceExt;

/// Key of the CA bundle within the CA and serving certificate secrets
pub const CA_CERT_KEY: &str = "ca.crt";

pub fn self_signed_issuer_name(cr: &Cryostat) -> String {
    format!("{}-self-signed", cr.name_any())
}

/// Name of the CA Certificate, its secret and the CA Issuer
pub fn ca_name(cr: &Cryostat) -> String {
    format!("{}-ca", cr.name_any())
}

/// Secret holding the core keystore and certificate
pub fn core_tls_secret_name(cr: &Cryostat) -> String {
    format!("{}-tls", cr.name_any())
}

pub fn grafana_tls_secret_name(cr: &Cryostat) -> String {
    format!("{}-grafana-tls", cr.name_any())
}

pub fn self_signed_issuer(cr: &Cryostat) -> Issuer {
    Issuer {
        metadata: owned_meta(cr, self_signed_issuer_name(cr)),
        spec: IssuerSpec::self_signed(),
    }
}

pub fn ca_issuer(cr: &Cryostat) -> Issuer {
    Issuer {
        metadata: owned_meta(cr, ca_name(cr)),
        spec: IssuerSpec::ca(ca_name(cr)),
    }
}

pub fn ca_certificate(cr: &Cryostat) -> Certificate {
    Certificate {
        metadata: owned_meta(cr, ca_name(cr)),
        spec: CertificateSpec {
            common_name: Some(format!("ca.{}.cert-manager", cr.name_any())),
            secret_name: ca_name(cr),
            issuer_ref: IssuerRef {
                name: self_signed_issuer_name(cr),
                kind: None,
            },
            is_ca: true,
            ..Default::default()
        },
        status: None,
    }
}

/// Serving certificate for the core container, also issued as a PKCS12 keystore
pub fn core_certificate(cr: &Cryostat) -> Certificate {
    Certificate {
        metadata: owned_meta(cr, cr.name_any()),
        spec: CertificateSpec {
            dns_names: service_dns_names(cr, Endpoint::Core),
            secret_name: core_tls_secret_name(cr),
            issuer_ref: IssuerRef {
                name: ca_name(cr),
                kind: None,
            },
            keystores: Some(Keystores {
                pkcs12: Some(Pkcs12Keystore {
                    create: true,
                    password_secret_ref: SecretKeySelector {
                        name: keystore_secret_name(cr),
                        key: KEYSTORE_PASSWORD_KEY.to_string(),
                    },
                }),
            }),
            ..Default::default()
        },
        status: None,
    }
}

pub fn grafana_certificate(cr: &Cryostat) -> Certificate {
    Certificate {
        metadata: owned_meta(cr, Endpoint::Grafana.service_name(cr)),
        spec: CertificateSpec {
            dns_names: service_dns_names(cr, Endpoint::Grafana),
            secret_name: grafana_tls_secret_name(cr),
            issuer_ref: IssuerRef {
                name: ca_name(cr),
                kind: None,
            },
            ..Default::default()
        },
        status: None,
    }
}

fn service_dns_names(cr: &Cryostat, endpoint: Endpoint) -> Vec<String> {
    let service = endpoint.service_name(cr);
    let namespace = cr.namespace().unwrap_or_default();
    vec![
        service.clone(),
        format!("{service}.{namespace}.svc"),
        format!("{service}.{namespace}.svc.cluster.local"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CryostatSpec;
    use crate::resources::test_support::cryostat;

    #[test]
    fn ca_chain_references() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let ca = ca_certificate(&cr);
        assert!(ca.spec.is_ca);
        assert_eq!(ca.spec.issuer_ref.name, "demo-self-signed");
        assert_eq!(ca.spec.secret_name, "demo-ca");

        let issuer = ca_issuer(&cr);
        assert_eq!(issuer.spec.ca.map(|ca| ca.secret_name).as_deref(), Some("demo-ca"));
        assert!(self_signed_issuer(&cr).spec.self_signed.is_some());
    }

    #[test]
    fn core_certificate_issues_keystore() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let cert = core_certificate(&cr);
        assert_eq!(cert.metadata.name.as_deref(), Some("demo"));
        assert_eq!(cert.spec.secret_name, "demo-tls");
        assert_eq!(cert.spec.issuer_ref.name, "demo-ca");
        assert_eq!(
            cert.spec.dns_names,
            vec!["demo", "demo.default.svc", "demo.default.svc.cluster.local"]
        );
        let keystore = cert.spec.keystores.and_then(|k| k.pkcs12);
        assert_eq!(
            keystore.map(|k| k.password_secret_ref.name).as_deref(),
            Some("demo-keystore")
        );
    }

    #[test]
    fn grafana_certificate_covers_grafana_service() {
        let cr = cryostat("demo", "default", CryostatSpec::default());
        let cert = grafana_certificate(&cr);
        assert_eq!(cert.metadata.name.as_deref(), Some("demo-grafana"));
        assert_eq!(cert.spec.secret_name, "demo-grafana-tls");
        assert_eq!(cert.spec.dns_names[1], "demo-grafana.default.svc");
    }
}
