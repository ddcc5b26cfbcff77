//! Generated credential secrets.
//!
//! Values are random on every build; the reconciler only ever creates these
//! secrets, so a password is fixed once the secret exists.

use crate::crd::Cryostat;
use crate::resources::owned_meta;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const GRAFANA_USER_KEY: &str = "GF_SECURITY_ADMIN_USER";
pub const GRAFANA_PASSWORD_KEY: &str = "GF_SECURITY_ADMIN_PASSWORD";
pub const JMX_USER_KEY: &str = "CRYOSTAT_RJMX_USER";
pub const JMX_PASSWORD_KEY: &str = "CRYOSTAT_RJMX_PASS";
pub const KEYSTORE_PASSWORD_KEY: &str = "KEYSTORE_PASS";

pub fn grafana_secret_name(cr: &Cryostat) -> String {
    format!("{}-grafana-basic", cr.name_any())
}

pub fn jmx_secret_name(cr: &Cryostat) -> String {
    format!("{}-jmx-auth", cr.name_any())
}

pub fn keystore_secret_name(cr: &Cryostat) -> String {
    format!("{}-keystore", cr.name_any())
}

/// Grafana admin credentials
pub fn grafana_secret(cr: &Cryostat) -> Secret {
    credential_secret(
        cr,
        grafana_secret_name(cr),
        [
            (GRAFANA_USER_KEY, "admin".to_string()),
            (GRAFANA_PASSWORD_KEY, generate_password()),
        ],
    )
}

/// Credentials Cryostat presents to JMX targets
pub fn jmx_secret(cr: &Cryostat) -> Secret {
    credential_secret(
        cr,
        jmx_secret_name(cr),
        [
            (JMX_USER_KEY, "cryostat".to_string()),
            (JMX_PASSWORD_KEY, generate_password()),
        ],
    )
}

/// Password protecting the PKCS12 keystore issued by cert-manager
pub fn keystore_secret(cr: &Cryostat) -> Secret {
    credential_secret(
        cr,
        keystore_secret_name(cr),
        [(KEYSTORE_PASSWORD_KEY, generate_password())],
    )
}

fn credential_secret<const N: usize>(
    cr: &Cryostat,
    name: String,
    entries: [(&str, String); N],
) -> Secret {
    Secret {
        metadata: owned_meta(cr, name),
        string_data: Some(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

fn generate_password() -> String {
    Uuid::new_v4().simple().to_string()
}
