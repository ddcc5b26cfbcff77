//! # Deployment
//!
//! The Cryostat Deployment. In full mode the pod runs three containers: the
//! core application, the Grafana dashboard and the JFR datasource backing it.
//! Minimal mode runs the core container alone.
//!
//! Every Deployment carries two annotations:
//!
//! - `operator.cryostat.io/deployment-mode` records which topology it was built for
//! - `operator.cryostat.io/pod-template-hash` is the sha256 of the pod template
//!   as last written, so an unchanged template never causes a write

use crate::config::ImageTags;
use crate::constants::{
    CORE_COMMAND_PORT, CORE_JMX_PORT, CORE_WEB_PORT, DATASOURCE_PORT, DEPLOYMENT_MODE_ANNOTATION,
    GRAFANA_PORT, POD_TEMPLATE_HASH_ANNOTATION,
};
use crate::crd::Cryostat;
use crate::resources::certificates::{core_tls_secret_name, grafana_tls_secret_name, CA_CERT_KEY};
use crate::resources::secrets::{grafana_secret_name, jmx_secret_name, keystore_secret_name};
use crate::resources::{owned_meta, selector_labels, ExternalUrl, ServiceUrls};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource, EnvVar, ExecAction,
    HTTPGetAction, KeyToPath, PersistentVolumeClaimVolumeSource, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, ProjectedVolumeSource, SecretEnvSource, SecretProjection,
    SecretVolumeSource, Volume, VolumeMount, VolumeProjection,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::LazyLock;

const CONFIG_ROOT: &str = "/opt/cryostat.d";
const SECRETS_ROOT: &str = "/var/run/secrets/operator.cryostat.io";
const DATASOURCE_URL: &str = "http://127.0.0.1:8080";
const READ_ONLY_MODE: i32 = 0o440;

/// Start of the GID range in an OpenShift supplemental groups annotation, e.g. `1000130000/10000`
static SUPPLEMENTAL_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+").expect("supplemental groups pattern is valid"));

/// Topology a Deployment was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Minimal,
    Full,
}

impl DeploymentMode {
    pub fn for_instance(cr: &Cryostat) -> Self {
        if cr.spec.minimal {
            Self::Minimal
        } else {
            Self::Full
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Full => "full",
        }
    }

    /// Mode of a live Deployment.
    ///
    /// Read from the mode annotation; Deployments created before the annotation
    /// existed are classified by container count (one container means minimal).
    pub fn of(deployment: &Deployment) -> Option<Self> {
        let annotated = deployment
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(DEPLOYMENT_MODE_ANNOTATION))
            .and_then(|mode| match mode.as_str() {
                "minimal" => Some(Self::Minimal),
                "full" => Some(Self::Full),
                _ => None,
            });
        if annotated.is_some() {
            return annotated;
        }
        let containers = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .map_or(0, |pod| pod.containers.len());
        match containers {
            0 => None,
            1 => Some(Self::Minimal),
            _ => Some(Self::Full),
        }
    }
}

/// Everything the pod template depends on besides the instance itself
#[derive(Debug, Clone, Copy)]
pub struct WorkloadInputs<'a> {
    pub images: &'a ImageTags,
    pub urls: &'a ServiceUrls,
    /// TLS requested and cert-manager available
    pub tls: bool,
    pub fs_group: i64,
}

/// Desired Deployment, annotated with its mode and pod template hash
pub fn deployment(cr: &Cryostat, inputs: WorkloadInputs<'_>) -> Result<Deployment, serde_json::Error> {
    let mode = DeploymentMode::for_instance(cr);
    let template = pod_template(cr, mode, inputs);
    let hash = pod_template_hash(&template)?;

    let mut meta = owned_meta(cr, cr.name_any());
    meta.labels = Some(selector_labels(cr));
    meta.annotations = Some(BTreeMap::from([
        (DEPLOYMENT_MODE_ANNOTATION.to_string(), mode.as_str().to_string()),
        (POD_TEMPLATE_HASH_ANNOTATION.to_string(), hash),
    ]));

    Ok(Deployment {
        metadata: meta,
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(cr)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn pod_template_hash(template: &PodTemplateSpec) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(template)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Hash annotation of a live Deployment
pub fn recorded_template_hash(deployment: &Deployment) -> Option<&str> {
    deployment
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(POD_TEMPLATE_HASH_ANNOTATION))
        .map(String::as_str)
}

/// Whether the live pod template still carries everything the desired one sets
///
/// Fields the API server defaults on the live object are ignored; any desired
/// pod spec field or selector label that is missing or different is drift.
pub fn template_applied(live: &Deployment, desired: &Deployment) -> Result<bool, serde_json::Error> {
    let template = |d: &Deployment| d.spec.as_ref().map(|s| s.template.clone()).unwrap_or_default();
    let (live, desired) = (template(live), template(desired));

    let labels = |t: &PodTemplateSpec| {
        t.metadata
            .as_ref()
            .and_then(|m| m.labels.clone())
            .unwrap_or_default()
    };
    let live_labels = labels(&live);
    let labels_kept = labels(&desired)
        .iter()
        .all(|(key, value)| live_labels.get(key) == Some(value));

    let live_spec = serde_json::to_value(&live.spec)?;
    let desired_spec = serde_json::to_value(&desired.spec)?;
    Ok(labels_kept && contains(&live_spec, &desired_spec))
}

/// `desired` is contained in `live`: objects key by key, arrays element by element
fn contains(live: &Value, desired: &Value) -> bool {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => desired
            .iter()
            .all(|(key, value)| live.get(key).is_some_and(|l| contains(l, value))),
        (Value::Array(live), Value::Array(desired)) => {
            live.len() == desired.len() && live.iter().zip(desired).all(|(l, d)| contains(l, d))
        }
        _ => live == desired,
    }
}

/// fsGroup from the supplemental groups annotation, `None` if it does not start with a GID
pub fn parse_supplemental_groups(value: &str) -> Option<i64> {
    SUPPLEMENTAL_GROUPS
        .find(value.trim())
        .and_then(|m| m.as_str().parse().ok())
}

fn pod_template(cr: &Cryostat, mode: DeploymentMode, inputs: WorkloadInputs<'_>) -> PodTemplateSpec {
    let mut containers = vec![core_container(cr, mode, inputs)];
    if mode == DeploymentMode::Full {
        containers.push(grafana_container(cr, inputs));
        containers.push(datasource_container(cr, inputs));
    }

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            name: Some(cr.name_any()),
            namespace: cr.namespace(),
            labels: Some(selector_labels(cr)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            service_account_name: Some(cr.name_any()),
            volumes: Some(volumes(cr, mode, inputs.tls)),
            containers,
            security_context: Some(PodSecurityContext {
                fs_group: Some(inputs.fs_group),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

fn core_container(cr: &Cryostat, mode: DeploymentMode, inputs: WorkloadInputs<'_>) -> Container {
    let name = cr.name_any();
    let mut env = vec![
        env_var("CRYOSTAT_SSL_PROXIED", "true"),
        env_var("CRYOSTAT_ALLOW_UNTRUSTED_SSL", "true"),
        env_var("CRYOSTAT_WEB_PORT", CORE_WEB_PORT.to_string()),
    ];
    if let Some(url) = &inputs.urls.core {
        env.extend(external_address("CRYOSTAT_EXT_WEB_PORT", "CRYOSTAT_WEB_HOST", url));
    }
    env.push(env_var("CRYOSTAT_LISTEN_PORT", CORE_COMMAND_PORT.to_string()));
    if let Some(url) = &inputs.urls.command {
        env.extend(external_address(
            "CRYOSTAT_EXT_LISTEN_PORT",
            "CRYOSTAT_LISTEN_HOST",
            url,
        ));
    }
    env.extend([
        env_var("CRYOSTAT_CONFIG_PATH", format!("{CONFIG_ROOT}/conf.d")),
        env_var("CRYOSTAT_ARCHIVE_PATH", format!("{CONFIG_ROOT}/recordings.d")),
        env_var("CRYOSTAT_TEMPLATE_PATH", format!("{CONFIG_ROOT}/templates.d")),
        env_var("CRYOSTAT_CLIENTLIB_PATH", format!("{CONFIG_ROOT}/clientlib.d")),
    ]);
    if mode == DeploymentMode::Full {
        if let Some(url) = &inputs.urls.grafana {
            env.push(env_var("GRAFANA_DASHBOARD_URL", url.to_string()));
        }
        env.push(env_var("GRAFANA_DATASOURCE_URL", DATASOURCE_URL));
    }

    let mut env_from = vec![secret_env(jmx_secret_name(cr))];
    let mut mounts = vec![
        pvc_mount(&name, "conf.d", "config"),
        pvc_mount(&name, "recordings.d", "flightrecordings"),
        pvc_mount(&name, "templates.d", "templates"),
        pvc_mount(&name, "clientlib.d", "clientlib"),
        VolumeMount {
            name: name.clone(),
            mount_path: "/truststore".to_string(),
            sub_path: Some("truststore".to_string()),
            ..Default::default()
        },
    ];

    if inputs.tls {
        let keystore_dir = format!("{SECRETS_ROOT}/{}", core_tls_secret_name(cr));
        env.push(env_var("KEYSTORE_PATH", format!("{keystore_dir}/keystore.p12")));
        env_from.push(secret_env(keystore_secret_name(cr)));
        mounts.push(read_only_mount("keystore", keystore_dir));
    } else {
        env.push(env_var("CRYOSTAT_DISABLE_SSL", "true"));
    }
    if !cert_projections(cr, inputs.tls).is_empty() {
        mounts.push(read_only_mount("cert-secrets", "/truststore/operator"));
    }
    for template in &cr.spec.event_templates {
        mounts.push(VolumeMount {
            name: template_volume_name(&template.config_map_name),
            mount_path: format!(
                "{CONFIG_ROOT}/templates.d/{}_{}",
                template.config_map_name, template.filename
            ),
            sub_path: Some(template.filename.clone()),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let scheme = if inputs.tls { "HTTPS" } else { "HTTP" };
    let probe = http_probe("/api/v1/clienturl", CORE_WEB_PORT, scheme);

    Container {
        name,
        image: Some(inputs.images.core.clone()),
        ports: Some(container_ports(&[CORE_WEB_PORT, CORE_COMMAND_PORT, CORE_JMX_PORT])),
        env: Some(env),
        env_from: Some(env_from),
        volume_mounts: Some(mounts),
        liveness_probe: Some(probe.clone()),
        startup_probe: Some(Probe {
            failure_threshold: Some(18),
            ..probe
        }),
        ..Default::default()
    }
}

fn grafana_container(cr: &Cryostat, inputs: WorkloadInputs<'_>) -> Container {
    let mut env = vec![env_var("JFR_DATASOURCE_URL", DATASOURCE_URL)];
    let mut mounts = Vec::new();
    if inputs.tls {
        let cert_dir = format!("{SECRETS_ROOT}/{}", grafana_tls_secret_name(cr));
        env.extend([
            env_var("GF_SERVER_PROTOCOL", "https"),
            env_var("GF_SERVER_CERT_KEY", format!("{cert_dir}/tls.key")),
            env_var("GF_SERVER_CERT_FILE", format!("{cert_dir}/tls.crt")),
        ]);
        mounts.push(read_only_mount("grafana-tls-secret", cert_dir));
    }
    let scheme = if inputs.tls { "HTTPS" } else { "HTTP" };

    Container {
        name: format!("{}-grafana", cr.name_any()),
        image: Some(inputs.images.grafana.clone()),
        ports: Some(container_ports(&[GRAFANA_PORT])),
        env: Some(env),
        env_from: Some(vec![secret_env(grafana_secret_name(cr))]),
        volume_mounts: Some(mounts),
        liveness_probe: Some(http_probe("/api/health", GRAFANA_PORT, scheme)),
        ..Default::default()
    }
}

fn datasource_container(cr: &Cryostat, inputs: WorkloadInputs<'_>) -> Container {
    Container {
        name: format!("{}-jfr-datasource", cr.name_any()),
        image: Some(inputs.images.datasource.clone()),
        ports: Some(container_ports(&[DATASOURCE_PORT])),
        env: Some(vec![env_var("LISTEN_HOST", "127.0.0.1")]),
        liveness_probe: Some(Probe {
            exec: Some(ExecAction {
                command: Some(vec![
                    "curl".to_string(),
                    "--fail".to_string(),
                    DATASOURCE_URL.to_string(),
                ]),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn volumes(cr: &Cryostat, mode: DeploymentMode, tls: bool) -> Vec<Volume> {
    let mut volumes = vec![Volume {
        name: cr.name_any(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: cr.name_any(),
            read_only: Some(false),
        }),
        ..Default::default()
    }];

    let projections = cert_projections(cr, tls);
    if !projections.is_empty() {
        volumes.push(Volume {
            name: "cert-secrets".to_string(),
            projected: Some(ProjectedVolumeSource {
                sources: Some(projections),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    if tls {
        volumes.push(Volume {
            name: "keystore".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(core_tls_secret_name(cr)),
                items: Some(vec![read_only_item("keystore.p12", "keystore.p12")]),
                ..Default::default()
            }),
            ..Default::default()
        });
        if mode == DeploymentMode::Full {
            volumes.push(Volume {
                name: "grafana-tls-secret".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(grafana_tls_secret_name(cr)),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
    }

    for template in &cr.spec.event_templates {
        volumes.push(Volume {
            name: template_volume_name(&template.config_map_name),
            config_map: Some(ConfigMapVolumeSource {
                name: template.config_map_name.clone(),
                items: Some(vec![read_only_item(&template.filename, &template.filename)]),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    volumes
}

/// Certificates added to the core trust store: the instance CA when TLS is on,
/// then each user-supplied secret as `<secret>_<key>`
fn cert_projections(cr: &Cryostat, tls: bool) -> Vec<VolumeProjection> {
    let mut projections = Vec::new();
    if tls {
        projections.push(secret_projection(
            core_tls_secret_name(cr),
            CA_CERT_KEY,
            format!("{}-ca.crt", cr.name_any()),
        ));
    }
    for secret in &cr.spec.trusted_cert_secrets {
        projections.push(secret_projection(
            secret.secret_name.clone(),
            secret.key(),
            format!("{}_{}", secret.secret_name, secret.key()),
        ));
    }
    projections
}

fn secret_projection(secret_name: String, key: &str, path: String) -> VolumeProjection {
    VolumeProjection {
        secret: Some(SecretProjection {
            name: secret_name,
            items: Some(vec![read_only_item(key, &path)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn template_volume_name(config_map: &str) -> String {
    format!("template-{config_map}")
}

fn read_only_item(key: &str, path: &str) -> KeyToPath {
    KeyToPath {
        key: key.to_string(),
        path: path.to_string(),
        mode: Some(READ_ONLY_MODE),
    }
}

fn pvc_mount(volume: &str, dir: &str, sub_path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: format!("{CONFIG_ROOT}/{dir}"),
        sub_path: Some(sub_path.to_string()),
        read_only: Some(false),
        ..Default::default()
    }
}

fn read_only_mount(volume: &str, path: impl Into<String>) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.into(),
        read_only: Some(true),
        ..Default::default()
    }
}

fn external_address(port_var: &str, host_var: &str, url: &ExternalUrl) -> [EnvVar; 2] {
    [
        env_var(port_var, url.scheme.external_port().to_string()),
        env_var(host_var, url.host.clone()),
    ]
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

fn secret_env(secret_name: String) -> EnvFromSource {
    EnvFromSource {
        secret_ref: Some(SecretEnvSource {
            name: secret_name,
            optional: None,
        }),
        ..Default::default()
    }
}

fn container_ports(ports: &[i32]) -> Vec<ContainerPort> {
    ports
        .iter()
        .map(|&container_port| ContainerPort {
            container_port,
            ..Default::default()
        })
        .collect()
}

fn http_probe(path: &str, port: i32, scheme: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            scheme: Some(scheme.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
