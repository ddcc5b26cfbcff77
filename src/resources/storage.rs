//! Persistent storage for recordings, templates and configuration.

use crate::constants::DEFAULT_STORAGE_REQUEST;
use crate::crd::Cryostat;
use crate::resources::{app_labels, owned_meta};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;

/// Claim named after the instance. User labels are merged under `app=<name>`,
/// and missing access modes or storage requests are filled with defaults.
pub fn persistent_volume_claim(cr: &Cryostat) -> PersistentVolumeClaim {
    let config = cr
        .spec
        .storage_options
        .as_ref()
        .and_then(|options| options.pvc.clone())
        .unwrap_or_default();

    let mut meta = owned_meta(cr, cr.name_any());
    let mut labels = config.labels;
    labels.extend(app_labels(cr));
    meta.labels = Some(labels);
    if !config.annotations.is_empty() {
        meta.annotations = Some(config.annotations);
    }

    let mut spec = config.spec.unwrap_or_default();
    if spec.access_modes.as_ref().is_none_or(Vec::is_empty) {
        spec.access_modes = Some(vec!["ReadWriteOnce".to_string()]);
    }
    let resources = spec
        .resources
        .get_or_insert_with(VolumeResourceRequirements::default);
    resources
        .requests
        .get_or_insert_with(Default::default)
        .entry("storage".to_string())
        .or_insert_with(|| Quantity(DEFAULT_STORAGE_REQUEST.to_string()));

    PersistentVolumeClaim {
        metadata: meta,
        spec: Some(spec),
        ..Default::default()
    }
}
