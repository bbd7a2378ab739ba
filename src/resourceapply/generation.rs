//! Generation bookkeeping for applied children

use crate::crd::{GenerationStatus, OperatorStatus};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;

/// The `generations[]` entry recording the current generation of `object`
pub fn generation_of(resource: &ApiResource, object: &DynamicObject) -> GenerationStatus {
    GenerationStatus {
        group: resource.group.clone(),
        resource: resource.plural.clone(),
        namespace: object.metadata.namespace.clone().unwrap_or_default(),
        name: object.metadata.name.clone().unwrap_or_default(),
        last_generation: object.metadata.generation.unwrap_or_default(),
    }
}

/// Generation recorded for the child named by `resource`/`namespace`/`name`
pub fn expected_generation(
    status: Option<&OperatorStatus>,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
) -> Option<i64> {
    status?.expected_generation(
        &resource.group,
        &resource.plural,
        namespace.unwrap_or_default(),
        name,
    )
}
