//! Well-known resources
//!
//! `ApiResource`s for kinds compiled into the operator and
//! `GroupVersionKind`s for kinds resolved at runtime through the REST mapper.

use crate::crd::{
    ClusterCSIDriver, ClusterOperator, FeatureGate, Infrastructure, Proxy, Storage,
};
use crate::domain::ports::RestMapper;
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;

pub fn storages() -> ApiResource {
    ApiResource::erase::<Storage>(&())
}

pub fn cluster_csi_drivers() -> ApiResource {
    ApiResource::erase::<ClusterCSIDriver>(&())
}

pub fn infrastructures() -> ApiResource {
    ApiResource::erase::<Infrastructure>(&())
}

pub fn feature_gates() -> ApiResource {
    ApiResource::erase::<FeatureGate>(&())
}

pub fn proxies() -> ApiResource {
    ApiResource::erase::<Proxy>(&())
}

pub fn cluster_operators() -> ApiResource {
    ApiResource::erase::<ClusterOperator>(&())
}

pub fn storage_classes() -> ApiResource {
    ApiResource::erase::<StorageClass>(&())
}

pub fn csi_drivers() -> ApiResource {
    ApiResource::erase::<CSIDriver>(&())
}

pub fn deployments() -> ApiResource {
    ApiResource::erase::<Deployment>(&())
}

pub fn custom_resource_definitions() -> ApiResource {
    ApiResource::erase::<CustomResourceDefinition>(&())
}

pub fn namespaces() -> ApiResource {
    ApiResource::erase::<Namespace>(&())
}

pub fn config_maps() -> ApiResource {
    ApiResource::erase::<ConfigMap>(&())
}

pub fn secrets() -> ApiResource {
    ApiResource::erase::<Secret>(&())
}

pub fn services() -> ApiResource {
    ApiResource::erase::<Service>(&())
}

pub fn service_accounts() -> ApiResource {
    ApiResource::erase::<ServiceAccount>(&())
}

pub fn roles() -> ApiResource {
    ApiResource::erase::<Role>(&())
}

pub fn role_bindings() -> ApiResource {
    ApiResource::erase::<RoleBinding>(&())
}

pub fn cluster_roles() -> ApiResource {
    ApiResource::erase::<ClusterRole>(&())
}

pub fn cluster_role_bindings() -> ApiResource {
    ApiResource::erase::<ClusterRoleBinding>(&())
}

pub fn hosted_control_planes() -> ApiResource {
    ApiResource::from_gvk_with_plural(&hosted_control_plane_gvk(), "hostedcontrolplanes")
}

/// VolumeAttributesClass is served at different versions across releases,
/// so it is addressed dynamically.
pub fn volume_attributes_classes() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("storage.k8s.io", "v1beta1", "VolumeAttributesClass"),
        "volumeattributesclasses",
    )
}

// =============================================================================
// Runtime-resolved kinds
// =============================================================================

pub fn subscription_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("operators.coreos.com", "v1alpha1", "Subscription")
}

pub fn cluster_service_version_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("operators.coreos.com", "v1alpha1", "ClusterServiceVersion")
}

pub fn hosted_control_plane_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("hypershift.openshift.io", "v1beta1", "HostedControlPlane")
}

pub fn service_monitor_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("monitoring.coreos.com", "v1", "ServiceMonitor")
}

pub fn prometheus_rule_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("monitoring.coreos.com", "v1", "PrometheusRule")
}

/// Kinds compiled into the operator, resolved without discovery
pub fn builtin(gvk: &GroupVersionKind) -> Option<ApiResource> {
    [
        storages(),
        cluster_csi_drivers(),
        infrastructures(),
        feature_gates(),
        proxies(),
        cluster_operators(),
        storage_classes(),
        csi_drivers(),
        deployments(),
        custom_resource_definitions(),
        namespaces(),
        config_maps(),
        secrets(),
        services(),
        service_accounts(),
        roles(),
        role_bindings(),
        cluster_roles(),
        cluster_role_bindings(),
    ]
    .into_iter()
    .find(|ar| ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind)
}

/// Resolve a kind, trying the compiled-in kinds before the REST mapper
pub async fn resolve(mapper: &dyn RestMapper, gvk: &GroupVersionKind) -> Result<ApiResource> {
    match builtin(gvk) {
        Some(resource) => Ok(resource),
        None => mapper.resource_for(gvk).await,
    }
}

/// Kind of a decoded object
pub fn gvk_of(object: &DynamicObject) -> Result<GroupVersionKind> {
    let types = object.types.as_ref().ok_or_else(|| {
        Error::Internal(format!(
            "object {} has no apiVersion/kind",
            object.metadata.name.as_deref().unwrap_or_default()
        ))
    })?;
    let (group, version) = parse_api_version(&types.api_version);
    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

/// Split `apiVersion` into (group, version); the core group is empty
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}
