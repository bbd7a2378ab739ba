//! Cluster configuration CRDs (`config.openshift.io/v1`)
//!
//! Read-only inputs (Infrastructure, FeatureGate, Proxy) and the
//! ClusterOperator health object this operator writes.

use crate::crd::conditions::OperatorCondition;
use crate::crd::storage::OperandVersion;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name of every config.openshift.io singleton this operator reads
pub const CLUSTER_CONFIG_NAME: &str = "cluster";

// =============================================================================
// Infrastructure
// =============================================================================

/// Infrastructure describes the platform the cluster runs on.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Infrastructure",
    plural = "infrastructures",
    status = "InfrastructureStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_spec: Option<serde_json::Value>,
}

/// Platform types known to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PlatformType {
    AWS,
    GCP,
    Azure,
    VSphere,
    OpenStack,
    IBMCloud,
    PowerVS,
    AlibabaCloud,
    Ovirt,
    Kubevirt,
    BareMetal,
    None,
    External,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlatformType::AWS => "AWS",
            PlatformType::GCP => "GCP",
            PlatformType::Azure => "Azure",
            PlatformType::VSphere => "VSphere",
            PlatformType::OpenStack => "OpenStack",
            PlatformType::IBMCloud => "IBMCloud",
            PlatformType::PowerVS => "PowerVS",
            PlatformType::AlibabaCloud => "AlibabaCloud",
            PlatformType::Ovirt => "Ovirt",
            PlatformType::Kubevirt => "Kubevirt",
            PlatformType::BareMetal => "BareMetal",
            PlatformType::None => "None",
            PlatformType::External => "External",
            PlatformType::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Control plane topology of the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TopologyMode {
    #[default]
    HighlyAvailable,
    SingleReplica,
    External,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    #[serde(default)]
    pub infrastructure_name: String,

    #[serde(default)]
    pub platform_status: Option<PlatformStatus>,

    #[serde(default)]
    pub control_plane_topology: TopologyMode,

    #[serde(default)]
    pub infrastructure_topology: TopologyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    pub r#type: PlatformType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzurePlatformStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzurePlatformStatus {
    #[serde(default)]
    pub cloud_name: String,
}

impl Infrastructure {
    /// Platform type, `None` when the status carries no platform
    pub fn platform(&self) -> Option<PlatformType> {
        self.status
            .as_ref()
            .and_then(|s| s.platform_status.as_ref())
            .map(|p| p.r#type)
    }

    pub fn control_plane_topology(&self) -> TopologyMode {
        self.status
            .as_ref()
            .map(|s| s.control_plane_topology)
            .unwrap_or_default()
    }

    pub fn azure_cloud_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.platform_status.as_ref())
            .and_then(|p| p.azure.as_ref())
            .map(|a| a.cloud_name.as_str())
    }
}

// =============================================================================
// FeatureGate
// =============================================================================

/// FeatureGate lists the enabled and disabled gates per release version.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "FeatureGate",
    plural = "featuregates",
    status = "FeatureGateStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateSpec {
    #[serde(default)]
    pub feature_set: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateStatus {
    #[serde(default)]
    pub feature_gates: Vec<FeatureGateDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateDetails {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub enabled: Vec<FeatureGateAttributes>,
    #[serde(default)]
    pub disabled: Vec<FeatureGateAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FeatureGateAttributes {
    pub name: String,
}

/// Resolved view of the gates for one release version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureGates {
    enabled: BTreeSet<String>,
    disabled: BTreeSet<String>,
}

impl FeatureGates {
    pub fn new<I, J, S>(enabled: I, disabled: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
            disabled: disabled.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_known(&self, gate: &str) -> bool {
        self.enabled.contains(gate) || self.disabled.contains(gate)
    }

    pub fn is_enabled(&self, gate: &str) -> bool {
        self.enabled.contains(gate)
    }
}

impl FeatureGate {
    /// Gates for `version`; with an empty version the first entry is used
    pub fn gates_for(&self, version: &str) -> Option<FeatureGates> {
        let details = self.status.as_ref()?.feature_gates.iter().find(|d| {
            version.is_empty() || d.version == version
        })?;
        Some(FeatureGates::new(
            details.enabled.iter().map(|g| g.name.clone()),
            details.disabled.iter().map(|g| g.name.clone()),
        ))
    }
}

// =============================================================================
// Proxy
// =============================================================================

/// Proxy holds the cluster-wide egress proxy configuration.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Proxy",
    plural = "proxies",
    status = "ProxyStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub no_proxy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStatus {
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub no_proxy: String,
}

// =============================================================================
// ClusterOperator
// =============================================================================

/// ClusterOperator is the cluster-wide health and version façade.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "ClusterOperator",
    plural = "clusteroperators",
    status = "ClusterOperatorStatus",
    namespaced = false
)]
pub struct ClusterOperatorSpec {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    #[serde(default)]
    pub conditions: Vec<OperatorCondition>,
    #[serde(default)]
    pub versions: Vec<OperandVersion>,
    #[serde(default)]
    pub related_objects: Vec<ObjectReference>,
}

/// Reference to an object exposed for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ObjectReference {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

impl ObjectReference {
    pub fn new(
        group: impl Into<String>,
        resource: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}
