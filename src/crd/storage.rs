//! Storage operator configuration CRD
//!
//! The cluster-scoped singleton `storages.operator.openshift.io/cluster` that
//! drives the operator, and the operator status shape it shares with
//! ClusterCSIDriver.

use crate::crd::conditions::OperatorCondition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the singleton operator config
pub const OPERATOR_CONFIG_NAME: &str = "cluster";

// =============================================================================
// Storage CRD
// =============================================================================

/// Storage configures the cluster storage operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "Storage",
    plural = "storages",
    status = "OperatorStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Whether and how the operator manages its operands
    #[serde(default)]
    pub management_state: ManagementState,

    /// Log level of the operands
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log level of the operator itself and of the CSI driver operators
    #[serde(default)]
    pub operator_log_level: LogLevel,

    /// Configuration observed from the cluster, written by the config observer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_config: Option<serde_json::Value>,

    /// Free-form overrides, not interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported_config_overrides: Option<serde_json::Value>,

    /// Which vSphere storage driver the cluster uses
    #[serde(default, rename = "vsphereStorageDriver")]
    pub vsphere_storage_driver: VSphereStorageDriver,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// User-controlled lifecycle of the operator's reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
    /// Unknown values are treated like Unmanaged
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Removed => write!(f, "Removed"),
            ManagementState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Operand log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
    Trace,
    TraceAll,
    #[serde(other)]
    Unknown,
}

impl LogLevel {
    /// klog verbosity passed to operands with `--v=<n>`
    pub fn verbosity(self) -> u8 {
        match self {
            LogLevel::Normal | LogLevel::Unknown => 2,
            LogLevel::Debug => 4,
            LogLevel::Trace => 6,
            LogLevel::TraceAll => 8,
        }
    }
}

/// vSphere storage driver selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum VSphereStorageDriver {
    #[default]
    #[serde(rename = "")]
    Unset,
    LegacyDeprecatedInTreeDriver,
    CSIWithMigrationDriver,
}

/// Expected generation of a managed child object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub group: String,
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub last_generation: i64,
}

impl GenerationStatus {
    /// Whether this entry tracks the given object
    pub fn matches(&self, group: &str, resource: &str, namespace: &str, name: &str) -> bool {
        self.group == group
            && self.resource == resource
            && self.namespace == namespace
            && self.name == name
    }
}

/// A named version reported by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}

// =============================================================================
// Status
// =============================================================================

/// Status shared by operator-style resources
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStatus {
    #[serde(default)]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<OperatorCondition>,

    #[serde(default)]
    pub versions: Vec<OperandVersion>,

    #[serde(default)]
    pub generations: Vec<GenerationStatus>,

    #[serde(default)]
    pub ready_replicas: i32,
}

impl OperatorStatus {
    /// Recorded expected generation for a child, if any
    pub fn expected_generation(
        &self,
        group: &str,
        resource: &str,
        namespace: &str,
        name: &str,
    ) -> Option<i64> {
        self.generations
            .iter()
            .find(|g| g.matches(group, resource, namespace, name))
            .map(|g| g.last_generation)
    }

    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.version.as_str())
    }
}

impl Storage {
    pub fn conditions(&self) -> &[OperatorCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn is_managed(&self) -> bool {
        self.spec.management_state == ManagementState::Managed
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
