//! ClusterCSIDriver CRD
//!
//! One object per CSI driver, named after the driver. The operator creates it
//! and the CSI driver operator reports its health in the status.

use crate::crd::conditions::OperatorCondition;
use crate::crd::storage::{LogLevel, ManagementState, OperatorStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterCSIDriver configures a single CSI driver operator.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "ClusterCSIDriver",
    plural = "clustercsidrivers",
    status = "OperatorStatus",
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCSIDriverSpec {
    #[serde(default)]
    pub management_state: ManagementState,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub operator_log_level: LogLevel,

    /// Driver specific configuration, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_config: Option<serde_json::Value>,

    /// Whether the driver operator manages its StorageClass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_state: Option<String>,
}

impl ClusterCSIDriver {
    pub fn conditions(&self) -> &[OperatorCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}
