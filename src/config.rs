//! Operator configuration
//!
//! Process-wide settings resolved once at startup: namespaces, timings, the
//! release version and a snapshot of the image environment used when
//! rendering operand manifests.

use std::collections::BTreeMap;
use std::time::Duration;

/// Namespace the operator and the problem detector run in
pub const OPERATOR_NAMESPACE: &str = "openshift-cluster-storage-operator";

/// Namespace of the CSI driver operators in standalone mode
pub const CSI_DRIVER_NAMESPACE: &str = "openshift-cluster-csi-drivers";

/// Name of the ClusterOperator this operator reports through
pub const CLUSTER_OPERATOR_NAME: &str = "storage";

/// Version name of the operator itself in `status.versions`
pub const OPERATOR_VERSION_NAME: &str = "operator";

/// Environment variables captured besides the `*_IMAGE` pins
const EXTRA_ENV_VARS: &[&str] = &[
    "RELEASE_VERSION",
    "OPERATOR_IMAGE_VERSION",
    "ARO_HCP_SECRET_PROVIDER_CLASS_FOR_DISK",
    "ARO_HCP_SECRET_PROVIDER_CLASS_FOR_FILE",
    "RUN_AS_USER",
];

/// Snapshot of the process environment; unset variables read as empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture every `*_IMAGE` variable plus the other recognised variables
    pub fn capture() -> Self {
        Self::from_pairs(std::env::vars().filter(|(name, _)| {
            name.ends_with("_IMAGE") || EXTRA_ENV_VARS.contains(&name.as_str())
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> &str {
        self.vars.get(name).map(String::as_str).unwrap_or_default()
    }
}

/// Settings shared by every controller
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace of the operator and its own operands
    pub operator_namespace: String,
    /// Namespace CSI driver operators are deployed into; the control plane
    /// namespace in hosted mode
    pub csi_driver_namespace: String,
    /// Periodic resync of every controller
    pub resync_interval: Duration,
    /// How long a `*Degraded` condition must stay True before it degrades the ClusterOperator
    pub degraded_inertia: Duration,
    /// Hard limit for the initial FeatureGate observation
    pub feature_gate_timeout: Duration,
    /// Version recorded once the operator has converged
    pub release_version: String,
    pub environment: Environment,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: OPERATOR_NAMESPACE.to_string(),
            csi_driver_namespace: CSI_DRIVER_NAMESPACE.to_string(),
            resync_interval: Duration::from_secs(60),
            degraded_inertia: Duration::from_secs(120),
            feature_gate_timeout: Duration::from_secs(60),
            release_version: String::new(),
            environment: Environment::default(),
        }
    }
}

impl OperatorConfig {
    /// Defaults plus the process environment
    pub fn from_env() -> Self {
        let environment = Environment::capture();
        Self {
            release_version: environment.get("RELEASE_VERSION").to_string(),
            environment,
            ..Default::default()
        }
    }
}
