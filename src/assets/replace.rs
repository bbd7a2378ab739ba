//! `${PLACEHOLDER}` substitution in rendered assets

use crate::config::Environment;
use crate::crd::{LogLevel, TopologyMode};

/// Sidecar images shared by every CSI driver operator
const SIDECAR_IMAGES: &[&str] = &[
    "PROVISIONER_IMAGE",
    "ATTACHER_IMAGE",
    "RESIZER_IMAGE",
    "SNAPSHOTTER_IMAGE",
    "NODE_DRIVER_REGISTRAR_IMAGE",
    "LIVENESS_PROBE_IMAGE",
    "KUBE_RBAC_PROXY_IMAGE",
];

/// Variables substituted verbatim in every rendered workload
const COMMON_VARS: &[&str] = &[
    "HYPERSHIFT_IMAGE",
    "CLUSTER_CLOUD_CONTROLLER_MANAGER_OPERATOR_IMAGE",
    "OPERATOR_IMAGE_VERSION",
];

/// Ordered list of placeholder substitutions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacer {
    pairs: Vec<(String, String)>,
}

impl Replacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitute `${name}` with `value`
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.pairs.push((format!("${{{name}}}"), value.into()));
        self
    }

    pub fn extend(mut self, other: Replacer) -> Self {
        self.pairs.extend(other.pairs);
        self
    }

    pub fn replace(&self, input: &str) -> String {
        self.pairs
            .iter()
            .fold(input.to_string(), |acc, (from, to)| acc.replace(from, to))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Placeholders backed by environment variables: `(placeholder, variable)`
pub fn env_replacer(env: &Environment, pairs: &[(&str, &str)]) -> Replacer {
    pairs
        .iter()
        .fold(Replacer::new(), |r, (placeholder, var)| r.with(placeholder, env.get(var)))
}

/// Sidecar images plus the variables every workload may reference
pub fn common_replacer(env: &Environment) -> Replacer {
    SIDECAR_IMAGES
        .iter()
        .chain(COMMON_VARS)
        .fold(Replacer::new(), |r, var| r.with(var, env.get(var)))
}

pub fn log_level_replacer(level: LogLevel) -> Replacer {
    Replacer::new().with("LOG_LEVEL", level.verbosity().to_string())
}

pub fn namespace_replacer(namespace: &str) -> Replacer {
    Replacer::new().with("NAMESPACE", namespace)
}

/// Leader-election timings for operands; single-node clusters tolerate longer API outages
pub fn leader_election_replacer(topology: TopologyMode) -> Replacer {
    let (lease, renew, retry) = match topology {
        TopologyMode::SingleReplica => ("270s", "240s", "60s"),
        _ => ("137s", "107s", "26s"),
    };
    Replacer::new()
        .with("LEADER_ELECTION_LEASE_DURATION", lease)
        .with("LEADER_ELECTION_RENEW_DEADLINE", renew)
        .with("LEADER_ELECTION_RETRY_PERIOD", retry)
}
