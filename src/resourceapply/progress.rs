//! Rollout evaluation of operand Deployments

use k8s_openapi::api::apps::v1::Deployment;

/// Availability and rollout state of a Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentProgress {
    /// At least one replica is available
    pub available: bool,
    /// Why the rollout is still in progress, `None` once it is complete
    pub progressing: Option<&'static str>,
}

impl DeploymentProgress {
    pub fn is_complete(&self) -> bool {
        self.progressing.is_none()
    }
}

pub fn deployment_progress(deployment: &Deployment) -> DeploymentProgress {
    let status = deployment.status.clone().unwrap_or_default();
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let available = status.available_replicas.unwrap_or_default();
    let observed = status.observed_generation.unwrap_or_default();
    let generation = deployment.metadata.generation.unwrap_or_default();

    let progressing = if observed < generation {
        Some("Waiting for deployment to observe changes")
    } else if status.unavailable_replicas.unwrap_or_default() > 0 {
        Some("Waiting for pods")
    } else if status.updated_replicas.unwrap_or_default() < desired {
        Some("Waiting for rollout")
    } else if available < desired {
        Some("Waiting for pods")
    } else {
        None
    };

    DeploymentProgress {
        available: available > 0,
        progressing,
    }
}
