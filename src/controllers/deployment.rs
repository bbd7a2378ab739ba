//! Operand Deployment reconciliation
//!
//! Renders a Deployment asset, adjusts it for the cluster (proxy, topology,
//! hosted control plane placement), applies it guarded by a spec hash and
//! reports `<prefix>Available` / `<prefix>Progressing`. The operand version
//! is recorded once a rollout completes.

use crate::assets::replace::{leader_election_replacer, log_level_replacer};
use crate::assets::AssetLoader;
use crate::client::resources;
use crate::client::typed::{from_dynamic, to_dynamic};
use crate::controllers::configobserver::proxy_from_observed_config;
use crate::controllers::ControllerContext;
use crate::crd::{is_condition_true, ConditionStatus, OperatorCondition, Storage, TopologyMode};
use crate::domain::ports::ObjectReader;
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::operator::StatusUpdate;
use crate::resourceapply::generation::expected_generation;
use crate::resourceapply::{apply_with_spec_hash, deployment_progress, generation_of};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{EnvVar, PodSecurityContext, PodSpec, Toleration};
use kube::api::DynamicObject;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Annotation listing the containers that receive the cluster proxy
pub const INJECT_PROXY_ANNOTATION: &str = "config.openshift.io/inject-proxy";

/// Pod label tying hosted control plane pods to their HostedControlPlane
pub const HOSTED_CONTROL_PLANE_LABEL: &str = "hypershift.openshift.io/hosted-control-plane";

/// Render a deployment asset for the operator config and the control plane topology.
///
/// Hosted control plane placement is applied separately since it needs the
/// HostedControlPlane object.
pub fn render_deployment(
    loader: &AssetLoader,
    asset: &str,
    storage: &Storage,
    topology: TopologyMode,
) -> Result<Deployment> {
    let loader = loader
        .with(log_level_replacer(storage.spec.log_level))
        .with(leader_election_replacer(topology));
    let mut deployment: Deployment = from_dynamic(loader.load(asset)?)?;

    inject_proxy(
        &mut deployment,
        &proxy_from_observed_config(storage.spec.observed_config.as_ref()),
    );
    if topology == TopologyMode::External {
        if let Some(pod) = pod_spec(&mut deployment) {
            pod.node_selector = None;
        }
    }
    Ok(deployment)
}

pub struct DeploymentController {
    name: String,
    condition_prefix: String,
    version_name: String,
    asset: String,
    loader: AssetLoader,
    gate: Option<String>,
    /// Namespace watched for the Deployment
    namespace: String,
    ctx: ControllerContext,
}

/// Set `env` on every container named in the inject-proxy annotation
pub fn inject_proxy(deployment: &mut Deployment, env: &BTreeMap<String, String>) {
    let targets: Vec<String> = deployment
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(INJECT_PROXY_ANNOTATION))
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    if targets.is_empty() || env.is_empty() {
        return;
    }
    let Some(pod) = pod_spec(deployment) else {
        return;
    };
    for container in pod
        .containers
        .iter_mut()
        .filter(|c| targets.contains(&c.name))
    {
        let vars = container.env.get_or_insert_with(Vec::new);
        for (name, value) in env {
            match vars.iter_mut().find(|v| &v.name == name) {
                Some(var) => {
                    var.value = Some(value.clone());
                    var.value_from = None;
                }
                None => vars.push(EnvVar {
                    name: name.clone(),
                    value: Some(value.clone()),
                    value_from: None,
                }),
            }
        }
    }
}

fn pod_spec(deployment: &mut Deployment) -> Option<&mut PodSpec> {
    deployment.spec.as_mut()?.template.spec.as_mut()
}

/// Move a workload onto the nodes and tolerations of its HostedControlPlane
pub fn apply_hosted_control_plane(
    deployment: &mut Deployment,
    namespace: &str,
    hcp: Option<&DynamicObject>,
    run_as_user: Option<i64>,
) -> Result<()> {
    let template = &mut deployment
        .spec
        .get_or_insert_with(Default::default)
        .template;
    template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default)
        .insert(HOSTED_CONTROL_PLANE_LABEL.to_string(), namespace.to_string());

    let pod = template.spec.get_or_insert_with(Default::default);
    if let Some(hcp) = hcp {
        if let Some(selector) = hcp.data.pointer("/spec/nodeSelector") {
            let selector: BTreeMap<String, String> = serde_json::from_value(selector.clone())?;
            pod.node_selector = Some(selector).filter(|s| !s.is_empty());
        }
        if let Some(tolerations) = hcp.data.pointer("/spec/tolerations") {
            let tolerations: Vec<Toleration> = serde_json::from_value(tolerations.clone())?;
            pod.tolerations
                .get_or_insert_with(Vec::new)
                .extend(tolerations);
        }
    }
    if let Some(uid) = run_as_user {
        pod.security_context
            .get_or_insert_with(PodSecurityContext::default)
            .run_as_user = Some(uid);
    }
    Ok(())
}

impl DeploymentController {
    /// `name` is the controller name, `condition_prefix` prefixes the conditions it writes
    pub fn new(
        ctx: ControllerContext,
        name: impl Into<String>,
        condition_prefix: impl Into<String>,
        asset: impl Into<String>,
        loader: AssetLoader,
    ) -> Self {
        let name = name.into();
        Self {
            version_name: name.clone(),
            name,
            condition_prefix: condition_prefix.into(),
            asset: asset.into(),
            loader,
            gate: None,
            namespace: ctx.config.csi_driver_namespace.clone(),
            ctx,
        }
    }

    /// Key of the operand version recorded on completed rollouts
    pub fn with_version_name(mut self, version_name: impl Into<String>) -> Self {
        self.version_name = version_name.into();
        self
    }

    /// Do nothing until condition `gate` is True on the operator config
    pub fn with_gate(mut self, gate: impl Into<String>) -> Self {
        self.gate = Some(gate.into());
        self
    }

    /// The Deployment lives in `namespace` instead of the CSI driver namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_controller(self) -> Controller {
        let mut informers = vec![
            self.ctx.operator.informer(),
            self.ctx
                .guest
                .informers
                .informer(&resources::infrastructures(), None),
            self.ctx
                .management
                .informers
                .informer(&resources::deployments(), Some(&self.namespace)),
        ];
        if let Some(namespace) = &self.ctx.hosted_namespace {
            informers.push(
                self.ctx
                    .management
                    .informers
                    .informer(&resources::hosted_control_planes(), Some(namespace)),
            );
        }
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(self.name.clone(), Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }

    async fn hosted_control_plane(&self, namespace: &str) -> Result<Option<DynamicObject>> {
        Ok(self
            .ctx
            .management
            .cache
            .list(&resources::hosted_control_planes(), Some(namespace))
            .await?
            .into_iter()
            .next())
    }

    async fn render(&self, storage: &Storage, topology: TopologyMode) -> Result<Deployment> {
        let mut deployment = render_deployment(&self.loader, &self.asset, storage, topology)?;
        if let Some(namespace) = &self.ctx.hosted_namespace {
            let hcp = self.hosted_control_plane(namespace).await?;
            let run_as_user = self
                .ctx
                .config
                .environment
                .get("RUN_AS_USER")
                .parse::<i64>()
                .ok();
            apply_hosted_control_plane(&mut deployment, namespace, hcp.as_ref(), run_as_user)?;
        }
        Ok(deployment)
    }

    fn condition(&self, suffix: &str, status: ConditionStatus) -> OperatorCondition {
        OperatorCondition::new(format!("{}{suffix}", self.condition_prefix), status)
    }
}

#[async_trait]
impl SyncHandler for DeploymentController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }
        if let Some(gate) = &self.gate {
            if !is_condition_true(storage.conditions(), gate) {
                debug!(controller = %self.name, %gate, "Waiting for gate condition");
                return Ok(());
            }
        }

        let infra = self.ctx.require_infrastructure().await?;
        let desired = self.render(&storage, infra.control_plane_topology()).await?;

        let resource = resources::deployments();
        let name = desired.metadata.name.clone().unwrap_or_default();
        let namespace = desired.metadata.namespace.clone();
        let expected = expected_generation(
            storage.status.as_ref(),
            &resource,
            namespace.as_deref(),
            &name,
        );
        let applied = apply_with_spec_hash(
            self.ctx.management.store.as_ref(),
            &resource,
            &to_dynamic(&desired)?,
            expected,
        )
        .await?;
        if applied.modified {
            info!(controller = %self.name, deployment = %name, "Applied Deployment");
        }

        let generation = generation_of(&resource, &applied.object);
        let deployment: Deployment = from_dynamic(applied.object)?;
        let progress = deployment_progress(&deployment);

        let available = if progress.available {
            self.condition("Available", ConditionStatus::True).with_reason("AsExpected")
        } else {
            self.condition("Available", ConditionStatus::False)
                .with_reason("Deploying")
                .with_message("Waiting for Deployment to deploy pods")
        };
        let progressing = match progress.progressing {
            Some(message) => self
                .condition("Progressing", ConditionStatus::True)
                .with_reason("Deploying")
                .with_message(message),
            None => self
                .condition("Progressing", ConditionStatus::False)
                .with_reason("AsExpected"),
        };

        let mut update = StatusUpdate::new()
            .condition(available)
            .condition(progressing)
            .generation(generation);
        let release = &self.ctx.config.release_version;
        if progress.is_complete() && !release.is_empty() {
            update = update.version(self.version_name.clone(), release.clone());
        }
        self.ctx.operator.apply_status(&self.name, update).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::replace::namespace_replacer;
    use crate::client::fake::{infrastructure, operator_config, FakeCluster};
    use crate::config::OperatorConfig;
    use crate::crd::{find_condition, PlatformType, StorageSpec};
    use serde_json::json;

    const ASSET: &str = "csidriveroperators/aws-ebs/07_deployment.yaml";

    fn controller(cluster: &Arc<FakeCluster>) -> DeploymentController {
        let config = OperatorConfig {
            release_version: "4.15.0".into(),
            ..Default::default()
        };
        let ctx = ControllerContext::standalone(cluster.clients(), config);
        DeploymentController::new(
            ctx,
            "AWSEBSCSIDriverOperatorDeploymentController",
            "AWSEBSCSIDriverOperatorDeployment",
            ASSET,
            AssetLoader::new(namespace_replacer("openshift-cluster-csi-drivers")),
        )
        .with_version_name("AWSEBSCSIDriverOperator")
    }

    fn seed(cluster: &FakeCluster, spec: StorageSpec) {
        cluster.seed(&operator_config(spec));
        cluster.seed(&infrastructure(Some(PlatformType::AWS)));
    }

    #[tokio::test]
    async fn test_rollout_records_version() {
        let cluster = FakeCluster::new();
        seed(&cluster, StorageSpec::default());
        let controller = controller(&cluster);

        controller.sync(&SyncContext::detached()).await.unwrap();
        let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
        assert!(!is_condition_true(
            storage.conditions(),
            "AWSEBSCSIDriverOperatorDeploymentAvailable"
        ));
        let status = storage.status.unwrap();
        assert_eq!(status.version("AWSEBSCSIDriverOperator"), None);
        assert_eq!(
            status.expected_generation(
                "apps",
                "deployments",
                "openshift-cluster-csi-drivers",
                "aws-ebs-csi-driver-operator"
            ),
            Some(1)
        );

        cluster.set_status(
            &resources::deployments(),
            Some("openshift-cluster-csi-drivers"),
            "aws-ebs-csi-driver-operator",
            json!({"observedGeneration": 1, "availableReplicas": 1, "updatedReplicas": 1}),
        );
        controller.sync(&SyncContext::detached()).await.unwrap();
        let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
        let progressing = find_condition(
            storage.conditions(),
            "AWSEBSCSIDriverOperatorDeploymentProgressing",
        )
        .unwrap();
        assert!(progressing.is_false());
        assert_eq!(
            storage.status.unwrap().version("AWSEBSCSIDriverOperator"),
            Some("4.15.0")
        );
    }

    #[tokio::test]
    async fn test_gate_blocks_apply() {
        let cluster = FakeCluster::new();
        seed(&cluster, StorageSpec::default());
        controller(&cluster)
            .with_gate("AWSEBSOLMOperatorRemovalAvailable")
            .sync(&SyncContext::detached())
            .await
            .unwrap();
        assert!(cluster.actions().is_empty());
    }

    #[tokio::test]
    async fn test_render_substitutes_log_level_and_proxy() {
        let cluster = FakeCluster::new();
        let storage = operator_config(StorageSpec {
            log_level: crate::crd::LogLevel::Debug,
            observed_config: Some(json!({"targetconfig": {"proxy": {"HTTPS_PROXY": "http://p"}}})),
            ..Default::default()
        });
        let deployment = controller(&cluster)
            .render(&storage, TopologyMode::SingleReplica)
            .await
            .unwrap();

        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        let args = container.args.clone().unwrap();
        assert!(args.contains(&"-v=4".to_string()));
        assert!(args.contains(&"--leader-elect-lease-duration=270s".to_string()));
        let env = container.env.clone().unwrap();
        assert!(env
            .iter()
            .any(|e| e.name == "HTTPS_PROXY" && e.value.as_deref() == Some("http://p")));
    }

    #[tokio::test]
    async fn test_hosted_deployment_follows_hosted_control_plane() {
        let guest = FakeCluster::new();
        let management = FakeCluster::new();
        guest.seed(&infrastructure(Some(PlatformType::AWS)));
        management.seed_dynamic(
            &resources::hosted_control_planes(),
            serde_json::from_value(json!({
                "apiVersion": "hypershift.openshift.io/v1beta1",
                "kind": "HostedControlPlane",
                "metadata": {"name": "a", "namespace": "clusters-a"},
                "spec": {"nodeSelector": {"role": "cp"}},
            }))
            .unwrap(),
        );
        let ctx = ControllerContext::hosted(
            guest.clients(),
            management.clients(),
            OperatorConfig::default(),
            "clusters-a",
        );
        let controller = DeploymentController::new(
            ctx,
            "AWSEBSCSIDriverOperatorDeploymentController",
            "AWSEBSCSIDriverOperatorDeployment",
            ASSET,
            AssetLoader::new(namespace_replacer("clusters-a")),
        )
        .with_namespace("clusters-a");

        let deployment = controller
            .render(&operator_config(StorageSpec::default()), TopologyMode::External)
            .await
            .unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.node_selector.unwrap()["role"], "cp");
        assert!(management.actions().is_empty());

        let watched = controller.into_controller();
        assert!(watched.informers().iter().any(|i| {
            i.resource().kind == "HostedControlPlane" && i.namespace() == Some("clusters-a")
        }));
    }

    #[test]
    fn test_hosted_control_plane_placement() {
        let mut deployment: Deployment = from_dynamic(
            AssetLoader::new(namespace_replacer("clusters-a"))
                .load(ASSET)
                .unwrap(),
        )
        .unwrap();
        let hcp: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "hypershift.openshift.io/v1beta1",
            "kind": "HostedControlPlane",
            "metadata": {"name": "a", "namespace": "clusters-a"},
            "spec": {
                "nodeSelector": {"role": "cp"},
                "tolerations": [{"key": "dedicated", "operator": "Exists"}],
            },
        }))
        .unwrap();

        apply_hosted_control_plane(&mut deployment, "clusters-a", Some(&hcp), Some(1001)).unwrap();
        let template = deployment.spec.unwrap().template;
        assert_eq!(
            template.metadata.unwrap().labels.unwrap()[HOSTED_CONTROL_PLANE_LABEL],
            "clusters-a"
        );
        let pod = template.spec.unwrap();
        assert_eq!(pod.node_selector.unwrap()["role"], "cp");
        assert!(pod
            .tolerations
            .unwrap()
            .iter()
            .any(|t| t.key.as_deref() == Some("dedicated")));
        assert_eq!(pod.security_context.unwrap().run_as_user, Some(1001));
    }
}
