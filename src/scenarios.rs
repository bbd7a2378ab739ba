//! End-to-end behaviour of the operator against an in-memory cluster
//!
//! The full standalone operator runs in a background task; each test seeds
//! the cluster, plays the part of the other actors (kube-controller-manager
//! rolling out Deployments, CSI driver operators reporting status) and waits
//! for the ClusterOperator to settle.

use crate::client::fake::{feature_gate, infrastructure, operator_config, FakeCluster};
use crate::client::resources;
use crate::config::{OperatorConfig, CSI_DRIVER_NAMESPACE};
use crate::controllers::csidriver::olmremoval::OlmRemovalController;
use crate::controllers::csidriver::{driver_configs, CSIDriverStarter, DriverConfig};
use crate::controllers::deployment::DeploymentController;
use crate::controllers::problemdetector::VSphereProblemDetectorStarter;
use crate::controllers::ControllerContext;
use crate::crd::{
    find_condition, ClusterOperator, OperatorCondition, PlatformType, Storage, StorageSpec,
};
use crate::error::Result;
use crate::factory::{SyncContext, SyncHandler};
use crate::metrics::Metrics;
use crate::starter::Operator;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::api::storage::v1::{CSIDriver, StorageClass};
use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const RELEASE: &str = "4.15.0";

fn config() -> OperatorConfig {
    OperatorConfig {
        release_version: RELEASE.into(),
        resync_interval: Duration::from_millis(100),
        feature_gate_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn driver(name: &str) -> DriverConfig {
    driver_configs()
        .into_iter()
        .find(|c| c.name == name)
        .unwrap()
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn storage_condition(cluster: &FakeCluster, condition_type: &str) -> Option<OperatorCondition> {
    let storage = cluster.typed::<Storage>(None, "cluster")?;
    find_condition(storage.conditions(), condition_type).cloned()
}

fn cluster_operator_condition(
    cluster: &FakeCluster,
    condition_type: &str,
) -> Option<OperatorCondition> {
    let co = cluster.typed::<ClusterOperator>(None, "storage")?;
    find_condition(&co.status?.conditions, condition_type).cloned()
}

fn is_true(condition: Option<OperatorCondition>) -> bool {
    condition.is_some_and(|c| c.is_true())
}

fn is_false(condition: Option<OperatorCondition>) -> bool {
    condition.is_some_and(|c| c.is_false())
}

/// The standalone operator running in the background
struct Harness {
    cancel: CancellationToken,
    drivers: Arc<CSIDriverStarter>,
    problem_detector: Option<Arc<VSphereProblemDetectorStarter>>,
    task: Option<JoinHandle<Result<()>>>,
}

impl Harness {
    fn start(cluster: &Arc<FakeCluster>) -> Self {
        let cancel = CancellationToken::new();
        let operator = Operator::standalone(
            cluster.clients(),
            config(),
            Metrics::new().unwrap(),
            &cancel,
        )
        .unwrap();
        let drivers = operator.driver_starter();
        let problem_detector = operator.problem_detector();
        let task = tokio::spawn(operator.run(cancel.clone()));
        Self {
            cancel,
            drivers,
            problem_detector,
            task: Some(task),
        }
    }

    /// Cluster seeded with the operator config, Infrastructure and FeatureGate
    fn seeded(platform: Option<PlatformType>) -> Arc<FakeCluster> {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        cluster.seed(&infrastructure(platform));
        cluster.seed(&feature_gate(RELEASE, &[]));
        cluster
    }

    async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.unwrap().unwrap();
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn test_aws_cluster_converges() {
    let cluster = Harness::seeded(Some(PlatformType::AWS));
    let harness = Harness::start(&cluster);
    let deployments = resources::deployments();
    let cluster_csi_drivers = resources::cluster_csi_drivers();

    eventually("aws-ebs driver operator", || {
        harness.drivers.running_drivers() == ["aws-ebs"]
    })
    .await;
    eventually("driver operator Deployment", || {
        cluster
            .object(
                &deployments,
                Some(CSI_DRIVER_NAMESPACE),
                "aws-ebs-csi-driver-operator",
            )
            .is_some()
    })
    .await;
    eventually("ClusterCSIDriver", || {
        cluster
            .object(&cluster_csi_drivers, None, "ebs.csi.aws.com")
            .is_some()
    })
    .await;

    // Rollout finished and the driver operator reports healthy.
    let deployment = cluster
        .object(
            &deployments,
            Some(CSI_DRIVER_NAMESPACE),
            "aws-ebs-csi-driver-operator",
        )
        .unwrap();
    cluster.set_status(
        &deployments,
        Some(CSI_DRIVER_NAMESPACE),
        "aws-ebs-csi-driver-operator",
        json!({
            "observedGeneration": deployment.metadata.generation,
            "replicas": 1,
            "updatedReplicas": 1,
            "availableReplicas": 1,
            "readyReplicas": 1,
        }),
    );
    cluster.set_status(
        &cluster_csi_drivers,
        None,
        "ebs.csi.aws.com",
        json!({
            "conditions": [
                {"type": "AWSEBSDriverNodeServiceControllerAvailable", "status": "True", "reason": "AsExpected"},
                {"type": "AWSEBSDriverControllerServiceControllerAvailable", "status": "True", "reason": "AsExpected"},
                {"type": "AWSEBSDriverControllerServiceControllerProgressing", "status": "False", "reason": "AsExpected"},
                {"type": "AWSEBSDriverControllerServiceControllerDegraded", "status": "False", "reason": "AsExpected"},
            ],
        }),
    );

    eventually("driver operator conditions", || {
        is_true(storage_condition(&cluster, "AWSEBSCSIDriverOperatorDeploymentAvailable"))
            && is_false(storage_condition(
                &cluster,
                "AWSEBSCSIDriverOperatorDeploymentProgressing",
            ))
            && is_true(storage_condition(&cluster, "AWSEBSCSIDriverOperatorCRAvailable"))
    })
    .await;
    eventually("converged ClusterOperator", || {
        is_true(cluster_operator_condition(&cluster, "Available"))
            && is_false(cluster_operator_condition(&cluster, "Progressing"))
            && is_false(cluster_operator_condition(&cluster, "Degraded"))
            && is_true(cluster_operator_condition(&cluster, "Upgradeable"))
    })
    .await;

    let co = cluster.typed::<ClusterOperator>(None, "storage").unwrap();
    assert!(co
        .status
        .unwrap()
        .versions
        .iter()
        .any(|v| v.name == "operator" && v.version == RELEASE));
    let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
    let status = storage.status.unwrap();
    assert_eq!(status.version("operator"), Some(RELEASE));
    assert_eq!(status.version("AWSEBSCSIDriverOperator"), Some(RELEASE));

    // The driver operator ships its own StorageClass.
    assert!(cluster
        .actions()
        .iter()
        .all(|a| a.resource != "storageclasses"));
    assert!(is_true(storage_condition(
        &cluster,
        "DefaultStorageClassControllerAvailable"
    )));
    assert!(!harness.problem_detector.as_ref().unwrap().is_started());

    harness.stop().await;
}

#[tokio::test]
async fn test_vsphere_gets_default_class_and_problem_detector() {
    let cluster = Harness::seeded(Some(PlatformType::VSphere));
    let harness = Harness::start(&cluster);

    eventually("default StorageClass", || {
        cluster.typed::<StorageClass>(None, "thin").is_some()
    })
    .await;
    let class = cluster.typed::<StorageClass>(None, "thin").unwrap();
    assert_eq!(
        class
            .metadata
            .annotations
            .unwrap()
            .get("storageclass.kubernetes.io/is-default-class")
            .map(String::as_str),
        Some("true")
    );

    let detector = harness.problem_detector.clone().unwrap();
    eventually("vSphere problem detector", || detector.is_started()).await;
    eventually("vSphere driver operator", || {
        harness.drivers.running_drivers().contains(&"vsphere")
    })
    .await;
    eventually("DefaultStorageClass conditions", || {
        is_true(storage_condition(&cluster, "DefaultStorageClassControllerAvailable"))
            && is_false(storage_condition(&cluster, "DefaultStorageClassControllerDisabled"))
    })
    .await;

    harness.stop().await;
}

#[tokio::test]
async fn test_unsupported_platform_disables_default_class() {
    let cluster = Harness::seeded(None);
    let harness = Harness::start(&cluster);

    eventually("DefaultStorageClass disabled", || {
        is_true(storage_condition(&cluster, "DefaultStorageClassControllerDisabled"))
    })
    .await;
    let available = storage_condition(&cluster, "DefaultStorageClassControllerAvailable").unwrap();
    assert!(available.is_true());
    assert_eq!(available.message, "No default StorageClass for this platform");
    assert!(is_false(storage_condition(
        &cluster,
        "DefaultStorageClassControllerProgressing"
    )));

    eventually("available ClusterOperator", || {
        is_true(cluster_operator_condition(&cluster, "Available"))
            && is_false(cluster_operator_condition(&cluster, "Progressing"))
    })
    .await;
    assert!(harness.drivers.running_drivers().is_empty());
    assert!(!harness.problem_detector.as_ref().unwrap().is_started());
    assert!(cluster
        .actions()
        .iter()
        .all(|a| a.resource != "storageclasses" && a.resource != "deployments"));

    harness.stop().await;
}

#[tokio::test]
async fn test_started_driver_survives_feature_gate_flip() {
    let cluster = FakeCluster::new();
    cluster.seed(&operator_config(StorageSpec::default()));
    cluster.seed(&infrastructure(Some(PlatformType::BareMetal)));
    cluster.seed(&feature_gate(RELEASE, &["CSIDriverSharedResource"]));
    let ctx = ControllerContext::standalone(cluster.clients(), config());
    let cancel = CancellationToken::new();
    let starter = CSIDriverStarter::new(ctx, driver_configs(), cancel.clone());

    starter.sync(&SyncContext::detached()).await.unwrap();
    assert_eq!(starter.running_drivers(), ["shared-resource"]);

    cluster.seed(&feature_gate(RELEASE, &[]));
    starter.sync(&SyncContext::detached()).await.unwrap();
    assert_eq!(starter.running_drivers(), ["shared-resource"]);

    cancel.cancel();
}

#[tokio::test]
async fn test_foreign_csi_driver_degrades_starter() {
    let cluster = Harness::seeded(Some(PlatformType::GCP));
    cluster.seed(&CSIDriver {
        metadata: kube::api::ObjectMeta {
            name: Some("pd.csi.storage.gke.io".into()),
            ..Default::default()
        },
        ..Default::default()
    });
    let harness = Harness::start(&cluster);

    eventually("CSIDriverStarter degraded", || {
        is_true(storage_condition(&cluster, "CSIDriverStarterDegraded"))
    })
    .await;
    let degraded = storage_condition(&cluster, "CSIDriverStarterDegraded").unwrap();
    assert!(degraded
        .message
        .contains("Remove the CSIDriver object and the driver that installed it"));
    assert!(harness.drivers.running_drivers().is_empty());

    // Not long enough to degrade the ClusterOperator.
    eventually("ClusterOperator reported", || {
        cluster_operator_condition(&cluster, "Degraded").is_some()
    })
    .await;
    assert!(is_false(cluster_operator_condition(&cluster, "Degraded")));

    harness.stop().await;
}

fn dynamic(value: serde_json::Value) -> DynamicObject {
    serde_json::from_value(value).unwrap()
}

fn created_in_csi_namespace(cluster: &FakeCluster) -> bool {
    cluster.actions().iter().any(|a| {
        a.verb == "create"
            && a.resource == "deployments"
            && a.namespace.as_deref() == Some(CSI_DRIVER_NAMESPACE)
    })
}

#[tokio::test]
async fn test_olm_installed_driver_is_replaced() {
    let cluster = FakeCluster::new();
    cluster.seed(&operator_config(StorageSpec::default()));
    cluster.seed(&infrastructure(Some(PlatformType::AWS)));

    let subscriptions =
        ApiResource::from_gvk_with_plural(&resources::subscription_gvk(), "subscriptions");
    let csvs = ApiResource::from_gvk_with_plural(
        &resources::cluster_service_version_gvk(),
        "clusterserviceversions",
    );
    let legacy_kind = ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("csi.openshift.io", "v1alpha1", "AWSEBSDriver"),
        "awsebsdrivers",
    );
    let deployments = resources::deployments();
    let csv_name = "aws-ebs-csi-driver-operator.v4.9.0";

    cluster.seed_dynamic(
        &subscriptions,
        dynamic(json!({
            "apiVersion": "operators.coreos.com/v1alpha1",
            "kind": "Subscription",
            "metadata": {"name": "aws-ebs-csi-driver-operator", "namespace": "legacy-ebs"},
            "spec": {
                "name": "aws-ebs-csi-driver-operator",
                "source": "redhat-operators",
                "sourceNamespace": "openshift-marketplace",
            },
            "status": {"currentCSV": csv_name},
        })),
    );
    cluster.seed_dynamic(
        &csvs,
        dynamic(json!({
            "apiVersion": "operators.coreos.com/v1alpha1",
            "kind": "ClusterServiceVersion",
            "metadata": {"name": csv_name, "namespace": "legacy-ebs"},
        })),
    );
    cluster.seed_dynamic(
        &deployments,
        dynamic(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "aws-ebs-csi-driver-operator", "namespace": "legacy-ebs"},
            "spec": {},
        })),
    );
    cluster.seed_dynamic(
        &legacy_kind,
        dynamic(json!({
            "apiVersion": "csi.openshift.io/v1alpha1",
            "kind": "AWSEBSDriver",
            "metadata": {"name": "cluster", "finalizers": ["csi.openshift.io/aws-ebs"]},
            "spec": {},
        })),
    );

    let aws = driver("aws-ebs");
    let ctx = ControllerContext::standalone(cluster.clients(), config());
    let olm = OlmRemovalController::new(ctx.clone(), &aws).unwrap();
    let deployment = DeploymentController::new(
        ctx.clone(),
        aws.deployment_controller_name(),
        "AWSEBSCSIDriverOperatorDeployment",
        aws.deployment_asset.clone(),
        ctx.asset_loader()
            .with(aws.image_replacer(&ctx.config.environment)),
    )
    .with_gate(aws.olm_available_condition());
    let sync = SyncContext::detached();

    // Subscription: progress recorded on the operator config first.
    olm.sync(&sync).await.unwrap();
    let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
    assert_eq!(storage.annotation(&olm.namespace_annotation()), Some("legacy-ebs"));
    assert_eq!(storage.annotation(&olm.csv_annotation()), Some(csv_name));
    assert!(cluster
        .object(&subscriptions, Some("legacy-ebs"), "aws-ebs-csi-driver-operator")
        .is_none());
    deployment.sync(&sync).await.unwrap();
    assert!(!created_in_csi_namespace(&cluster));

    // ClusterServiceVersion.
    olm.sync(&sync).await.unwrap();
    assert!(cluster.object(&csvs, Some("legacy-ebs"), csv_name).is_none());

    // OLM garbage collects the Deployment on its own.
    olm.sync(&sync).await.unwrap();
    let available = storage_condition(&cluster, "AWSEBSOLMOperatorRemovalAvailable").unwrap();
    assert!(available.is_false());
    assert!(available.message.contains("Deployment"));
    deployment.sync(&sync).await.unwrap();
    assert!(!created_in_csi_namespace(&cluster));
    cluster.remove(&deployments, Some("legacy-ebs"), "aws-ebs-csi-driver-operator");

    // Legacy CR: finalizers stripped, then deleted.
    olm.sync(&sync).await.unwrap();
    assert!(cluster.object(&legacy_kind, None, "cluster").is_none());
    let verbs: Vec<_> = cluster
        .actions()
        .into_iter()
        .filter(|a| a.resource == "awsebsdrivers")
        .map(|a| a.verb)
        .collect();
    assert_eq!(verbs, ["update", "delete"]);

    olm.sync(&sync).await.unwrap();
    let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
    assert_eq!(storage.annotation(&olm.namespace_annotation()), None);
    assert_eq!(storage.annotation(&olm.csv_annotation()), None);
    let available = storage_condition(&cluster, "AWSEBSOLMOperatorRemovalAvailable").unwrap();
    assert!(available.is_true());

    deployment.sync(&sync).await.unwrap();
    assert!(created_in_csi_namespace(&cluster));
    assert!(cluster
        .object(
            &deployments,
            Some(CSI_DRIVER_NAMESPACE),
            "aws-ebs-csi-driver-operator"
        )
        .is_some());
}

fn snapshot_crd(name: &str, versions: &[&str]) -> CustomResourceDefinition {
    serde_json::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": name},
        "spec": {
            "group": "snapshot.storage.k8s.io",
            "names": {"kind": "VolumeSnapshot", "plural": name.split('.').next().unwrap()},
            "scope": "Namespaced",
            "versions": versions
                .iter()
                .map(|v| json!({"name": v, "served": true, "storage": *v == "v1"}))
                .collect::<Vec<_>>(),
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_alpha_snapshot_crd_blocks_upgrade() {
    let cluster = Harness::seeded(Some(PlatformType::AWS));
    let crd = "volumesnapshots.snapshot.storage.k8s.io";
    cluster.seed(&snapshot_crd(crd, &["v1alpha1", "v1"]));
    let harness = Harness::start(&cluster);

    eventually("Upgradeable=False", || {
        is_false(cluster_operator_condition(&cluster, "Upgradeable"))
    })
    .await;
    let upgradeable = storage_condition(&cluster, "SnapshotCRDControllerUpgradeable").unwrap();
    assert_eq!(upgradeable.reason, "AlphaDetected");
    assert!(upgradeable.message.contains(crd));
    let co_upgradeable = cluster_operator_condition(&cluster, "Upgradeable").unwrap();
    assert_eq!(co_upgradeable.reason, "SnapshotCRDController_AlphaDetected");

    cluster.seed(&snapshot_crd(crd, &["v1"]));
    eventually("Upgradeable=True", || {
        is_true(cluster_operator_condition(&cluster, "Upgradeable"))
    })
    .await;

    harness.stop().await;
}
