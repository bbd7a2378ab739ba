//! ClusterCSIDriver reconciliation
//!
//! Keeps the driver's ClusterCSIDriver in line with the operator config and
//! folds the conditions the driver operator reports on it back into the
//! operator config under `<prefix>CSIDriverOperatorCR*`.

use crate::client::resources;
use crate::client::typed::from_dynamic;
use crate::controllers::csidriver::DriverConfig;
use crate::controllers::ControllerContext;
use crate::crd::{ClusterCSIDriver, ConditionStatus, OperatorCondition};
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::operator::StatusUpdate;
use crate::resourceapply::generation::expected_generation;
use crate::resourceapply::{apply_with_spec_hash, generation_of};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct CRController {
    name: String,
    prefix: String,
    config: DriverConfig,
    ctx: ControllerContext,
}

/// Reduce the conditions of a child that end with `suffix` into one.
///
/// `Available` is True only when every match is True. `Progressing` and
/// `Degraded` are True when any match is. `None` when nothing matches.
pub fn union_condition(
    conditions: &[OperatorCondition],
    suffix: &str,
    condition_type: &str,
) -> Option<OperatorCondition> {
    let matching: Vec<&OperatorCondition> = conditions
        .iter()
        .filter(|c| c.r#type.ends_with(suffix))
        .collect();
    if matching.is_empty() {
        return None;
    }
    let bad = if suffix == "Available" {
        ConditionStatus::False
    } else {
        ConditionStatus::True
    };
    let offenders: Vec<&&OperatorCondition> = matching.iter().filter(|c| c.status == bad).collect();
    let condition = match offenders.as_slice() {
        [] => {
            let good = if bad == ConditionStatus::True {
                ConditionStatus::False
            } else {
                ConditionStatus::True
            };
            let status = if matching.iter().any(|c| c.status == ConditionStatus::Unknown) {
                ConditionStatus::Unknown
            } else {
                good
            };
            OperatorCondition::new(condition_type, status).with_reason("AsExpected")
        }
        [single] => OperatorCondition::new(condition_type, bad)
            .with_reason(single.reason.clone())
            .with_message(single.message.clone()),
        many => OperatorCondition::new(condition_type, bad)
            .with_reason("MultipleConditionsMatching")
            .with_message(
                many.iter()
                    .map(|c| format!("{}: {}", c.r#type, c.message))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
    };
    Some(condition)
}

impl CRController {
    pub fn new(ctx: ControllerContext, config: DriverConfig) -> Self {
        Self {
            name: config.cr_controller_name(),
            prefix: format!("{}CSIDriverOperatorCR", config.condition_prefix),
            config,
            ctx,
        }
    }

    pub fn into_controller(self) -> Controller {
        let informers = [
            self.ctx.operator.informer(),
            self.ctx
                .guest
                .informers
                .informer(&resources::cluster_csi_drivers(), None),
        ];
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(self.name.clone(), Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }

    /// Conditions the driver operator reported, reduced to this controller's names
    fn conditions(&self, cr: &ClusterCSIDriver) -> Vec<OperatorCondition> {
        let reported = cr.conditions();
        let available = self.condition_type("Available");
        let available = union_condition(reported, "Available", &available).unwrap_or_else(|| {
            if self.config.optional {
                OperatorCondition::new(available, ConditionStatus::Unknown)
                    .with_reason("WaitForOperator")
            } else {
                OperatorCondition::new(available, ConditionStatus::False)
                    .with_reason("WaitForOperator")
                    .with_message(format!(
                        "Waiting for {} operator to report status",
                        self.config.driver_name
                    ))
            }
        });
        let progressing = self.condition_type("Progressing");
        let progressing = union_condition(reported, "Progressing", &progressing).unwrap_or_else(
            || OperatorCondition::new(progressing, ConditionStatus::False).with_reason("AsExpected"),
        );
        let degraded = self.condition_type("Degraded");
        let degraded = union_condition(reported, "Degraded", &degraded).unwrap_or_else(|| {
            OperatorCondition::new(degraded, ConditionStatus::False).with_reason("AsExpected")
        });
        vec![available, progressing, degraded]
    }

    fn condition_type(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix)
    }
}

#[async_trait]
impl SyncHandler for CRController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }

        let mut desired = self.ctx.asset_loader().load(&self.config.cr_asset)?;
        let spec = &mut desired.data["spec"];
        spec["managementState"] = json!("Managed");
        spec["logLevel"] = serde_json::to_value(storage.spec.log_level)?;
        spec["operatorLogLevel"] = serde_json::to_value(storage.spec.operator_log_level)?;

        let resource = resources::cluster_csi_drivers();
        let expected = expected_generation(
            storage.status.as_ref(),
            &resource,
            None,
            self.config.driver_name,
        );
        let applied = apply_with_spec_hash(
            self.ctx.guest.store.as_ref(),
            &resource,
            &desired,
            expected,
        )
        .await?;
        if applied.modified {
            info!(driver = %self.config.driver_name, "Applied ClusterCSIDriver");
        }

        let generation = generation_of(&resource, &applied.object);
        let cr: ClusterCSIDriver = from_dynamic(applied.object)?;
        let update = self
            .conditions(&cr)
            .into_iter()
            .fold(StatusUpdate::new(), StatusUpdate::condition)
            .generation(generation);
        self.ctx.operator.apply_status(&self.name, update).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{operator_config, FakeCluster};
    use crate::config::OperatorConfig;
    use crate::controllers::csidriver::driver_configs;
    use crate::crd::{find_condition, LogLevel, ManagementState, Storage, StorageSpec};

    fn controller(cluster: &Arc<FakeCluster>, name: &str) -> CRController {
        let ctx = ControllerContext::standalone(cluster.clients(), OperatorConfig::default());
        let config = driver_configs()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap();
        CRController::new(ctx, config)
    }

    #[test]
    fn test_union_available() {
        let conditions = vec![
            OperatorCondition::new("ControllerAvailable", ConditionStatus::True),
            OperatorCondition::new("NodeAvailable", ConditionStatus::False)
                .with_reason("Deploying")
                .with_message("Waiting for DaemonSet"),
        ];
        let available = union_condition(&conditions, "Available", "XAvailable").unwrap();
        assert!(available.is_false());
        assert_eq!(available.reason, "Deploying");

        assert!(union_condition(&conditions, "Degraded", "XDegraded").is_none());
    }

    #[test]
    fn test_union_progressing_multiple() {
        let conditions = vec![
            OperatorCondition::new("AProgressing", ConditionStatus::True).with_message("a"),
            OperatorCondition::new("BProgressing", ConditionStatus::True).with_message("b"),
        ];
        let progressing = union_condition(&conditions, "Progressing", "XProgressing").unwrap();
        assert!(progressing.is_true());
        assert_eq!(progressing.reason, "MultipleConditionsMatching");
        assert_eq!(progressing.message, "AProgressing: a\nBProgressing: b");
    }

    #[tokio::test]
    async fn test_creates_cr_and_waits_for_operator() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec {
            operator_log_level: LogLevel::Trace,
            ..Default::default()
        }));
        controller(&cluster, "aws-ebs")
            .sync(&SyncContext::detached())
            .await
            .unwrap();

        let cr = cluster
            .typed::<ClusterCSIDriver>(None, "ebs.csi.aws.com")
            .unwrap();
        assert_eq!(cr.spec.management_state, ManagementState::Managed);
        assert_eq!(cr.spec.operator_log_level, LogLevel::Trace);

        let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
        let available =
            find_condition(storage.conditions(), "AWSEBSCSIDriverOperatorCRAvailable").unwrap();
        assert!(available.is_false());
        assert_eq!(available.reason, "WaitForOperator");
    }

    #[tokio::test]
    async fn test_reported_conditions_are_merged() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        let controller = controller(&cluster, "aws-ebs");
        controller.sync(&SyncContext::detached()).await.unwrap();

        cluster.set_status(
            &resources::cluster_csi_drivers(),
            None,
            "ebs.csi.aws.com",
            json!({"conditions": [
                {"type": "AWSEBSDriverControllerServiceControllerAvailable", "status": "True"},
                {"type": "AWSEBSDriverNodeServiceControllerAvailable", "status": "True"},
                {"type": "AWSEBSDriverNodeServiceControllerProgressing", "status": "False"},
            ]}),
        );
        cluster.clear_actions();
        controller.sync(&SyncContext::detached()).await.unwrap();

        assert!(cluster
            .actions()
            .iter()
            .all(|a| a.resource != "clustercsidrivers"));
        let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
        assert!(find_condition(storage.conditions(), "AWSEBSCSIDriverOperatorCRAvailable")
            .unwrap()
            .is_true());
        assert!(find_condition(storage.conditions(), "AWSEBSCSIDriverOperatorCRDegraded")
            .unwrap()
            .is_false());
    }

    #[tokio::test]
    async fn test_optional_driver_available_unknown() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        controller(&cluster, "openstack-manila")
            .sync(&SyncContext::detached())
            .await
            .unwrap();
        let storage = cluster.typed::<Storage>(None, "cluster").unwrap();
        let available =
            find_condition(storage.conditions(), "ManilaCSIDriverOperatorCRAvailable").unwrap();
        assert_eq!(available.status, ConditionStatus::Unknown);
    }
}
