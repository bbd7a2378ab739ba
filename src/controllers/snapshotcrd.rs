//! Upgrade gate on alpha VolumeSnapshot CRDs

use crate::client::resources;
use crate::client::typed::get_typed;
use crate::controllers::ControllerContext;
use crate::crd::{ConditionStatus, OperatorCondition};
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::sync::Arc;
use tracing::warn;

pub const CONTROLLER_NAME: &str = "SnapshotCRDController";

const UPGRADEABLE: &str = "SnapshotCRDControllerUpgradeable";

const SNAPSHOT_CRDS: &[&str] = &[
    "volumesnapshots.snapshot.storage.k8s.io",
    "volumesnapshotcontents.snapshot.storage.k8s.io",
    "volumesnapshotclasses.snapshot.storage.k8s.io",
];

const FORBIDDEN_VERSION: &str = "v1alpha1";

pub struct SnapshotCRDController {
    ctx: ControllerContext,
}

fn declares_version(crd: &CustomResourceDefinition, version: &str) -> bool {
    crd.spec.versions.iter().any(|v| v.name == version)
}

impl SnapshotCRDController {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    pub fn into_controller(self) -> Controller {
        let informers = [self
            .ctx
            .guest
            .informers
            .informer(&resources::custom_resource_definitions(), None)];
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(CONTROLLER_NAME, Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }

    /// Names of the snapshot CRDs still serving the alpha version
    async fn alpha_crds(&self) -> Result<Vec<&'static str>> {
        let mut found = Vec::new();
        for name in SNAPSHOT_CRDS {
            let crd =
                get_typed::<CustomResourceDefinition>(self.ctx.guest.cache.as_ref(), None, name)
                    .await?;
            if crd.is_some_and(|crd| declares_version(&crd, FORBIDDEN_VERSION)) {
                found.push(*name);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl SyncHandler for SnapshotCRDController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let alpha = self.alpha_crds().await?;
        let condition = if alpha.is_empty() {
            OperatorCondition::new(UPGRADEABLE, ConditionStatus::True).with_reason("AsExpected")
        } else {
            warn!(crds = ?alpha, "Alpha VolumeSnapshot CRDs detected");
            OperatorCondition::new(UPGRADEABLE, ConditionStatus::False)
                .with_reason("AlphaDetected")
                .with_message(format!(
                    "Unable to update cluster as {FORBIDDEN_VERSION} version of {} is detected. \
                     Remove these CRDs to allow the upgrade to proceed.",
                    alpha.join(", ")
                ))
        };
        self.ctx
            .operator
            .apply_conditions(CONTROLLER_NAME, vec![condition])
            .await?;
        Ok(())
    }
}
