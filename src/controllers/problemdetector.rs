//! vSphere problem detector
//!
//! On vSphere clusters the operator runs an extra operand that checks the
//! vCenter configuration. Its controllers start once, the first time the
//! platform is seen to be vSphere.

use crate::assets::replace::env_replacer;
use crate::assets::AssetLoader;
use crate::client::resources;
use crate::config::OPERATOR_NAMESPACE;
use crate::controllers::deployment::DeploymentController;
use crate::controllers::staticresource::{related_object, StaticResourceController};
use crate::controllers::ControllerContext;
use crate::crd::{ObjectReference, PlatformType};
use crate::error::Result;
use crate::factory::{Controller, ControllerManager, SyncContext, SyncHandler};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const CONTROLLER_NAME: &str = "VSphereProblemDetectorStarter";

const DEPLOYMENT_ASSET: &str = "vsphere_problem_detector/07_deployment.yaml";

const STATIC_ASSETS: &[&str] = &[
    "vsphere_problem_detector/01_sa.yaml",
    "vsphere_problem_detector/02_role.yaml",
    "vsphere_problem_detector/03_rolebinding.yaml",
    "vsphere_problem_detector/04_clusterrole.yaml",
    "vsphere_problem_detector/05_clusterrolebinding.yaml",
    "vsphere_problem_detector/06_service.yaml",
];

const MONITORING_ASSETS: &[&str] = &[
    "vsphere_problem_detector/08_servicemonitor.yaml",
    "vsphere_problem_detector/09_prometheusrules.yaml",
];

/// Every asset the problem detector renders
pub fn asset_names() -> impl Iterator<Item = &'static str> {
    STATIC_ASSETS
        .iter()
        .chain([&DEPLOYMENT_ASSET])
        .chain(MONITORING_ASSETS)
        .copied()
}

pub struct VSphereProblemDetectorStarter {
    ctx: ControllerContext,
    loader: AssetLoader,
    statics: Arc<StaticResourceController>,
    monitoring: Arc<StaticResourceController>,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl VSphereProblemDetectorStarter {
    pub fn new(ctx: ControllerContext, cancel: CancellationToken) -> Self {
        let loader = AssetLoader::new(env_replacer(
            &ctx.config.environment,
            &[("OPERATOR_IMAGE", "VSPHERE_PROBLEM_DETECTOR_OPERATOR_IMAGE")],
        ));
        let statics = StaticResourceController::new(
            "VSphereProblemDetectorStaticController",
            ctx.operator.clone(),
        )
        .with_assets(ctx.management.clone(), loader.clone(), STATIC_ASSETS.iter().copied());
        let monitoring = StaticResourceController::new(
            "VSphereProblemDetectorMonitoringController",
            ctx.operator.clone(),
        )
        .with_assets(
            ctx.management.clone(),
            loader.clone(),
            MONITORING_ASSETS.iter().copied(),
        );
        Self {
            ctx,
            loader,
            statics: Arc::new(statics),
            monitoring: Arc::new(monitoring),
            started: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn into_controller(self: Arc<Self>) -> Controller {
        let informers = [
            self.ctx.operator.informer(),
            self.ctx
                .guest
                .informers
                .informer(&resources::infrastructures(), None),
        ];
        Controller::builder(CONTROLLER_NAME, self.clone())
            .with_informers(informers)
            .resync_every(self.ctx.config.resync_interval)
            .with_sync_degraded_on_error(self.ctx.operator.clone())
            .build()
    }

    async fn related_objects(&self) -> Result<Vec<ObjectReference>> {
        let mut references = self.statics.related_objects().await?;
        references.extend(self.monitoring.related_objects().await?);
        let deployment = self.loader.load(DEPLOYMENT_ASSET)?;
        references.push(related_object(&self.ctx.management, &deployment).await?);
        Ok(references)
    }

    fn controller_manager(&self) -> ControllerManager {
        let resync = self.ctx.config.resync_interval;
        let deployment = DeploymentController::new(
            self.ctx.clone(),
            "VSphereProblemDetectorDeploymentController",
            "VSphereProblemDetectorDeployment",
            DEPLOYMENT_ASSET,
            self.loader.clone(),
        )
        .with_namespace(OPERATOR_NAMESPACE);
        ControllerManager::new("vsphere-problem-detector")
            .with_controller(self.statics.clone().into_controller(resync))
            .with_controller(deployment.into_controller())
            .with_controller(self.monitoring.clone().into_controller(resync))
    }
}

#[async_trait]
impl SyncHandler for VSphereProblemDetectorStarter {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }
        let Some(infra) = self.ctx.infrastructure().await? else {
            return Ok(());
        };
        if infra.platform() != Some(PlatformType::VSphere) {
            return Ok(());
        }

        self.ctx.related.extend(self.related_objects().await?);
        info!("Starting vSphere problem detector");
        tokio::spawn(self.controller_manager().run(self.cancel.child_token()));
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}
