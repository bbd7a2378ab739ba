//! Per-driver controller set
//!
//! A [`DriverManager`] is inert until the starter decides the driver belongs
//! on the cluster. It then yields one [`ControllerManager`] holding the
//! static resources, ClusterCSIDriver, Deployment, OLM removal and
//! ServiceMonitor controllers of the driver.

use crate::assets::AssetLoader;
use crate::client::resources;
use crate::controllers::csidriver::cr::CRController;
use crate::controllers::csidriver::olmremoval::OlmRemovalController;
use crate::controllers::csidriver::DriverConfig;
use crate::controllers::deployment::DeploymentController;
use crate::controllers::staticresource::{related_object, StaticResourceController};
use crate::controllers::ControllerContext;
use crate::crd::ObjectReference;
use crate::error::{Error, Result};
use crate::factory::ControllerManager;
use std::sync::Arc;

pub struct DriverManager {
    config: DriverConfig,
    ctx: ControllerContext,
    loader: AssetLoader,
    statics: Arc<StaticResourceController>,
    service_monitor: Option<Arc<StaticResourceController>>,
}

impl DriverManager {
    pub fn new(ctx: ControllerContext, config: DriverConfig) -> Self {
        let loader = ctx
            .asset_loader()
            .with(config.image_replacer(&ctx.config.environment));
        let statics = StaticResourceController::new(
            config.static_controller_name(),
            ctx.operator.clone(),
        )
        .with_assets(
            ctx.guest.clone(),
            loader.clone(),
            config.static_assets.clone(),
        )
        .with_assets(
            ctx.management.clone(),
            loader.clone(),
            config.control_plane_assets.clone(),
        );
        let service_monitor = config.service_monitor_asset.as_ref().map(|asset| {
            Arc::new(
                StaticResourceController::new(
                    config.service_monitor_controller_name(),
                    ctx.operator.clone(),
                )
                .with_assets(ctx.management.clone(), loader.clone(), [asset.clone()]),
            )
        });
        Self {
            config,
            ctx,
            loader,
            statics: Arc::new(statics),
            service_monitor,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Every object the driver's controllers manage
    pub async fn related_objects(&self) -> Result<Vec<ObjectReference>> {
        let mut errors = Vec::new();
        let mut references = match self.statics.related_objects().await {
            Ok(references) => references,
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };
        if let Some(monitor) = &self.service_monitor {
            match monitor.related_objects().await {
                Ok(monitor) => references.extend(monitor),
                Err(e) => errors.push(e),
            }
        }
        references.push(ObjectReference::new(
            resources::cluster_csi_drivers().group,
            resources::cluster_csi_drivers().plural,
            "",
            self.config.driver_name,
        ));
        match self.loader.load(&self.config.deployment_asset) {
            Ok(deployment) => match related_object(&self.ctx.management, &deployment).await {
                Ok(reference) => references.push(reference),
                Err(e) => errors.push(e),
            },
            Err(e) => errors.push(e),
        }
        Error::aggregate(errors)?;
        Ok(references)
    }

    /// The controllers of this driver, ready to run
    pub fn controller_manager(&self) -> ControllerManager {
        let config = &self.config;
        let resync = self.ctx.config.resync_interval;

        let mut deployment = DeploymentController::new(
            self.ctx.clone(),
            config.deployment_controller_name(),
            format!("{}CSIDriverOperatorDeployment", config.condition_prefix),
            config.deployment_asset.clone(),
            self.loader.clone(),
        )
        .with_version_name(format!("{}CSIDriverOperator", config.condition_prefix));

        let mut manager = ControllerManager::new(config.name)
            .with_controller(self.statics.clone().into_controller(resync))
            .with_controller(CRController::new(self.ctx.clone(), config.clone()).into_controller());

        if let Some(olm) = OlmRemovalController::new(self.ctx.clone(), config) {
            deployment = deployment.with_gate(config.olm_available_condition());
            manager.add(olm.into_controller());
        }
        manager.add(deployment.into_controller());
        if let Some(monitor) = &self.service_monitor {
            manager.add(monitor.clone().into_controller(resync));
        }
        manager
    }
}
