//! Operator wiring for standalone and hosted control plane clusters
//!
//! Both modes build the same controllers on top of a [`ControllerContext`].
//! Standalone mode talks to one cluster; hosted mode reads configuration
//! from the guest cluster and runs operands in a namespace of the management
//! cluster.

use crate::assets;
use crate::assets::replace::{common_replacer, namespace_replacer};
use crate::client::ClientSet;
use crate::config::OperatorConfig;
use crate::controllers::csidriver::{driver_configs, hosted_driver_configs, CSIDriverStarter};
use crate::controllers::configobserver::ConfigObserver;
use crate::controllers::defaultstorageclass::{
    DefaultStorageClassController, VSPHERE_STORAGE_CLASS_ASSET,
};
use crate::controllers::problemdetector::{self, VSphereProblemDetectorStarter};
use crate::controllers::snapshotcrd::SnapshotCRDController;
use crate::controllers::status::ClusterOperatorStatusController;
use crate::controllers::ControllerContext;
use crate::error::{Error, Result};
use crate::factory::ControllerManager;
use crate::metrics::{Metrics, MetricsController};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FEATURE_GATE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Every asset the operator may render; a missing or broken one is fatal at startup
pub fn validate_assets(config: &OperatorConfig) -> Result<()> {
    let replacer = common_replacer(&config.environment)
        .extend(namespace_replacer(&config.csi_driver_namespace));
    let drivers = driver_configs();
    let mut names: Vec<&str> = drivers
        .iter()
        .flat_map(|driver| driver.asset_names())
        .collect();
    for name in problemdetector::asset_names() {
        names.push(name);
    }
    names.push(VSPHERE_STORAGE_CLASS_ASSET);
    assets::validate(names, &replacer)
}

/// All controllers of one operator instance, built but not yet running
pub struct Operator {
    ctx: ControllerContext,
    manager: ControllerManager,
    drivers: Arc<CSIDriverStarter>,
    problem_detector: Option<Arc<VSphereProblemDetectorStarter>>,
}

impl Operator {
    /// One cluster holds both the configuration and the operands
    pub fn standalone(
        clients: ClientSet,
        config: OperatorConfig,
        metrics: Metrics,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        validate_assets(&config)?;
        let ctx = ControllerContext::standalone(clients, config);
        let drivers = Arc::new(CSIDriverStarter::new(
            ctx.clone(),
            driver_configs(),
            cancel.clone(),
        ));
        let detector = Arc::new(VSphereProblemDetectorStarter::new(ctx.clone(), cancel.clone()));

        let manager = ControllerManager::new("cluster-storage-operator")
            .with_controller(ClusterOperatorStatusController::new(ctx.clone()).into_controller())
            .with_controller(DefaultStorageClassController::new(ctx.clone()).into_controller())
            .with_controller(SnapshotCRDController::new(ctx.clone()).into_controller())
            .with_controller(ConfigObserver::new(ctx.clone()).into_controller())
            .with_controller(drivers.clone().into_controller())
            .with_controller(detector.clone().into_controller())
            .with_controller(
                MetricsController::new(ctx.guest.clone(), metrics)
                    .into_controller(ctx.config.resync_interval),
            );
        Ok(Self {
            ctx,
            manager,
            drivers,
            problem_detector: Some(detector),
        })
    }

    /// Configuration lives in the guest cluster, operands run in `namespace` of the management cluster
    pub fn hosted(
        guest: ClientSet,
        management: ClientSet,
        config: OperatorConfig,
        namespace: &str,
        metrics: Metrics,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let ctx = ControllerContext::hosted(guest, management, config, namespace);
        validate_assets(&ctx.config)?;
        let drivers = Arc::new(CSIDriverStarter::new(
            ctx.clone(),
            hosted_driver_configs(),
            cancel.clone(),
        ));

        let manager = ControllerManager::new("cluster-storage-operator-hosted")
            .with_controller(ClusterOperatorStatusController::new(ctx.clone()).into_controller())
            .with_controller(SnapshotCRDController::new(ctx.clone()).into_controller())
            .with_controller(ConfigObserver::new(ctx.clone()).into_controller())
            .with_controller(drivers.clone().into_controller())
            .with_controller(
                MetricsController::new(ctx.guest.clone(), metrics)
                    .into_controller(ctx.config.resync_interval),
            );
        Ok(Self {
            ctx,
            manager,
            drivers,
            problem_detector: None,
        })
    }

    pub fn controller_names(&self) -> Vec<&str> {
        self.manager.controller_names()
    }

    /// Handle on the driver starter, for inspecting which drivers run
    pub fn driver_starter(&self) -> Arc<CSIDriverStarter> {
        self.drivers.clone()
    }

    pub fn problem_detector(&self) -> Option<Arc<VSphereProblemDetectorStarter>> {
        self.problem_detector.clone()
    }

    /// Start informers, wait for the feature gates, then run every controller until `cancel`
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let timeout = self.ctx.config.feature_gate_timeout;
        self.ctx.guest.informers.start(cancel.clone());
        if self.ctx.is_hosted() {
            self.ctx.management.informers.start(cancel.clone());
        }
        if !self.ctx.guest.informers.wait_for_sync(timeout).await {
            warn!(?timeout, "Informer caches not synced, continuing");
        }
        if self.ctx.is_hosted() && !self.ctx.management.informers.wait_for_sync(timeout).await {
            warn!(?timeout, "Management informer caches not synced, continuing");
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            observed = wait_for_feature_gates(&self.ctx, timeout) => observed?,
        }

        info!(controllers = self.manager.len(), "Starting operator controllers");
        self.manager.run(cancel).await;
        Ok(())
    }
}

/// Poll the cache until the FeatureGate for the running release shows up
async fn wait_for_feature_gates(ctx: &ControllerContext, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match ctx.feature_gates().await {
            Ok(Some(_)) => {
                info!("Observed feature gates");
                return Ok(());
            }
            Ok(None) => debug!("FeatureGate not observed yet"),
            Err(e) => debug!(error = %e, "Failed to read FeatureGate"),
        }
        if Instant::now() >= deadline {
            return Err(Error::FeatureGateTimeout(timeout));
        }
        tokio::time::sleep(FEATURE_GATE_POLL_INTERVAL).await;
    }
}
