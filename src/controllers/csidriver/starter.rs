//! Starts the CSI driver operators that belong on the cluster
//!
//! Each driver is evaluated on every sync until it starts. A started driver
//! keeps running for the lifetime of the process, even if its platform or
//! feature gate later stops matching.

use crate::client::resources;
use crate::client::typed::get_typed;
use crate::controllers::csidriver::{should_run, DriverConfig, DriverManager};
use crate::controllers::ControllerContext;
use crate::error::{Error, Result};
use crate::factory::{Controller, SyncContext, SyncHandler};
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::CSIDriver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const CONTROLLER_NAME: &str = "CSIDriverStarter";

struct DriverSlot {
    manager: DriverManager,
    running: AtomicBool,
}

pub struct CSIDriverStarter {
    ctx: ControllerContext,
    drivers: Vec<DriverSlot>,
    cancel: CancellationToken,
}

impl CSIDriverStarter {
    /// Started drivers run until `cancel` fires
    pub fn new(
        ctx: ControllerContext,
        configs: Vec<DriverConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let drivers = configs
            .into_iter()
            .map(|config| DriverSlot {
                manager: DriverManager::new(ctx.clone(), config),
                running: AtomicBool::new(false),
            })
            .collect();
        Self {
            ctx,
            drivers,
            cancel,
        }
    }

    /// Names of the drivers started so far
    pub fn running_drivers(&self) -> Vec<&'static str> {
        self.drivers
            .iter()
            .filter(|slot| slot.running.load(Ordering::SeqCst))
            .map(|slot| slot.manager.config().name)
            .collect()
    }

    pub fn into_controller(self: Arc<Self>) -> Controller {
        let guest = &self.ctx.guest.informers;
        let informers = [
            self.ctx.operator.informer(),
            guest.informer(&resources::infrastructures(), None),
            guest.informer(&resources::feature_gates(), None),
            guest.informer(&resources::csi_drivers(), None),
        ];
        Controller::builder(CONTROLLER_NAME, self.clone())
            .with_informers(informers)
            .resync_every(self.ctx.config.resync_interval)
            .with_sync_degraded_on_error(self.ctx.operator.clone())
            .build()
    }

    async fn start(&self, slot: &DriverSlot) -> Result<()> {
        let references = slot.manager.related_objects().await?;
        self.ctx.related.extend(references);

        let config = slot.manager.config();
        info!(driver = %config.name, "Starting CSI driver operator");
        let manager = slot.manager.controller_manager();
        tokio::spawn(manager.run(self.cancel.child_token()));
        slot.running.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SyncHandler for CSIDriverStarter {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }
        let infra = self.ctx.require_infrastructure().await?;
        let gates = self.ctx.feature_gates().await?;

        let mut errors = Vec::new();
        for slot in self
            .drivers
            .iter()
            .filter(|slot| !slot.running.load(Ordering::SeqCst))
        {
            let config = slot.manager.config();
            let csi_driver =
                get_typed::<CSIDriver>(self.ctx.guest.cache.as_ref(), None, config.driver_name)
                    .await?;
            match should_run(config, &infra, gates.as_ref(), csi_driver.as_ref()) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(driver = %config.name, error = %e, "Not starting CSI driver operator");
                    errors.push(e);
                    continue;
                }
            }
            if let Err(e) = self.start(slot).await {
                warn!(driver = %config.name, error = %e, "Failed to start CSI driver operator");
                errors.push(e);
            }
        }
        Error::aggregate(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{feature_gate, infrastructure, operator_config, FakeCluster};
    use crate::config::OperatorConfig;
    use crate::controllers::csidriver::driver_configs;
    use crate::crd::{ManagementState, PlatformType, StorageSpec};
    use assert_matches::assert_matches;

    fn starter(cluster: &Arc<FakeCluster>) -> CSIDriverStarter {
        let config = OperatorConfig {
            release_version: "4.15.0".into(),
            ..Default::default()
        };
        let ctx = ControllerContext::standalone(cluster.clients(), config);
        CSIDriverStarter::new(ctx, driver_configs(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_missing_infrastructure_is_an_error() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        let err = starter(&cluster)
            .sync(&SyncContext::detached())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unmanaged_starts_nothing() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec {
            management_state: ManagementState::Unmanaged,
            ..Default::default()
        }));
        cluster.seed(&infrastructure(Some(PlatformType::AWS)));
        let starter = starter(&cluster);
        starter.sync(&SyncContext::detached()).await.unwrap();
        assert!(starter.running_drivers().is_empty());
    }

    #[tokio::test]
    async fn test_starts_platform_drivers_once() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        cluster.seed(&infrastructure(Some(PlatformType::OpenStack)));
        cluster.seed(&feature_gate("4.15.0", &[]));
        let starter = starter(&cluster);

        starter.sync(&SyncContext::detached()).await.unwrap();
        assert_eq!(
            starter.running_drivers(),
            ["openstack-cinder", "openstack-manila"]
        );
        let related = starter.ctx.related.snapshot();
        assert!(related
            .iter()
            .any(|r| r.resource == "clustercsidrivers" && r.name == "cinder.csi.openstack.org"));

        starter.sync(&SyncContext::detached()).await.unwrap();
        assert_eq!(starter.running_drivers().len(), 2);
    }

    #[tokio::test]
    async fn test_related_object_failure_retries() {
        let cluster = FakeCluster::new();
        cluster.seed(&operator_config(StorageSpec::default()));
        cluster.seed(&infrastructure(Some(PlatformType::AWS)));
        cluster.unregister_kind(&resources::service_monitor_gvk());
        let starter = starter(&cluster);

        let err = starter.sync(&SyncContext::detached()).await.unwrap_err();
        assert_matches!(err, Error::NoMatch { .. });
        assert!(starter.running_drivers().is_empty());

        cluster.register_kind(kube::discovery::ApiResource::from_gvk_with_plural(
            &resources::service_monitor_gvk(),
            "servicemonitors",
        ));
        starter.sync(&SyncContext::detached()).await.unwrap();
        assert_eq!(starter.running_drivers(), ["aws-ebs"]);
    }
}
