//! Default StorageClass for platforms without a CSI driver operator

use crate::assets::AssetLoader;
use crate::client::resources;
use crate::client::typed::from_dynamic;
use crate::controllers::ControllerContext;
use crate::crd::{
    find_condition, ConditionStatus, Infrastructure, OperatorCondition, PlatformType, Storage,
    VSphereStorageDriver,
};
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::resourceapply::apply_storage_class;
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::StorageClass;
use std::sync::Arc;
use tracing::{debug, info};

pub const CONTROLLER_NAME: &str = "DefaultStorageClassController";

pub const VSPHERE_STORAGE_CLASS_ASSET: &str = "storageclasses/vsphere.yaml";

const CSI_PROVIDED_MESSAGE: &str =
    "StorageClass provided by supplied CSI Driver instead of the cluster-storage-operator";

const UNSUPPORTED_MESSAGE: &str = "No default StorageClass for this platform";

/// What the controller does for a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultClass {
    /// No class and no driver: the controller is disabled
    Unsupported,
    /// The CSI driver operator ships the class
    CsiProvided,
    /// The operator applies the named asset
    Asset(&'static str),
}

/// Platform table for the default class
pub fn default_class_for(platform: Option<PlatformType>, storage: &Storage) -> DefaultClass {
    match platform {
        Some(
            PlatformType::AWS
            | PlatformType::GCP
            | PlatformType::Azure
            | PlatformType::AlibabaCloud
            | PlatformType::IBMCloud
            | PlatformType::OpenStack
            | PlatformType::Ovirt,
        ) => DefaultClass::CsiProvided,
        Some(PlatformType::VSphere) => {
            if storage.spec.vsphere_storage_driver == VSphereStorageDriver::CSIWithMigrationDriver {
                DefaultClass::CsiProvided
            } else {
                DefaultClass::Asset(VSPHERE_STORAGE_CLASS_ASSET)
            }
        }
        _ => DefaultClass::Unsupported,
    }
}

pub struct DefaultStorageClassController {
    ctx: ControllerContext,
    loader: AssetLoader,
}

fn condition(suffix: &str, status: ConditionStatus) -> OperatorCondition {
    OperatorCondition::new(format!("{CONTROLLER_NAME}{suffix}"), status)
}

impl DefaultStorageClassController {
    pub fn new(ctx: ControllerContext) -> Self {
        Self {
            ctx,
            loader: AssetLoader::default(),
        }
    }

    pub fn into_controller(self) -> Controller {
        let informers = [
            self.ctx.operator.informer(),
            self.ctx
                .guest
                .informers
                .informer(&resources::infrastructures(), None),
            self.ctx
                .guest
                .informers
                .informer(&resources::storage_classes(), None),
        ];
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(CONTROLLER_NAME, Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }

    async fn reconcile(
        &self,
        storage: &Storage,
        infra: Option<&Infrastructure>,
    ) -> Result<Vec<OperatorCondition>> {
        let platform = infra.and_then(Infrastructure::platform);
        match default_class_for(platform, storage) {
            DefaultClass::Unsupported => {
                debug!(?platform, "No default StorageClass for platform");
                Ok(vec![
                    condition("Disabled", ConditionStatus::True).with_reason("UnsupportedPlatform"),
                    condition("Available", ConditionStatus::True)
                        .with_reason("UnsupportedPlatform")
                        .with_message(UNSUPPORTED_MESSAGE),
                    condition("Progressing", ConditionStatus::False).with_reason("AsExpected"),
                ])
            }
            DefaultClass::CsiProvided => Ok(vec![
                condition("Disabled", ConditionStatus::False).with_reason("AsExpected"),
                condition("Available", ConditionStatus::True)
                    .with_reason("AsExpected")
                    .with_message(CSI_PROVIDED_MESSAGE),
                condition("Progressing", ConditionStatus::False).with_reason("AsExpected"),
            ]),
            DefaultClass::Asset(asset) => {
                let class: StorageClass = from_dynamic(self.loader.load(asset)?)?;
                let (_, modified) =
                    apply_storage_class(self.ctx.guest.store.as_ref(), &class).await?;
                if modified {
                    info!(
                        storage_class = class.metadata.name.as_deref().unwrap_or_default(),
                        "Applied default StorageClass"
                    );
                }
                Ok(vec![
                    condition("Disabled", ConditionStatus::False).with_reason("AsExpected"),
                    condition("Available", ConditionStatus::True).with_reason("AsExpected"),
                    condition("Progressing", ConditionStatus::False).with_reason("AsExpected"),
                ])
            }
        }
    }
}

#[async_trait]
impl SyncHandler for DefaultStorageClassController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }
        let infra = self.ctx.infrastructure().await?;

        match self.reconcile(&storage, infra.as_ref()).await {
            Ok(conditions) => {
                self.ctx
                    .operator
                    .apply_conditions(CONTROLLER_NAME, conditions)
                    .await?;
                Ok(())
            }
            Err(e) => {
                let was_available = find_condition(
                    storage.conditions(),
                    &format!("{CONTROLLER_NAME}Available"),
                )
                .is_some_and(OperatorCondition::is_true);
                let available = if was_available {
                    condition("Available", ConditionStatus::True).with_reason("AsExpected")
                } else {
                    condition("Available", ConditionStatus::False)
                        .with_reason("SyncError")
                        .with_message(e.to_string())
                };
                let progressing = condition("Progressing", ConditionStatus::True)
                    .with_reason("SyncError")
                    .with_message(e.to_string());
                self.ctx
                    .operator
                    .apply_conditions(
                        CONTROLLER_NAME,
                        vec![
                            condition("Disabled", ConditionStatus::False).with_reason("AsExpected"),
                            available,
                            progressing,
                        ],
                    )
                    .await?;
                Err(e)
            }
        }
    }
}
