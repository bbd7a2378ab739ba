//! Removal of a driver operator previously installed through OLM
//!
//! The progress of a removal survives restarts through two annotations on
//! the operator config, written before the Subscription is deleted and
//! cleared once everything OLM installed is gone.

use crate::client::resources;
use crate::controllers::csidriver::{DriverConfig, OlmConfig};
use crate::controllers::ControllerContext;
use crate::crd::{ConditionStatus, OperatorCondition, Storage};
use crate::domain::ports::{ObjectReader, ObjectWriter};
use crate::error::{Error, Result};
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::operator::StatusUpdate;
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CATALOG_SOURCE: &str = "redhat-operators";
const CATALOG_NAMESPACE: &str = "openshift-marketplace";
const LEGACY_CR_NAME: &str = "cluster";

/// Delay before checking again on a pending deletion
pub const REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Where a removal stands after one pass
#[derive(Debug, Clone, PartialEq, Eq)]
enum Progress {
    /// Nothing was ever installed through OLM
    NotInstalled,
    Waiting(String),
    Removed,
}

pub struct OlmRemovalController {
    name: String,
    prefix: String,
    annotation_prefix: String,
    olm: OlmConfig,
    ctx: ControllerContext,
}

fn spec_field<'a>(object: &'a DynamicObject, field: &str) -> Option<&'a str> {
    object.data.get("spec")?.get(field)?.as_str()
}

impl OlmRemovalController {
    /// `None` when the driver never shipped through OLM
    pub fn new(ctx: ControllerContext, config: &DriverConfig) -> Option<Self> {
        let olm = config.olm.clone()?;
        Some(Self {
            name: config.olm_controller_name(),
            prefix: format!("{}OLMOperatorRemoval", config.condition_prefix),
            annotation_prefix: format!(
                "{}.olm-removal.storage.openshift.io",
                config.condition_prefix.to_lowercase()
            ),
            olm,
            ctx,
        })
    }

    pub fn namespace_annotation(&self) -> String {
        format!("{}/namespace", self.annotation_prefix)
    }

    pub fn csv_annotation(&self) -> String {
        format!("{}/csvName", self.annotation_prefix)
    }

    pub fn into_controller(self) -> Controller {
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(self.name.clone(), Arc::new(self))
            .with_informers([operator.informer()])
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }

    async fn resolve(&self, gvk: &kube::api::GroupVersionKind) -> Result<ApiResource> {
        let mapper = self.ctx.guest.mapper.as_ref();
        resources::resolve(mapper, gvk).await.map_err(|e| {
            if e.is_no_match() {
                mapper.reset();
            }
            e
        })
    }

    /// A cluster without the Subscription kind has no OLM to remove
    async fn find_subscription(&self) -> Result<Option<DynamicObject>> {
        let resource = match self.resolve(&resources::subscription_gvk()).await {
            Ok(resource) => resource,
            Err(Error::NoMatch { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(self
            .ctx
            .guest
            .store
            .list(&resource, None)
            .await?
            .into_iter()
            .find(|s| {
                spec_field(s, "name") == Some(self.olm.package_name)
                    && spec_field(s, "source") == Some(CATALOG_SOURCE)
                    && spec_field(s, "sourceNamespace") == Some(CATALOG_NAMESPACE)
            }))
    }

    async fn remove(&self, storage: &Storage) -> Result<Progress> {
        let store = self.ctx.guest.store.as_ref();

        if let Some(subscription) = self.find_subscription().await? {
            let namespace = subscription.metadata.namespace.clone().unwrap_or_default();
            let name = subscription.metadata.name.clone().unwrap_or_default();
            let csv = subscription
                .data
                .pointer("/status/currentCSV")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let (namespace_key, csv_key) = (self.namespace_annotation(), self.csv_annotation());
            self.ctx
                .operator
                .set_annotations(&[
                    (namespace_key.as_str(), Some(namespace.as_str())),
                    (csv_key.as_str(), Some(csv.as_str())),
                ])
                .await?;
            let resource = self.resolve(&resources::subscription_gvk()).await?;
            info!(subscription = %name, %namespace, "Deleting OLM Subscription");
            store.delete(&resource, Some(&namespace), &name).await?;
            return Ok(Progress::Waiting("Waiting for subscription deletion".into()));
        }

        let namespace = storage
            .annotation(&self.namespace_annotation())
            .unwrap_or_default()
            .to_string();
        if namespace.is_empty() {
            return Ok(Progress::NotInstalled);
        }

        let csv = storage.annotation(&self.csv_annotation()).unwrap_or_default();
        if !csv.is_empty() {
            let resource = self.resolve(&resources::cluster_service_version_gvk()).await?;
            if store.get(&resource, Some(&namespace), csv).await?.is_some() {
                info!(csv = %csv, %namespace, "Deleting OLM ClusterServiceVersion");
                store.delete(&resource, Some(&namespace), csv).await?;
                return Ok(Progress::Waiting(format!(
                    "Waiting for ClusterServiceVersion {csv} deletion"
                )));
            }
        }

        if store
            .get(&resources::deployments(), Some(&namespace), self.olm.deployment_name)
            .await?
            .is_some()
        {
            return Ok(Progress::Waiting(format!(
                "Waiting for OLM to remove Deployment {}",
                self.olm.deployment_name
            )));
        }

        let resource = match self.resolve(&self.olm.cr_kind).await {
            Ok(resource) => Some(resource),
            Err(Error::NoMatch { .. }) => None,
            Err(e) => return Err(e),
        };
        if let Some(resource) = resource {
            if let Some(mut cr) = store.get(&resource, None, LEGACY_CR_NAME).await? {
                if cr.metadata.finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
                    cr.metadata.finalizers = None;
                    store.update(&resource, &cr).await?;
                }
                info!(kind = %resource.kind, "Deleting legacy driver CR");
                store.delete(&resource, None, LEGACY_CR_NAME).await?;
                return Ok(Progress::Waiting(format!(
                    "Waiting for {} {LEGACY_CR_NAME} deletion",
                    resource.kind
                )));
            }
        }

        Ok(Progress::Removed)
    }

    fn condition(&self, suffix: &str, status: ConditionStatus) -> OperatorCondition {
        OperatorCondition::new(format!("{}{suffix}", self.prefix), status)
    }
}

#[async_trait]
impl SyncHandler for OlmRemovalController {
    async fn sync(&self, ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }

        let progress = self.remove(&storage).await?;
        if progress == Progress::Removed {
            info!(controller = %self.name, "OLM operator removed");
            let (namespace_key, csv_key) = (self.namespace_annotation(), self.csv_annotation());
            self.ctx
                .operator
                .set_annotations(&[(namespace_key.as_str(), None), (csv_key.as_str(), None)])
                .await?;
        }

        let (available, progressing) = match progress {
            Progress::NotInstalled => (
                self.condition("Available", ConditionStatus::True)
                    .with_reason("AsExpected"),
                self.condition("Progressing", ConditionStatus::False)
                    .with_reason("AsExpected"),
            ),
            Progress::Waiting(message) => {
                ctx.requeue_after(REQUEUE_DELAY);
                (
                    self.condition("Available", ConditionStatus::False)
                        .with_reason("Removing")
                        .with_message(message.clone()),
                    self.condition("Progressing", ConditionStatus::True)
                        .with_reason("Removing")
                        .with_message(message),
                )
            }
            Progress::Removed => (
                self.condition("Available", ConditionStatus::True)
                    .with_reason("AsExpected")
                    .with_message("CSI driver has been removed from OLM"),
                self.condition("Progressing", ConditionStatus::False)
                    .with_reason("AsExpected"),
            ),
        };
        self.ctx
            .operator
            .apply_status(
                &self.name,
                StatusUpdate::new().condition(available).condition(progressing),
            )
            .await?;
        Ok(())
    }
}
