//! Prometheus metrics
//!
//! Gauges recomputed from the StorageClass and VolumeAttributesClass caches,
//! exposed from the operator's own registry.

use crate::client::typed::list_typed;
use crate::client::{resources, ClientSet};
use crate::domain::ports::ObjectReader;
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::DynamicObject;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const CONTROLLER_NAME: &str = "MetricsController";

/// Annotation marking a StorageClass as the cluster default
pub const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
const BETA_DEFAULT_CLASS_ANNOTATION: &str = "storageclass.beta.kubernetes.io/is-default-class";

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    default_storage_class_count: IntGauge,
    vac_mismatch_parameters: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let default_storage_class_count = IntGauge::new(
            "default_storage_class_count",
            "[ALPHA] Number of default storage classes",
        )?;
        let vac_mismatch_parameters = IntGaugeVec::new(
            Opts::new(
                "openshift_cluster_storage_vac_mismatch_parameters",
                "[ALPHA] 1 when the VolumeAttributesClasses of a CSI driver do not declare the \
                 same set of parameters",
            ),
            &["driver"],
        )?;
        registry.register(Box::new(default_storage_class_count.clone()))?;
        registry.register(Box::new(vac_mismatch_parameters.clone()))?;
        Ok(Self {
            registry,
            default_storage_class_count,
            vac_mismatch_parameters,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn default_storage_class_count(&self) -> i64 {
        self.default_storage_class_count.get()
    }

    pub fn vac_mismatch(&self, driver: &str) -> i64 {
        self.vac_mismatch_parameters
            .with_label_values(&[driver])
            .get()
    }
}

pub fn is_default_class(class: &StorageClass) -> bool {
    class.metadata.annotations.as_ref().is_some_and(|a| {
        [DEFAULT_CLASS_ANNOTATION, BETA_DEFAULT_CLASS_ANNOTATION]
            .iter()
            .any(|key| a.get(*key).map(String::as_str) == Some("true"))
    })
}

/// Per driver, whether its VolumeAttributesClasses disagree on parameter keys
pub fn vac_mismatches(classes: &[DynamicObject]) -> BTreeMap<String, bool> {
    let mut key_sets: BTreeMap<String, BTreeSet<BTreeSet<String>>> = BTreeMap::new();
    for class in classes {
        let Some(driver) = class.data.get("driverName").and_then(|v| v.as_str()) else {
            continue;
        };
        let keys = class
            .data
            .get("parameters")
            .and_then(|v| v.as_object())
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        key_sets.entry(driver.to_string()).or_default().insert(keys);
    }
    key_sets
        .into_iter()
        .map(|(driver, sets)| (driver, sets.len() > 1))
        .collect()
}

pub struct MetricsController {
    clients: ClientSet,
    metrics: Metrics,
}

impl MetricsController {
    pub fn new(clients: ClientSet, metrics: Metrics) -> Self {
        Self { clients, metrics }
    }

    pub fn into_controller(self, resync: Duration) -> Controller {
        let informers = [
            self.clients
                .informers
                .informer(&resources::storage_classes(), None),
            self.clients
                .informers
                .informer(&resources::volume_attributes_classes(), None),
        ];
        Controller::builder(CONTROLLER_NAME, Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .build()
    }
}

#[async_trait]
impl SyncHandler for MetricsController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let classes = list_typed::<StorageClass>(self.clients.cache.as_ref(), None).await?;
        let defaults = classes.iter().filter(|c| is_default_class(c)).count();
        self.metrics
            .default_storage_class_count
            .set(i64::try_from(defaults).unwrap_or(i64::MAX));

        match self
            .clients
            .cache
            .list(&resources::volume_attributes_classes(), None)
            .await
        {
            Ok(vacs) => {
                self.metrics.vac_mismatch_parameters.reset();
                for (driver, mismatch) in vac_mismatches(&vacs) {
                    self.metrics
                        .vac_mismatch_parameters
                        .with_label_values(&[&driver])
                        .set(i64::from(mismatch));
                }
            }
            Err(e) => warn!(error = %e, "Failed to list VolumeAttributesClasses"),
        }
        Ok(())
    }
}
