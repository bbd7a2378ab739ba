//! Reconciling controllers
//!
//! Every controller reads from the informer caches of a [`ControllerContext`]
//! and writes through its stores. In standalone mode the guest and the
//! management bundles are the same cluster.

pub mod configobserver;
pub mod csidriver;
pub mod defaultstorageclass;
pub mod deployment;
pub mod problemdetector;
pub mod snapshotcrd;
pub mod staticresource;
pub mod status;

use crate::assets::replace::{common_replacer, namespace_replacer};
use crate::assets::AssetLoader;
use crate::client::typed::get_typed;
use crate::client::ClientSet;
use crate::config::OperatorConfig;
use crate::crd::{FeatureGate, FeatureGates, Infrastructure, CLUSTER_CONFIG_NAME};
use crate::error::{Error, Result};
use crate::operator::OperatorClient;
use std::sync::Arc;

pub use status::RelatedObjects;

/// Shared state handed to every controller
#[derive(Clone)]
pub struct ControllerContext {
    /// Cluster holding the operator config, cluster config and driver CRs
    pub guest: ClientSet,
    /// Cluster running operand workloads
    pub management: ClientSet,
    pub operator: OperatorClient,
    pub config: Arc<OperatorConfig>,
    /// Control-plane namespace of a hosted cluster
    pub hosted_namespace: Option<String>,
    pub related: RelatedObjects,
}

impl ControllerContext {
    pub fn standalone(clients: ClientSet, config: OperatorConfig) -> Self {
        let related = RelatedObjects::with_base(&config);
        Self {
            operator: OperatorClient::new(&clients),
            guest: clients.clone(),
            management: clients,
            config: Arc::new(config),
            hosted_namespace: None,
            related,
        }
    }

    /// Operands go to `namespace` on the management cluster
    pub fn hosted(
        guest: ClientSet,
        management: ClientSet,
        mut config: OperatorConfig,
        namespace: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        config.csi_driver_namespace = namespace.clone();
        let related = RelatedObjects::with_base(&config);
        Self {
            operator: OperatorClient::new(&guest),
            guest,
            management,
            config: Arc::new(config),
            hosted_namespace: Some(namespace),
            related,
        }
    }

    pub fn is_hosted(&self) -> bool {
        self.hosted_namespace.is_some()
    }

    pub async fn infrastructure(&self) -> Result<Option<Infrastructure>> {
        get_typed::<Infrastructure>(self.guest.cache.as_ref(), None, CLUSTER_CONFIG_NAME).await
    }

    /// Infrastructure, failing when it does not exist
    pub async fn require_infrastructure(&self) -> Result<Infrastructure> {
        self.infrastructure()
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "Infrastructure".into(),
                name: CLUSTER_CONFIG_NAME.into(),
            })
    }

    /// Feature gates of the running release, `None` until observed
    pub async fn feature_gates(&self) -> Result<Option<FeatureGates>> {
        let gate =
            get_typed::<FeatureGate>(self.guest.cache.as_ref(), None, CLUSTER_CONFIG_NAME).await?;
        Ok(gate.and_then(|g| g.gates_for(&self.config.release_version)))
    }

    /// Loader with the replacements shared by every CSI driver operand
    pub fn asset_loader(&self) -> AssetLoader {
        AssetLoader::new(
            common_replacer(&self.config.environment)
                .extend(namespace_replacer(&self.config.csi_driver_namespace)),
        )
    }
}
