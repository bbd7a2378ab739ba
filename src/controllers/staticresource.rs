//! Applies fixed sets of manifests
//!
//! Used for the RBAC and service accounts of every operand and for the
//! monitoring objects, whose kinds are resolved through the REST mapper.

use crate::assets::AssetLoader;
use crate::client::{resources, ClientSet};
use crate::crd::ObjectReference;
use crate::error::{Error, Result};
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::operator::OperatorClient;
use crate::resourceapply::apply_dynamic;
use async_trait::async_trait;
use kube::api::DynamicObject;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Assets applied to one cluster with one loader
#[derive(Clone)]
struct AssetGroup {
    clients: ClientSet,
    loader: AssetLoader,
    assets: Vec<String>,
}

pub struct StaticResourceController {
    name: String,
    operator: OperatorClient,
    groups: Vec<AssetGroup>,
}

/// Related-object reference of a rendered manifest
pub async fn related_object(clients: &ClientSet, object: &DynamicObject) -> Result<ObjectReference> {
    let gvk = resources::gvk_of(object)?;
    let resource = resources::resolve(clients.mapper.as_ref(), &gvk).await?;
    Ok(ObjectReference::new(
        resource.group,
        resource.plural,
        object.metadata.namespace.clone().unwrap_or_default(),
        object.metadata.name.clone().unwrap_or_default(),
    ))
}

impl StaticResourceController {
    pub fn new(name: impl Into<String>, operator: OperatorClient) -> Self {
        Self {
            name: name.into(),
            operator,
            groups: Vec::new(),
        }
    }

    /// Apply `assets` rendered by `loader` to the cluster behind `clients`
    pub fn with_assets<I, S>(mut self, clients: ClientSet, loader: AssetLoader, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let assets: Vec<String> = assets.into_iter().map(Into::into).collect();
        if !assets.is_empty() {
            self.groups.push(AssetGroup {
                clients,
                loader,
                assets,
            });
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.assets.iter().map(String::as_str))
    }

    /// References of every managed object; a missing REST mapping resets the mapper
    pub async fn related_objects(&self) -> Result<Vec<ObjectReference>> {
        let mut references = Vec::new();
        let mut errors = Vec::new();
        for group in &self.groups {
            for asset in &group.assets {
                let reference = match group.loader.load(asset) {
                    Ok(object) => related_object(&group.clients, &object).await,
                    Err(e) => Err(e),
                };
                match reference {
                    Ok(reference) => references.push(reference),
                    Err(e) => {
                        if e.is_no_match() {
                            group.clients.mapper.reset();
                        }
                        errors.push(e);
                    }
                }
            }
        }
        Error::aggregate(errors)?;
        Ok(references)
    }

    pub fn into_controller(self: Arc<Self>, resync: Duration) -> Controller {
        Controller::builder(self.name.clone(), self.clone())
            .with_informers([self.operator.informer()])
            .resync_every(resync)
            .with_sync_degraded_on_error(self.operator.clone())
            .build()
    }
}

#[async_trait]
impl SyncHandler for StaticResourceController {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.operator.get().await? else {
            return Ok(());
        };
        if !storage.is_managed() {
            return Ok(());
        }

        let mut errors = Vec::new();
        for group in &self.groups {
            for asset in &group.assets {
                let applied = match group.loader.load(asset) {
                    Ok(object) => {
                        apply_dynamic(
                            group.clients.store.as_ref(),
                            group.clients.mapper.as_ref(),
                            &object,
                        )
                        .await
                    }
                    Err(e) => Err(e),
                };
                match applied {
                    Ok(result) if result.modified => {
                        debug!(controller = %self.name, %asset, "Applied asset")
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(controller = %self.name, %asset, error = %e, "Failed to apply asset");
                        errors.push(e);
                    }
                }
            }
        }
        Error::aggregate(errors)
    }
}
