//! Discovery-backed REST mapper
//!
//! Resolves kinds the operator does not compile in (OLM Subscriptions and
//! CSVs, HostedControlPlane, monitoring objects, legacy driver CRs). Results
//! are cached process-wide until `reset()`.

use crate::domain::ports::RestMapper;
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::GroupVersionKind;
use kube::discovery::{self, ApiResource};
use kube::Client;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

pub struct DiscoveryRestMapper {
    client: Client,
    cache: RwLock<HashMap<String, ApiResource>>,
}

impl DiscoveryRestMapper {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

fn cache_key(gvk: &GroupVersionKind) -> String {
    format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
}

fn no_match(gvk: &GroupVersionKind) -> Error {
    Error::NoMatch {
        group: gvk.group.clone(),
        version: gvk.version.clone(),
        kind: gvk.kind.clone(),
    }
}

#[async_trait]
impl RestMapper for DiscoveryRestMapper {
    async fn resource_for(&self, gvk: &GroupVersionKind) -> Result<ApiResource> {
        let key = cache_key(gvk);
        if let Some(resource) = self.cache.read().get(&key) {
            return Ok(resource.clone());
        }

        debug!(%key, "Discovering REST mapping");
        let resource = match discovery::pinned_kind(&self.client, gvk).await {
            Ok((resource, _caps)) => resource,
            Err(kube::Error::Discovery(_)) => return Err(no_match(gvk)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => return Err(no_match(gvk)),
            Err(e) => return Err(e.into()),
        };
        self.cache.write().insert(key, resource.clone());
        Ok(resource)
    }

    fn reset(&self) {
        let mut cache = self.cache.write();
        info!(entries = cache.len(), "Resetting REST mapper cache");
        cache.clear();
    }
}
