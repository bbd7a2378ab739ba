//! Observes the cluster proxy into `spec.observedConfig`
//!
//! The proxy settings end up under `targetconfig.proxy` as the environment
//! variables the operand workloads receive.

use crate::client::resources;
use crate::client::typed::get_typed;
use crate::controllers::ControllerContext;
use crate::crd::{Proxy, CLUSTER_CONFIG_NAME};
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const CONTROLLER_NAME: &str = "ConfigObserver";

/// Location of the proxy map inside `spec.observedConfig`
pub const PROXY_CONFIG_PATH: &[&str] = &["targetconfig", "proxy"];

/// Non-empty proxy variables of a Proxy's status
pub fn proxy_env(proxy: Option<&Proxy>) -> BTreeMap<String, String> {
    let Some(status) = proxy.and_then(|p| p.status.as_ref()) else {
        return BTreeMap::new();
    };
    [
        ("HTTP_PROXY", &status.http_proxy),
        ("HTTPS_PROXY", &status.https_proxy),
        ("NO_PROXY", &status.no_proxy),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(name, value)| (name.to_string(), value.clone()))
    .collect()
}

/// Proxy variables stored in an observed config
pub fn proxy_from_observed_config(observed: Option<&Value>) -> BTreeMap<String, String> {
    let mut node = observed;
    for key in PROXY_CONFIG_PATH {
        node = node.and_then(|v| v.get(key));
    }
    node.and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// `observed` with the proxy map replaced by `proxy`
fn with_proxy(observed: Option<&Value>, proxy: &BTreeMap<String, String>) -> Value {
    let mut config = match observed {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };
    let target = config
        .as_object_mut()
        .map(|root| {
            root.entry(PROXY_CONFIG_PATH[0])
                .or_insert_with(|| Value::Object(Map::new()))
        });
    if let Some(target) = target {
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        target[PROXY_CONFIG_PATH[1]] = Value::Object(
            proxy
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
    }
    config
}

pub struct ConfigObserver {
    ctx: ControllerContext,
}

impl ConfigObserver {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    pub fn into_controller(self) -> Controller {
        let informers = [
            self.ctx.operator.informer(),
            self.ctx.guest.informers.informer(&resources::proxies(), None),
        ];
        let resync = self.ctx.config.resync_interval;
        let operator = self.ctx.operator.clone();
        Controller::builder(CONTROLLER_NAME, Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .with_sync_degraded_on_error(operator)
            .build()
    }
}

#[async_trait]
impl SyncHandler for ConfigObserver {
    async fn sync(&self, _ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            return Ok(());
        };
        let proxy =
            get_typed::<Proxy>(self.ctx.guest.cache.as_ref(), None, CLUSTER_CONFIG_NAME).await?;
        let env = proxy_env(proxy.as_ref());
        let observed = storage.spec.observed_config.as_ref();
        if proxy_from_observed_config(observed) == env && observed.is_some() {
            return Ok(());
        }
        if self
            .ctx
            .operator
            .update_observed_config(with_proxy(observed, &env))
            .await?
        {
            info!(proxy = ?env.keys().collect::<Vec<_>>(), "Observed proxy configuration changed");
        }
        Ok(())
    }
}
