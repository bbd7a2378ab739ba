//! Operator config client
//!
//! Typed access to `storages.operator.openshift.io/cluster`. Reads come from
//! the informer cache. Status writes are server-side applies scoped to the
//! fields a caller passes in: conditions keyed by type, versions keyed by
//! name, generations keyed by group/resource/namespace/name. The whole status
//! is never read-modify-written.

use crate::client::resources;
use crate::client::typed::get_typed;
use crate::client::ClientSet;
use crate::crd::{
    merge_transition_times, GenerationStatus, OperandVersion, OperatorCondition, Storage,
    OPERATOR_CONFIG_NAME,
};
use crate::domain::ports::{Informer, ObjectPatch, ObjectReaderRef, ObjectStoreRef, Subresource};
use crate::error::{Error, Result};
use crate::resourceapply::merge::merge_patch_diff;
use serde_json::{json, Value};
use tracing::debug;

/// Status fields owned by one field manager
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub conditions: Vec<OperatorCondition>,
    pub versions: Vec<OperandVersion>,
    pub generations: Vec<GenerationStatus>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, condition: OperatorCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn version(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.push(OperandVersion {
            name: name.into(),
            version: version.into(),
        });
        self
    }

    pub fn generation(mut self, generation: GenerationStatus) -> Self {
        self.generations.push(generation);
        self
    }
}

#[derive(Clone)]
pub struct OperatorClient {
    store: ObjectStoreRef,
    cache: ObjectReaderRef,
    informer: Informer,
}

impl OperatorClient {
    pub fn new(clients: &ClientSet) -> Self {
        Self {
            store: clients.store.clone(),
            cache: clients.cache.clone(),
            informer: clients.informers.informer(&resources::storages(), None),
        }
    }

    /// Informer of the operator config, for controllers that react to it
    pub fn informer(&self) -> Informer {
        self.informer.clone()
    }

    /// The operator config, `None` when it does not exist yet
    pub async fn get(&self) -> Result<Option<Storage>> {
        get_typed::<Storage>(self.cache.as_ref(), None, OPERATOR_CONFIG_NAME).await
    }

    /// The operator config, failing when it does not exist
    pub async fn require(&self) -> Result<Storage> {
        self.get().await?.ok_or_else(|| Error::ResourceNotFound {
            kind: "Storage".into(),
            name: OPERATOR_CONFIG_NAME.into(),
        })
    }

    pub async fn apply_conditions(
        &self,
        field_manager: &str,
        conditions: Vec<OperatorCondition>,
    ) -> Result<bool> {
        self.apply_status(
            field_manager,
            StatusUpdate {
                conditions,
                ..Default::default()
            },
        )
        .await
    }

    /// Apply the given status fields; returns whether anything was written.
    ///
    /// Conditions, versions and generations go out under distinct field
    /// managers derived from `field_manager`, so each caller must always pass
    /// the complete set it owns for a given kind of field.
    pub async fn apply_status(&self, field_manager: &str, update: StatusUpdate) -> Result<bool> {
        let storage = self.require().await?;
        let status = storage.status.unwrap_or_default();
        let mut written = false;

        if let Some(conditions) = merge_transition_times(&status.conditions, update.conditions) {
            self.patch_status(field_manager, json!({ "conditions": conditions }))
                .await?;
            written = true;
        }

        if update
            .versions
            .iter()
            .any(|v| status.version(&v.name) != Some(v.version.as_str()))
        {
            self.patch_status(
                &format!("{field_manager}-versions"),
                json!({ "versions": update.versions }),
            )
            .await?;
            written = true;
        }

        if update.generations.iter().any(|g| {
            status.expected_generation(&g.group, &g.resource, &g.namespace, &g.name)
                != Some(g.last_generation)
        }) {
            self.patch_status(
                &format!("{field_manager}-generations"),
                json!({ "generations": update.generations }),
            )
            .await?;
            written = true;
        }

        Ok(written)
    }

    async fn patch_status(&self, field_manager: &str, status: Value) -> Result<()> {
        debug!(%field_manager, "Applying operator status");
        let body = json!({
            "apiVersion": "operator.openshift.io/v1",
            "kind": "Storage",
            "metadata": { "name": OPERATOR_CONFIG_NAME },
            "status": status,
        });
        self.store
            .patch(
                &resources::storages(),
                None,
                OPERATOR_CONFIG_NAME,
                &ObjectPatch::apply(field_manager, Subresource::Status, body),
            )
            .await?;
        Ok(())
    }

    /// Set (`Some`) or remove (`None`) annotations on the operator config
    pub async fn set_annotations(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        let annotations: serde_json::Map<String, Value> = changes
            .iter()
            .map(|(key, value)| (key.to_string(), value.map_or(Value::Null, Value::from)))
            .collect();
        self.store
            .patch(
                &resources::storages(),
                None,
                OPERATOR_CONFIG_NAME,
                &ObjectPatch::merge(json!({ "metadata": { "annotations": annotations } })),
            )
            .await?;
        Ok(())
    }

    /// Replace `spec.observedConfig` with `desired`; returns whether anything was written
    pub async fn update_observed_config(&self, desired: Value) -> Result<bool> {
        let storage = self.require().await?;
        let current = storage.spec.observed_config.unwrap_or(Value::Null);
        let Some(diff) = merge_patch_diff(&current, &desired) else {
            return Ok(false);
        };
        self.store
            .patch(
                &resources::storages(),
                None,
                OPERATOR_CONFIG_NAME,
                &ObjectPatch::merge(json!({ "spec": { "observedConfig": diff } })),
            )
            .await?;
        Ok(true)
    }
}
