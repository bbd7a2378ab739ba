//! ClusterOperator status aggregation
//!
//! Reduces the `*Degraded`, `*Progressing`, `*Available` and `*Upgradeable`
//! conditions every controller writes into the operator config down to the
//! four conditions of the `storage` ClusterOperator.

use crate::client::resources;
use crate::client::typed::{create_typed, get_typed};
use crate::config::{OperatorConfig, CLUSTER_OPERATOR_NAME, OPERATOR_VERSION_NAME};
use crate::controllers::ControllerContext;
use crate::crd::{
    merge_transition_times, now, ClusterOperator, ClusterOperatorSpec, ConditionStatus,
    ManagementState, ObjectReference, OperandVersion, OperatorCondition, Storage,
    OPERATOR_CONFIG_NAME,
};
use crate::domain::ports::{ObjectPatch, Subresource};
use crate::error::Result;
use crate::factory::{Controller, SyncContext, SyncHandler};
use crate::operator::StatusUpdate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use kube::api::ObjectMeta;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const CONTROLLER_NAME: &str = "ClusterOperatorStatusController";

const FIELD_MANAGER: &str = "cluster-storage-operator";

/// Insertion-ordered, deduplicated related objects shared with the driver starter
#[derive(Debug, Clone, Default)]
pub struct RelatedObjects {
    inner: Arc<Mutex<IndexSet<ObjectReference>>>,
}

impl RelatedObjects {
    /// The operator config and the namespaces the operator owns
    pub fn with_base(config: &OperatorConfig) -> Self {
        let related = Self::default();
        related.extend([
            ObjectReference::new("operator.openshift.io", "storages", "", OPERATOR_CONFIG_NAME),
            ObjectReference::new("", "namespaces", "", &config.operator_namespace),
            ObjectReference::new("", "namespaces", "", &config.csi_driver_namespace),
        ]);
        related
    }

    pub fn extend(&self, references: impl IntoIterator<Item = ObjectReference>) {
        self.inner.lock().extend(references);
    }

    pub fn snapshot(&self) -> Vec<ObjectReference> {
        self.inner.lock().iter().cloned().collect()
    }
}

pub struct ClusterOperatorStatusController {
    ctx: ControllerContext,
    inertia: Duration,
}

/// `FooDegraded` -> `Foo`
fn condition_prefix<'a>(condition: &'a OperatorCondition, suffix: &str) -> &'a str {
    condition
        .r#type
        .strip_suffix(suffix)
        .unwrap_or(&condition.r#type)
}

/// Reason and message summarising the matching conditions
fn summarize(matching: &[&OperatorCondition], suffix: &str) -> (String, String) {
    let reason = match matching {
        [single] => format!(
            "{}_{}",
            condition_prefix(single, suffix),
            if single.reason.is_empty() { "Error" } else { single.reason.as_str() }
        ),
        _ => "MultipleConditionsMatching".to_string(),
    };
    let message = matching
        .iter()
        .filter(|c| !c.message.is_empty())
        .map(|c| format!("{}: {}", condition_prefix(c, suffix), c.message))
        .collect::<Vec<_>>()
        .join("\n");
    (reason, message)
}

fn reduce(
    conditions: &[OperatorCondition],
    suffix: &str,
    bad: ConditionStatus,
    clean: ConditionStatus,
) -> OperatorCondition {
    let condition_type = suffix.to_string();
    let matching: Vec<_> = conditions
        .iter()
        .filter(|c| c.r#type.ends_with(suffix) && c.status == bad)
        .collect();
    if matching.is_empty() {
        return OperatorCondition::new(condition_type, clean).with_reason("AsExpected");
    }
    let (reason, message) = summarize(&matching, suffix);
    OperatorCondition::new(condition_type, bad)
        .with_reason(reason)
        .with_message(message)
}

/// Degraded after inertia, plus how long until the next pending one matures
fn reduce_degraded(
    conditions: &[OperatorCondition],
    inertia: Duration,
    at: DateTime<Utc>,
) -> (OperatorCondition, Option<Duration>) {
    let inertia = chrono::Duration::from_std(inertia).unwrap_or_else(|_| chrono::Duration::zero());
    let mut matured = Vec::new();
    let mut next: Option<Duration> = None;
    for condition in conditions
        .iter()
        .filter(|c| c.r#type.ends_with("Degraded") && c.is_true())
    {
        let since = condition.last_transition_time.unwrap_or(at);
        let remaining = since + inertia - at;
        if remaining <= chrono::Duration::zero() {
            matured.push(condition);
        } else {
            let remaining = remaining.to_std().unwrap_or_default();
            next = Some(next.map_or(remaining, |n| n.min(remaining)));
        }
    }

    let condition = if matured.is_empty() {
        OperatorCondition::new("Degraded", ConditionStatus::False).with_reason("AsExpected")
    } else {
        let (reason, message) = summarize(&matured, "Degraded");
        OperatorCondition::new("Degraded", ConditionStatus::True)
            .with_reason(reason)
            .with_message(message)
    };
    (condition, next)
}

fn unknown_conditions(reason: &str) -> Vec<OperatorCondition> {
    ["Available", "Progressing", "Degraded", "Upgradeable"]
        .into_iter()
        .map(|t| {
            OperatorCondition::new(t, ConditionStatus::Unknown)
                .with_reason(reason)
                .with_message(format!("The operator is {reason}"))
        })
        .collect()
}

impl ClusterOperatorStatusController {
    pub fn new(ctx: ControllerContext) -> Self {
        let inertia = ctx.config.degraded_inertia;
        Self { ctx, inertia }
    }

    pub fn into_controller(self) -> Controller {
        let informers = [
            self.ctx.operator.informer(),
            self.ctx
                .guest
                .informers
                .informer(&resources::cluster_operators(), None),
        ];
        let resync = self.ctx.config.resync_interval;
        Controller::builder(CONTROLLER_NAME, Arc::new(self))
            .with_informers(informers)
            .resync_every(resync)
            .build()
    }

    /// Conditions for the ClusterOperator; `requeue` is set while a Degraded condition is maturing
    fn conditions_for(&self, storage: &Storage) -> (Vec<OperatorCondition>, Option<Duration>) {
        match storage.spec.management_state {
            ManagementState::Unmanaged => return (unknown_conditions("Unmanaged"), None),
            ManagementState::Removed => return (unknown_conditions("Removed"), None),
            _ => {}
        }
        let conditions = storage.conditions();
        let (degraded, requeue) = reduce_degraded(conditions, self.inertia, now());
        (
            vec![
                reduce(conditions, "Available", ConditionStatus::False, ConditionStatus::True),
                reduce(conditions, "Progressing", ConditionStatus::True, ConditionStatus::False),
                degraded,
                reduce(conditions, "Upgradeable", ConditionStatus::False, ConditionStatus::True),
            ],
            requeue,
        )
    }

    async fn ensure_cluster_operator(&self) -> Result<ClusterOperator> {
        let store = self.ctx.guest.store.as_ref();
        if let Some(co) = get_typed::<ClusterOperator>(store, None, CLUSTER_OPERATOR_NAME).await? {
            return Ok(co);
        }
        info!(name = CLUSTER_OPERATOR_NAME, "Creating ClusterOperator");
        create_typed(
            store,
            &ClusterOperator {
                metadata: ObjectMeta {
                    name: Some(CLUSTER_OPERATOR_NAME.into()),
                    ..Default::default()
                },
                spec: ClusterOperatorSpec {},
                status: None,
            },
        )
        .await
    }
}

fn is_converged(conditions: &[OperatorCondition]) -> bool {
    conditions.iter().all(|c| match c.r#type.as_str() {
        "Available" => c.is_true(),
        "Progressing" | "Degraded" => c.is_false(),
        _ => true,
    })
}

#[async_trait]
impl SyncHandler for ClusterOperatorStatusController {
    async fn sync(&self, ctx: &SyncContext) -> Result<()> {
        let Some(storage) = self.ctx.operator.get().await? else {
            debug!("Operator config not found, skipping status sync");
            return Ok(());
        };

        let (conditions, requeue) = self.conditions_for(&storage);
        if let Some(delay) = requeue {
            ctx.requeue_after(delay);
        }

        let mut versions = storage
            .status
            .as_ref()
            .map(|s| s.versions.clone())
            .unwrap_or_default();
        let release = &self.ctx.config.release_version;
        if storage.is_managed() && is_converged(&conditions) && !release.is_empty() {
            self.ctx
                .operator
                .apply_status(
                    CONTROLLER_NAME,
                    StatusUpdate::new().version(OPERATOR_VERSION_NAME, release.clone()),
                )
                .await?;
            match versions.iter_mut().find(|v| v.name == OPERATOR_VERSION_NAME) {
                Some(v) => v.version = release.clone(),
                None => versions.push(OperandVersion {
                    name: OPERATOR_VERSION_NAME.into(),
                    version: release.clone(),
                }),
            }
        }

        let co = self.ensure_cluster_operator().await?;
        let status = co.status.unwrap_or_default();
        let related = self.ctx.related.snapshot();

        let merged = merge_transition_times(&status.conditions, conditions);
        let versions_changed = versions
            .iter()
            .any(|v| !status.versions.contains(v));
        let related_changed = related.iter().any(|r| !status.related_objects.contains(r));
        if merged.is_none() && !versions_changed && !related_changed {
            return Ok(());
        }

        let mut body_status = serde_json::Map::new();
        if let Some(conditions) = merged {
            body_status.insert("conditions".into(), serde_json::to_value(conditions)?);
        }
        if versions_changed {
            body_status.insert("versions".into(), serde_json::to_value(&versions)?);
        }
        if related_changed {
            body_status.insert("relatedObjects".into(), serde_json::to_value(&related)?);
        }
        debug!(name = CLUSTER_OPERATOR_NAME, "Updating ClusterOperator status");
        self.ctx
            .guest
            .store
            .patch(
                &resources::cluster_operators(),
                None,
                CLUSTER_OPERATOR_NAME,
                &ObjectPatch::apply(
                    FIELD_MANAGER,
                    Subresource::Status,
                    json!({
                        "apiVersion": "config.openshift.io/v1",
                        "kind": "ClusterOperator",
                        "metadata": { "name": CLUSTER_OPERATOR_NAME },
                        "status": body_status,
                    }),
                ),
            )
            .await?;
        Ok(())
    }
}
