//! In-memory cluster implementing every port
//!
//! Objects live in a single map. Writes bump `resourceVersion`, bump
//! `metadata.generation` when anything outside metadata and status changes,
//! honour finalizers on delete, and notify the informers of the written
//! resource. Server-side apply merges list-map fields (conditions,
//! generations, versions, relatedObjects) by key.

use crate::client::resources::{
    cluster_service_version_gvk, hosted_control_plane_gvk, prometheus_rule_gvk,
    service_monitor_gvk, subscription_gvk,
};
use crate::client::typed::{from_dynamic, to_dynamic, with_type_meta};
use crate::client::ClientSet;
use crate::crd::{
    FeatureGate, FeatureGateAttributes, FeatureGateDetails, FeatureGateSpec, FeatureGateStatus,
    Infrastructure, InfrastructureSpec, InfrastructureStatus, PlatformStatus, PlatformType,
    Storage, StorageSpec, CLUSTER_CONFIG_NAME, OPERATOR_CONFIG_NAME,
};
use crate::domain::ports::{
    Informer, InformerFactory, ObjectPatch, ObjectReader, ObjectWriter, PatchKind, RestMapper,
    Subresource,
};
use crate::error::{Error, Result};
use crate::resourceapply::merge::merge_patch;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{DynamicObject, GroupVersionKind, ObjectMeta, TypeMeta};
use kube::discovery::ApiResource;
use kube::Resource;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

type ObjectKey = (String, String, String, String);

/// A recorded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub verb: &'static str,
    pub resource: String,
    pub namespace: Option<String>,
    pub name: String,
}

pub struct FakeCluster {
    objects: Mutex<BTreeMap<ObjectKey, DynamicObject>>,
    channels: Mutex<HashMap<(String, String), broadcast::Sender<()>>>,
    kinds: Mutex<HashMap<String, ApiResource>>,
    actions: Mutex<Vec<Action>>,
    resource_version: AtomicU64,
    mapper_resets: AtomicUsize,
}

fn object_key(resource: &ApiResource, namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        resource.group.clone(),
        resource.plural.clone(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn gvk_key(gvk: &GroupVersionKind) -> String {
    format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
}

fn plural_for(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

/// Everything except metadata and status
fn desired_state(object: &DynamicObject) -> Value {
    let mut data = object.data.clone();
    if let Value::Object(map) = &mut data {
        map.remove("status");
        map.remove("metadata");
    }
    data
}

fn list_map_keys(field: &str) -> Option<&'static [&'static str]> {
    match field {
        "conditions" => Some(&["type"]),
        "versions" => Some(&["name"]),
        "generations" | "relatedObjects" => Some(&["group", "resource", "namespace", "name"]),
        _ => None,
    }
}

fn same_list_key(a: &Value, b: &Value, keys: &[&str]) -> bool {
    keys.iter().all(|k| {
        let left = a.get(*k).and_then(Value::as_str).unwrap_or_default();
        let right = b.get(*k).and_then(Value::as_str).unwrap_or_default();
        left == right
    })
}

/// Server-side apply merge: maps merge, keyed lists upsert, everything else replaces
fn apply_merge(target: &mut Value, patch: &Value, field: &str) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    let slot = target_map.entry(key.clone()).or_insert(Value::Null);
                    apply_merge(slot, value, key);
                }
            }
        }
        Value::Array(items) => match list_map_keys(field) {
            Some(keys) => {
                if !target.is_array() {
                    *target = Value::Array(Vec::new());
                }
                if let Value::Array(existing) = target {
                    for item in items {
                        match existing.iter_mut().find(|e| same_list_key(e, item, keys)) {
                            Some(slot) => *slot = item.clone(),
                            None => existing.push(item.clone()),
                        }
                    }
                }
            }
            None => *target = patch.clone(),
        },
        _ => *target = patch.clone(),
    }
}

fn without_status(body: &Value) -> Value {
    let mut body = body.clone();
    if let Value::Object(map) = &mut body {
        map.remove("status");
    }
    body
}

fn only_status(body: &Value) -> Value {
    serde_json::json!({ "status": body.get("status").cloned().unwrap_or(Value::Null) })
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        let cluster = Self {
            objects: Mutex::new(BTreeMap::new()),
            channels: Mutex::new(HashMap::new()),
            kinds: Mutex::new(HashMap::new()),
            actions: Mutex::new(Vec::new()),
            resource_version: AtomicU64::new(1),
            mapper_resets: AtomicUsize::new(0),
        };
        for gvk in [
            subscription_gvk(),
            cluster_service_version_gvk(),
            hosted_control_plane_gvk(),
            service_monitor_gvk(),
            prometheus_rule_gvk(),
            GroupVersionKind::gvk("csi.openshift.io", "v1alpha1", "AWSEBSDriver"),
        ] {
            let plural = plural_for(&gvk.kind);
            cluster.register_kind(ApiResource::from_gvk_with_plural(&gvk, &plural));
        }
        Arc::new(cluster)
    }

    /// Ports bundle backed by this cluster
    pub fn clients(self: &Arc<Self>) -> ClientSet {
        ClientSet::new(self.clone(), self.clone(), self.clone(), self.clone())
    }

    pub fn register_kind(&self, resource: ApiResource) {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        self.kinds.lock().insert(gvk_key(&gvk), resource);
    }

    pub fn unregister_kind(&self, gvk: &GroupVersionKind) {
        self.kinds.lock().remove(&gvk_key(gvk));
    }

    pub fn mapper_resets(&self) -> usize {
        self.mapper_resets.load(Ordering::SeqCst)
    }

    /// Insert a typed object without recording a write
    pub fn seed<K>(&self, object: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let resource = ApiResource::erase::<K>(&());
        let object = to_dynamic(object).expect("seed object serializes");
        self.seed_dynamic(&resource, object);
    }

    /// Insert a dynamic object without recording a write
    pub fn seed_dynamic(&self, resource: &ApiResource, mut object: DynamicObject) {
        let name = object.metadata.name.clone().expect("seed object has a name");
        let key = object_key(resource, object.metadata.namespace.as_deref(), &name);
        object = with_type_meta(object, resource);
        object.metadata.generation.get_or_insert(1);
        object.metadata.resource_version = Some(self.next_resource_version());
        self.objects.lock().insert(key, object);
        self.notify(resource);
    }

    pub fn object(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<DynamicObject> {
        self.objects
            .lock()
            .get(&object_key(resource, namespace, name))
            .cloned()
    }

    pub fn typed<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let resource = ApiResource::erase::<K>(&());
        self.object(&resource, namespace, name)
            .map(|o| from_dynamic(o).expect("stored object decodes"))
    }

    /// Overwrite `.status` as a controller on the server would
    pub fn set_status(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        status: Value,
    ) {
        let rv = self.next_resource_version();
        if let Some(object) = self
            .objects
            .lock()
            .get_mut(&object_key(resource, namespace, name))
        {
            object.data["status"] = status;
            object.metadata.resource_version = Some(rv);
        }
        self.notify(resource);
    }

    /// Drop an object outright, as an external actor would
    pub fn remove(&self, resource: &ApiResource, namespace: Option<&str>, name: &str) {
        self.objects
            .lock()
            .remove(&object_key(resource, namespace, name));
        self.notify(resource);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn clear_actions(&self) {
        self.actions.lock().clear();
    }

    fn next_resource_version(&self) -> String {
        self.resource_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn record(&self, verb: &'static str, resource: &ApiResource, namespace: Option<&str>, name: &str) {
        self.actions.lock().push(Action {
            verb,
            resource: resource.plural.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        });
    }

    fn sender(&self, resource: &ApiResource) -> broadcast::Sender<()> {
        self.channels
            .lock()
            .entry((resource.group.clone(), resource.plural.clone()))
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn notify(&self, resource: &ApiResource) {
        let _ = self.sender(resource).send(());
    }

    /// Store an updated object, bumping generation and finishing deletion
    fn store(
        &self,
        resource: &ApiResource,
        key: ObjectKey,
        previous: &DynamicObject,
        mut next: DynamicObject,
    ) -> DynamicObject {
        let generation = previous.metadata.generation.unwrap_or(1);
        next.metadata.generation = Some(if desired_state(previous) != desired_state(&next) {
            generation + 1
        } else {
            generation
        });
        next.metadata.resource_version = Some(self.next_resource_version());
        next.metadata.uid = previous.metadata.uid.clone();
        next.metadata.deletion_timestamp = previous.metadata.deletion_timestamp.clone();
        next = with_type_meta(next, resource);

        let finalized = next.metadata.deletion_timestamp.is_some()
            && next.metadata.finalizers.as_ref().map_or(true, Vec::is_empty);
        let mut objects = self.objects.lock();
        if finalized {
            objects.remove(&key);
        } else {
            objects.insert(key, next.clone());
        }
        next
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Operator config `cluster` with the given spec
pub fn operator_config(spec: StorageSpec) -> Storage {
    Storage {
        metadata: ObjectMeta {
            name: Some(OPERATOR_CONFIG_NAME.into()),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// Infrastructure `cluster`; `None` leaves `platformStatus` unset
pub fn infrastructure(platform: Option<PlatformType>) -> Infrastructure {
    Infrastructure {
        metadata: ObjectMeta {
            name: Some(CLUSTER_CONFIG_NAME.into()),
            ..Default::default()
        },
        spec: InfrastructureSpec::default(),
        status: Some(InfrastructureStatus {
            infrastructure_name: "test-cluster".into(),
            platform_status: platform.map(|r#type| PlatformStatus {
                r#type,
                azure: None,
            }),
            ..Default::default()
        }),
    }
}

/// FeatureGate `cluster` for `version` with the given enabled gates
pub fn feature_gate(version: &str, enabled: &[&str]) -> FeatureGate {
    FeatureGate {
        metadata: ObjectMeta {
            name: Some(CLUSTER_CONFIG_NAME.into()),
            ..Default::default()
        },
        spec: FeatureGateSpec::default(),
        status: Some(FeatureGateStatus {
            feature_gates: vec![FeatureGateDetails {
                version: version.into(),
                enabled: enabled
                    .iter()
                    .map(|name| FeatureGateAttributes {
                        name: name.to_string(),
                    })
                    .collect(),
                disabled: Vec::new(),
            }],
        }),
    }
}

#[async_trait]
impl ObjectReader for FakeCluster {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        Ok(self.object(resource, namespace, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|((group, plural, ns, _), _)| {
                *group == resource.group
                    && *plural == resource.plural
                    && namespace.map_or(true, |want| want == ns)
            })
            .map(|(_, o)| o.clone())
            .collect())
    }
}

#[async_trait]
impl ObjectWriter for FakeCluster {
    async fn create(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::Internal("create without a name".into()))?;
        let namespace = object.metadata.namespace.clone();
        let key = object_key(resource, namespace.as_deref(), &name);
        let rv = self.next_resource_version();

        let mut created = object.clone();
        created.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
        created.metadata.generation = Some(1);
        created.metadata.uid = Some(format!("uid-{rv}"));
        created.metadata.resource_version = Some(rv);
        {
            let mut objects = self.objects.lock();
            if objects.contains_key(&key) {
                return Err(Error::ResourceExists {
                    kind: resource.kind.clone(),
                    name,
                });
            }
            objects.insert(key, created.clone());
        }
        self.record("create", resource, namespace.as_deref(), &name);
        self.notify(resource);
        Ok(created)
    }

    async fn update(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::Internal("update without a name".into()))?;
        let namespace = object.metadata.namespace.clone();
        let key = object_key(resource, namespace.as_deref(), &name);
        let previous = self.objects.lock().get(&key).cloned().ok_or_else(|| {
            Error::ResourceNotFound {
                kind: resource.kind.clone(),
                name: name.clone(),
            }
        })?;
        if object.metadata.resource_version.is_some()
            && object.metadata.resource_version != previous.metadata.resource_version
        {
            return Err(Error::Conflict {
                kind: resource.kind.clone(),
                name,
            });
        }

        let mut next = object.clone();
        match previous.data.get("status") {
            Some(status) => next.data["status"] = status.clone(),
            None => {
                if let Value::Object(map) = &mut next.data {
                    map.remove("status");
                }
            }
        }
        let updated = self.store(resource, key, &previous, next);
        self.record("update", resource, namespace.as_deref(), &name);
        self.notify(resource);
        Ok(updated)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let key = object_key(resource, namespace, name);
        let rv = self.next_resource_version();
        {
            let mut objects = self.objects.lock();
            let Some(object) = objects.get_mut(&key) else {
                return Ok(());
            };
            let has_finalizers = object
                .metadata
                .finalizers
                .as_ref()
                .is_some_and(|f| !f.is_empty());
            if has_finalizers {
                object
                    .metadata
                    .deletion_timestamp
                    .get_or_insert_with(|| Time(chrono::Utc::now()));
                object.metadata.resource_version = Some(rv);
            } else {
                objects.remove(&key);
            }
        }
        self.record("delete", resource, namespace, name);
        self.notify(resource);
        Ok(())
    }

    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<DynamicObject> {
        let key = object_key(resource, namespace, name);
        let existing = self.objects.lock().get(&key).cloned();

        let previous = match existing {
            Some(previous) => previous,
            None if matches!(patch.kind, PatchKind::Apply { .. })
                && patch.subresource == Subresource::Main =>
            {
                let mut object: DynamicObject = serde_json::from_value(patch.body.clone())?;
                object.metadata.name = Some(name.to_string());
                object.metadata.namespace = namespace.map(str::to_string);
                let created = self.create(resource, &object).await?;
                return Ok(created);
            }
            None => {
                return Err(Error::ResourceNotFound {
                    kind: resource.kind.clone(),
                    name: name.to_string(),
                })
            }
        };

        let body = match patch.subresource {
            Subresource::Main => without_status(&patch.body),
            Subresource::Status => only_status(&patch.body),
        };
        let mut json = serde_json::to_value(&previous)?;
        match &patch.kind {
            PatchKind::Apply { .. } => apply_merge(&mut json, &body, ""),
            PatchKind::Merge => merge_patch(&mut json, &body),
        }
        let next: DynamicObject = serde_json::from_value(json)?;
        let patched = self.store(resource, key, &previous, next);
        self.record("patch", resource, namespace, name);
        self.notify(resource);
        Ok(patched)
    }
}

#[async_trait]
impl InformerFactory for FakeCluster {
    fn informer(&self, resource: &ApiResource, namespace: Option<&str>) -> Informer {
        Informer::new(
            resource.clone(),
            namespace.map(str::to_string),
            self.sender(resource),
        )
    }

    fn start(&self, _cancel: CancellationToken) {}

    async fn wait_for_sync(&self, _timeout: Duration) -> bool {
        true
    }
}

#[async_trait]
impl RestMapper for FakeCluster {
    async fn resource_for(&self, gvk: &GroupVersionKind) -> Result<ApiResource> {
        self.kinds
            .lock()
            .get(&gvk_key(gvk))
            .cloned()
            .ok_or_else(|| Error::NoMatch {
                group: gvk.group.clone(),
                version: gvk.version.clone(),
                kind: gvk.kind.clone(),
            })
    }

    fn reset(&self) {
        self.mapper_resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::resources;
    use k8s_openapi::api::core::v1::ConfigMap;
    use serde_json::json;

    fn config_map(name: &str) -> DynamicObject {
        to_dynamic(&ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("ns".into()),
                ..Default::default()
            },
            data: Some([("k".to_string(), "v".to_string())].into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generation_bumps_on_spec_change_only() {
        let cluster = FakeCluster::new();
        let ar = resources::config_maps();
        let created = cluster.create(&ar, &config_map("a")).await.unwrap();
        assert_eq!(created.metadata.generation, Some(1));

        let mut same = created.clone();
        same.metadata.labels = Some([("x".to_string(), "y".to_string())].into());
        let updated = cluster.update(&ar, &same).await.unwrap();
        assert_eq!(updated.metadata.generation, Some(1));

        let mut changed = updated.clone();
        changed.data["data"]["k"] = json!("w");
        let updated = cluster.update(&ar, &changed).await.unwrap();
        assert_eq!(updated.metadata.generation, Some(2));

        let stale = cluster.update(&ar, &changed).await.unwrap_err();
        assert!(matches!(stale, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_honours_finalizers() {
        let cluster = FakeCluster::new();
        let ar = resources::config_maps();
        let mut cm = config_map("a");
        cm.metadata.finalizers = Some(vec!["keep".into()]);
        cluster.create(&ar, &cm).await.unwrap();

        cluster.delete(&ar, Some("ns"), "a").await.unwrap();
        let pending = cluster.object(&ar, Some("ns"), "a").unwrap();
        assert!(pending.metadata.deletion_timestamp.is_some());

        let mut cleared = pending.clone();
        cleared.metadata.finalizers = None;
        cluster.update(&ar, &cleared).await.unwrap();
        assert!(cluster.object(&ar, Some("ns"), "a").is_none());
    }

    #[tokio::test]
    async fn test_apply_merges_conditions_by_type() {
        let cluster = FakeCluster::new();
        let ar = resources::config_maps();
        cluster.create(&ar, &config_map("a")).await.unwrap();

        for condition in ["ADegraded", "BDegraded", "ADegraded"] {
            let body = json!({"status": {"conditions": [{"type": condition, "status": "True"}]}});
            cluster
                .patch(&ar, Some("ns"), "a", &ObjectPatch::apply("m", Subresource::Status, body))
                .await
                .unwrap();
        }
        let object = cluster.object(&ar, Some("ns"), "a").unwrap();
        assert_eq!(object.data["status"]["conditions"].as_array().unwrap().len(), 2);
        assert_eq!(object.metadata.generation, Some(1));
    }

    #[tokio::test]
    async fn test_informer_notified_on_write() {
        let cluster = FakeCluster::new();
        let ar = resources::config_maps();
        let mut rx = cluster.informer(&ar, Some("ns")).subscribe();
        cluster.create(&ar, &config_map("a")).await.unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_mapper_no_match() {
        let cluster = FakeCluster::new();
        assert!(cluster.resource_for(&subscription_gvk()).await.is_ok());
        cluster.unregister_kind(&subscription_gvk());
        let err = cluster.resource_for(&subscription_gvk()).await.unwrap_err();
        assert!(err.is_no_match());
    }
}
