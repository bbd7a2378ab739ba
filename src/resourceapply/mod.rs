//! Idempotent applies of operand objects
//!
//! Every apply reads the live object first and writes only when the desired
//! state is not already present. Objects without a stable spec (RBAC, service
//! accounts, services, monitoring objects) are compared field by field.
//! Workloads and driver CRs carry a hash of their rendered spec instead.

pub mod generation;
pub mod merge;
pub mod progress;
pub mod storageclass;
pub mod workload;

use crate::client::resources;
use crate::domain::ports::{ObjectStore, RestMapper};
use crate::error::Result;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use merge::{is_subset, merge_patch};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub use generation::generation_of;
pub use progress::{deployment_progress, DeploymentProgress};
pub use storageclass::apply_storage_class;
pub use workload::{apply_with_spec_hash, spec_hash, SPEC_HASH_ANNOTATION};

/// Outcome of an apply
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// The object as stored after the apply
    pub object: DynamicObject,
    /// Whether a write happened
    pub modified: bool,
}

/// Merge `desired` into `existing`; returns whether anything changed
fn merge_string_map(
    existing: &mut Option<BTreeMap<String, String>>,
    desired: &Option<BTreeMap<String, String>>,
) -> bool {
    let Some(desired) = desired else {
        return false;
    };
    let target = existing.get_or_insert_with(BTreeMap::new);
    let mut modified = false;
    for (key, value) in desired {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            modified = true;
        }
    }
    modified
}

/// Create `desired` when absent, otherwise merge it over the live object.
///
/// Labels and annotations are merged key by key. Every top-level field of
/// `desired` except `status` is merge-patched over the live field when it
/// is not already a subset of it.
pub async fn apply_object(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    desired: &DynamicObject,
) -> Result<ApplyResult> {
    let name = desired.metadata.name.as_deref().unwrap_or_default();
    let namespace = desired.metadata.namespace.as_deref();

    let Some(existing) = store.get(resource, namespace, name).await? else {
        info!(kind = %resource.kind, %name, namespace = namespace.unwrap_or_default(), "Creating object");
        let object = store.create(resource, desired).await?;
        return Ok(ApplyResult {
            object,
            modified: true,
        });
    };

    let mut merged = existing.clone();
    let mut modified = merge_string_map(&mut merged.metadata.labels, &desired.metadata.labels);
    modified |= merge_string_map(
        &mut merged.metadata.annotations,
        &desired.metadata.annotations,
    );

    if let Value::Object(fields) = &desired.data {
        for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "status") {
            let current = merged.data.get(key).cloned().unwrap_or(Value::Null);
            if !is_subset(value, &current) {
                let mut next = current;
                merge_patch(&mut next, value);
                merged.data[key.as_str()] = next;
                modified = true;
            }
        }
    }

    if !modified {
        debug!(kind = %resource.kind, %name, "Object up to date");
        return Ok(ApplyResult {
            object: existing,
            modified: false,
        });
    }

    info!(kind = %resource.kind, %name, namespace = namespace.unwrap_or_default(), "Updating object");
    let object = store.update(resource, &merged).await?;
    Ok(ApplyResult {
        object,
        modified: true,
    })
}

/// Apply an object of any kind, resolving its resource through the REST mapper.
///
/// A missing mapping resets the mapper so the next attempt rediscovers.
pub async fn apply_dynamic(
    store: &dyn ObjectStore,
    mapper: &dyn RestMapper,
    desired: &DynamicObject,
) -> Result<ApplyResult> {
    let gvk = resources::gvk_of(desired)?;
    let resource = match resources::resolve(mapper, &gvk).await {
        Ok(resource) => resource,
        Err(e) => {
            if e.is_no_match() {
                mapper.reset();
            }
            return Err(e);
        }
    };
    apply_object(store, &resource, desired).await
}
