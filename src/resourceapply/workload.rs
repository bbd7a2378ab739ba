//! Spec-hash applies for Deployments and driver CRs
//!
//! The rendered spec is hashed into an annotation. The live object is
//! rewritten when that hash differs or when its generation no longer matches
//! the one recorded in the operator status, which catches edits made by
//! anyone else.

use super::ApplyResult;
use crate::domain::ports::ObjectStore;
use crate::error::Result;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

pub const SPEC_HASH_ANNOTATION: &str = "operator.openshift.io/spec-hash";

/// Hex SHA-256 of the serialized value
pub fn spec_hash(spec: &Value) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(spec)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Apply `desired` guarded by the spec hash and the expected generation
pub async fn apply_with_spec_hash(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    desired: &DynamicObject,
    expected_generation: Option<i64>,
) -> Result<ApplyResult> {
    let mut desired = desired.clone();
    let hash = spec_hash(desired.data.get("spec").unwrap_or(&Value::Null))?;
    desired
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(SPEC_HASH_ANNOTATION.to_string(), hash.clone());

    let name = desired.metadata.name.clone().unwrap_or_default();
    let namespace = desired.metadata.namespace.clone();
    let Some(existing) = store.get(resource, namespace.as_deref(), &name).await? else {
        info!(kind = %resource.kind, %name, "Creating object");
        let object = store.create(resource, &desired).await?;
        return Ok(ApplyResult {
            object,
            modified: true,
        });
    };

    let live_hash = existing
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(SPEC_HASH_ANNOTATION));
    let generation_matches =
        expected_generation.map_or(true, |g| existing.metadata.generation == Some(g));
    if live_hash == Some(&hash) && generation_matches {
        return Ok(ApplyResult {
            object: existing,
            modified: false,
        });
    }

    let mut updated = existing.clone();
    let labels = updated.metadata.labels.get_or_insert_with(Default::default);
    labels.extend(desired.metadata.labels.clone().unwrap_or_default());
    let annotations = updated
        .metadata
        .annotations
        .get_or_insert_with(Default::default);
    annotations.extend(desired.metadata.annotations.clone().unwrap_or_default());
    if let Value::Object(fields) = &desired.data {
        for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "status") {
            updated.data[key.as_str()] = value.clone();
        }
    }

    info!(
        kind = %resource.kind,
        %name,
        hash_changed = live_hash != Some(&hash),
        "Updating object"
    );
    let object = store.update(resource, &updated).await?;
    Ok(ApplyResult {
        object,
        modified: true,
    })
}
