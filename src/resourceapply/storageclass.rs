//! StorageClass apply
//!
//! Rendered annotations only seed a new class. Once the class exists its
//! annotations belong to the administrator, so a dropped default-class
//! annotation stays dropped.
//! Provisioner, parameters, reclaim policy and binding mode are immutable;
//! a divergence there recreates the class.

use crate::client::typed::{create_typed, get_typed, update_typed};
use crate::domain::ports::ObjectStore;
use crate::error::Result;
use k8s_openapi::api::storage::v1::StorageClass;
use tracing::info;

fn immutable_fields_differ(existing: &StorageClass, desired: &StorageClass) -> bool {
    existing.provisioner != desired.provisioner
        || existing.parameters != desired.parameters
        || existing.reclaim_policy != desired.reclaim_policy
        || existing.volume_binding_mode != desired.volume_binding_mode
}

/// Apply a StorageClass; returns the stored class and whether it was written
pub async fn apply_storage_class(
    store: &dyn ObjectStore,
    desired: &StorageClass,
) -> Result<(StorageClass, bool)> {
    let name = desired.metadata.name.as_deref().unwrap_or_default();
    let Some(existing) = get_typed::<StorageClass>(store, None, name).await? else {
        info!(storage_class = %name, "Creating StorageClass");
        return Ok((create_typed(store, desired).await?, true));
    };

    let mut required = desired.clone();
    required.metadata.annotations = existing.metadata.annotations.clone();

    if immutable_fields_differ(&existing, &required) {
        info!(storage_class = %name, "Recreating StorageClass with changed immutable fields");
        store
            .delete(&crate::client::resources::storage_classes(), None, name)
            .await?;
        required.metadata.resource_version = None;
        required.metadata.uid = None;
        return Ok((create_typed(store, &required).await?, true));
    }

    let mut labels = existing.metadata.labels.clone().unwrap_or_default();
    labels.extend(required.metadata.labels.clone().unwrap_or_default());
    let unchanged = existing.metadata.annotations == required.metadata.annotations
        && existing.metadata.labels.clone().unwrap_or_default() == labels
        && existing.allow_volume_expansion == required.allow_volume_expansion
        && existing.mount_options == required.mount_options
        && existing.allowed_topologies == required.allowed_topologies;
    if unchanged {
        return Ok((existing, false));
    }

    let mut updated = existing;
    updated.metadata.annotations = required.metadata.annotations;
    updated.metadata.labels = Some(labels).filter(|l| !l.is_empty());
    updated.allow_volume_expansion = required.allow_volume_expansion;
    updated.mount_options = required.mount_options;
    updated.allowed_topologies = required.allowed_topologies;
    info!(storage_class = %name, "Updating StorageClass");
    Ok((update_typed(store, &updated).await?, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeCluster;
    use kube::api::ObjectMeta;

    const DEFAULT_CLASS: &str = "storageclass.kubernetes.io/is-default-class";

    fn thin(disk_format: &str) -> StorageClass {
        StorageClass {
            metadata: ObjectMeta {
                name: Some("thin".into()),
                annotations: Some([(DEFAULT_CLASS.to_string(), "true".to_string())].into()),
                ..Default::default()
            },
            provisioner: "kubernetes.io/vsphere-volume".into(),
            parameters: Some([("diskformat".to_string(), disk_format.to_string())].into()),
            reclaim_policy: Some("Delete".into()),
            volume_binding_mode: Some("Immediate".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_noop() {
        let cluster = FakeCluster::new();
        let (_, created) = apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        assert!(created);
        let (_, again) = apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        assert!(!again);
    }

    #[tokio::test]
    async fn test_user_annotation_change_sticks() {
        let cluster = FakeCluster::new();
        apply_storage_class(&*cluster, &thin("thin")).await.unwrap();

        let mut live = cluster.typed::<StorageClass>(None, "thin").unwrap();
        live.metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert(DEFAULT_CLASS.into(), "false".into());
        update_typed(&*cluster, &live).await.unwrap();

        let (stored, modified) = apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        assert!(!modified);
        assert_eq!(stored.metadata.annotations.unwrap()[DEFAULT_CLASS], "false");
    }

    #[tokio::test]
    async fn test_user_removed_default_annotation_stays_removed() {
        let cluster = FakeCluster::new();
        apply_storage_class(&*cluster, &thin("thin")).await.unwrap();

        let mut live = cluster.typed::<StorageClass>(None, "thin").unwrap();
        live.metadata.annotations.as_mut().unwrap().remove(DEFAULT_CLASS);
        update_typed(&*cluster, &live).await.unwrap();

        let (stored, modified) = apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        assert!(!modified);
        assert!(!stored
            .metadata
            .annotations
            .unwrap_or_default()
            .contains_key(DEFAULT_CLASS));
        let live = cluster.typed::<StorageClass>(None, "thin").unwrap();
        assert!(!live
            .metadata
            .annotations
            .unwrap_or_default()
            .contains_key(DEFAULT_CLASS));
    }

    #[tokio::test]
    async fn test_immutable_change_recreates() {
        let cluster = FakeCluster::new();
        apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        cluster.clear_actions();

        let (stored, modified) = apply_storage_class(&*cluster, &thin("zeroedthick"))
            .await
            .unwrap();
        assert!(modified);
        assert_eq!(stored.parameters.unwrap()["diskformat"], "zeroedthick");
        let verbs: Vec<_> = cluster.actions().iter().map(|a| a.verb).collect();
        assert_eq!(verbs, vec!["delete", "create"]);
    }

    #[tokio::test]
    async fn test_mutable_change_updates() {
        let cluster = FakeCluster::new();
        apply_storage_class(&*cluster, &thin("thin")).await.unwrap();
        let mut desired = thin("thin");
        desired.allow_volume_expansion = Some(true);

        let (stored, modified) = apply_storage_class(&*cluster, &desired).await.unwrap();
        assert!(modified);
        assert_eq!(stored.allow_volume_expansion, Some(true));
    }
}
