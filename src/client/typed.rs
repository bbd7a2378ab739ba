//! Typed access over the dynamic ports
//!
//! The ports move `DynamicObject`s; these helpers convert to and from the
//! k8s-openapi and CRD types the controllers work with.

use crate::domain::ports::{ObjectReader, ObjectWriter};
use crate::error::Result;
use kube::api::{DynamicObject, TypeMeta};
use kube::discovery::ApiResource;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Convert a typed object into a `DynamicObject`
pub fn to_dynamic<K: Serialize>(object: &K) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Convert a `DynamicObject` into a typed object
pub fn from_dynamic<K: DeserializeOwned>(object: DynamicObject) -> Result<K> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// List responses omit the type meta of their items; restore it
pub fn with_type_meta(mut object: DynamicObject, resource: &ApiResource) -> DynamicObject {
    if object.types.is_none() {
        object.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
    }
    object
}

/// Get a typed object from a reader
pub async fn get_typed<K>(
    reader: &(impl ObjectReader + ?Sized),
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let resource = ApiResource::erase::<K>(&());
    match reader.get(&resource, namespace, name).await? {
        Some(object) => Ok(Some(from_dynamic(with_type_meta(object, &resource))?)),
        None => Ok(None),
    }
}

/// List typed objects from a reader
pub async fn list_typed<K>(
    reader: &(impl ObjectReader + ?Sized),
    namespace: Option<&str>,
) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let resource = ApiResource::erase::<K>(&());
    reader
        .list(&resource, namespace)
        .await?
        .into_iter()
        .map(|o| from_dynamic(with_type_meta(o, &resource)))
        .collect()
}

/// Create a typed object
pub async fn create_typed<K>(writer: &(impl ObjectWriter + ?Sized), object: &K) -> Result<K>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    let resource = ApiResource::erase::<K>(&());
    let created = writer.create(&resource, &to_dynamic(object)?).await?;
    from_dynamic(with_type_meta(created, &resource))
}

/// Replace a typed object
pub async fn update_typed<K>(writer: &(impl ObjectWriter + ?Sized), object: &K) -> Result<K>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    let resource = ApiResource::erase::<K>(&());
    let updated = writer.update(&resource, &to_dynamic(object)?).await?;
    from_dynamic(with_type_meta(updated, &resource))
}
