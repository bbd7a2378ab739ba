//! Live kube-rs adapter for the object store ports

use crate::client::typed::with_type_meta;
use crate::domain::ports::{ObjectPatch, ObjectReader, ObjectWriter, PatchKind, Subresource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::{debug, trace};

/// Live access to the API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

fn object_name(resource: &ApiResource, object: &DynamicObject) -> Result<String> {
    object.metadata.name.clone().ok_or_else(|| {
        Error::Internal(format!("{} object without metadata.name", resource.kind))
    })
}

fn map_write_error(resource: &ApiResource, name: &str, err: kube::Error) -> Error {
    match &err {
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            Error::ResourceExists {
                kind: resource.kind.clone(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => Error::Conflict {
            kind: resource.kind.clone(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 404 => Error::ResourceNotFound {
            kind: resource.kind.clone(),
            name: name.to_string(),
        },
        _ => Error::Kube(err),
    }
}

#[async_trait]
impl ObjectReader for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        trace!(kind = %resource.kind, ?namespace, %name, "GET");
        let object = self.api(resource, namespace).get_opt(name).await?;
        Ok(object.map(|o| with_type_meta(o, resource)))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        trace!(kind = %resource.kind, ?namespace, "LIST");
        let list = self
            .api(resource, namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list
            .items
            .into_iter()
            .map(|o| with_type_meta(o, resource))
            .collect())
    }
}

#[async_trait]
impl ObjectWriter for KubeStore {
    async fn create(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object_name(resource, object)?;
        debug!(kind = %resource.kind, namespace = ?object.metadata.namespace, %name, "Creating object");
        self.api(resource, object.metadata.namespace.as_deref())
            .create(&PostParams::default(), object)
            .await
            .map(|o| with_type_meta(o, resource))
            .map_err(|e| map_write_error(resource, &name, e))
    }

    async fn update(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject> {
        let name = object_name(resource, object)?;
        debug!(kind = %resource.kind, namespace = ?object.metadata.namespace, %name, "Updating object");
        self.api(resource, object.metadata.namespace.as_deref())
            .replace(&name, &PostParams::default(), object)
            .await
            .map(|o| with_type_meta(o, resource))
            .map_err(|e| map_write_error(resource, &name, e))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        debug!(kind = %resource.kind, ?namespace, %name, "Deleting object");
        match self
            .api(resource, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(map_write_error(resource, name, e)),
        }
    }

    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<DynamicObject> {
        let api = self.api(resource, namespace);
        let (params, body) = match &patch.kind {
            PatchKind::Apply { field_manager } => (
                PatchParams::apply(field_manager).force(),
                Patch::Apply(&patch.body),
            ),
            PatchKind::Merge => (PatchParams::default(), Patch::Merge(&patch.body)),
        };
        debug!(kind = %resource.kind, ?namespace, %name, subresource = ?patch.subresource, "Patching object");
        let result = match patch.subresource {
            Subresource::Main => api.patch(name, &params, &body).await,
            Subresource::Status => api.patch_status(name, &params, &body).await,
        };
        result
            .map(|o| with_type_meta(o, resource))
            .map_err(|e| map_write_error(resource, name, e))
    }
}
