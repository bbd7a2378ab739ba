//! Domain Ports - Core trait definitions for the storage operator
//!
//! These traits define the boundary between the controllers and the remote
//! object store. Production adapters live in [`crate::client`]; tests use the
//! in-memory fake cluster.

use crate::error::Result;
use async_trait::async_trait;
use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Patch Types
// =============================================================================

/// How a patch body is interpreted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchKind {
    /// Server-side apply owned by `field_manager`
    Apply { field_manager: String },
    /// RFC 7386 JSON merge patch
    Merge,
}

/// Which part of the object a patch addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subresource {
    Main,
    Status,
}

/// A patch against a single object
#[derive(Debug, Clone)]
pub struct ObjectPatch {
    pub kind: PatchKind,
    pub subresource: Subresource,
    pub body: Value,
}

impl ObjectPatch {
    pub fn apply(field_manager: impl Into<String>, subresource: Subresource, body: Value) -> Self {
        Self {
            kind: PatchKind::Apply {
                field_manager: field_manager.into(),
            },
            subresource,
            body,
        }
    }

    pub fn merge(body: Value) -> Self {
        Self {
            kind: PatchKind::Merge,
            subresource: Subresource::Main,
            body,
        }
    }
}

// =============================================================================
// Object Store Ports
// =============================================================================

/// Read access to objects, served from a cache or from the API server
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Get a single object; `Ok(None)` when it does not exist
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    /// List objects, across all namespaces when `namespace` is `None`
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;
}

/// Write access to objects
#[async_trait]
pub trait ObjectWriter: Send + Sync {
    async fn create(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject>;

    /// Replace an object; the object's resourceVersion guards against lost updates
    async fn update(&self, resource: &ApiResource, object: &DynamicObject) -> Result<DynamicObject>;

    /// Request deletion; objects with finalizers linger until those are removed
    async fn delete(&self, resource: &ApiResource, namespace: Option<&str>, name: &str)
        -> Result<()>;

    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &ObjectPatch,
    ) -> Result<DynamicObject>;
}

/// Full CRUD access
pub trait ObjectStore: ObjectReader + ObjectWriter {}

impl<T: ObjectReader + ObjectWriter> ObjectStore for T {}

// =============================================================================
// Informer Port
// =============================================================================

/// Handle on a shared informer: a cache registration plus change notifications
#[derive(Clone, Debug)]
pub struct Informer {
    resource: ApiResource,
    namespace: Option<String>,
    events: broadcast::Sender<()>,
}

impl Informer {
    pub fn new(
        resource: ApiResource,
        namespace: Option<String>,
        events: broadcast::Sender<()>,
    ) -> Self {
        Self {
            resource,
            namespace,
            events,
        }
    }

    pub fn resource(&self) -> &ApiResource {
        &self.resource
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Receive a tick for every add/update/delete observed by the informer
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.events.subscribe()
    }

    /// Signal a change to every subscriber
    pub fn notify(&self) {
        // No receivers simply means no controller listens yet.
        let _ = self.events.send(());
    }
}

/// Registers shared informers; the same resource/namespace yields the same informer
#[async_trait]
pub trait InformerFactory: Send + Sync {
    fn informer(&self, resource: &ApiResource, namespace: Option<&str>) -> Informer;

    /// Start every registered informer; later registrations start immediately
    fn start(&self, cancel: CancellationToken);

    /// Wait for the initial list of every started informer, false on timeout
    async fn wait_for_sync(&self, timeout: Duration) -> bool;
}

// =============================================================================
// REST Mapper Port
// =============================================================================

/// Resolves kinds whose schema is only known at runtime
#[async_trait]
pub trait RestMapper: Send + Sync {
    /// Resolve a kind to its resource; `Error::NoMatch` when the server does not serve it
    async fn resource_for(&self, gvk: &GroupVersionKind) -> Result<ApiResource>;

    /// Drop every cached mapping
    fn reset(&self);
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ObjectReaderRef = Arc<dyn ObjectReader>;
pub type ObjectStoreRef = Arc<dyn ObjectStore>;
pub type InformerFactoryRef = Arc<dyn InformerFactory>;
pub type RestMapperRef = Arc<dyn RestMapper>;
