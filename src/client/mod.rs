//! Client & informer plane
//!
//! A [`ClientSet`] bundles everything a controller needs to talk to one
//! cluster: live reads and writes, cached reads, the shared informer factory
//! and the REST mapper. Standalone mode uses one bundle; hosted control plane
//! mode uses a guest bundle and a management bundle with the same contracts.

#[cfg(test)]
pub mod fake;
pub mod informer;
pub mod live;
pub mod resources;
pub mod restmapper;
pub mod typed;

use crate::domain::ports::{InformerFactoryRef, ObjectReaderRef, ObjectStoreRef, RestMapperRef};
use std::sync::Arc;

pub use informer::KubeInformers;
pub use live::KubeStore;
pub use restmapper::DiscoveryRestMapper;

/// Ports for a single cluster
#[derive(Clone)]
pub struct ClientSet {
    /// Live reads and all writes
    pub store: ObjectStoreRef,
    /// Reads served from the informer caches
    pub cache: ObjectReaderRef,
    pub informers: InformerFactoryRef,
    pub mapper: RestMapperRef,
}

impl ClientSet {
    pub fn new(
        store: ObjectStoreRef,
        cache: ObjectReaderRef,
        informers: InformerFactoryRef,
        mapper: RestMapperRef,
    ) -> Self {
        Self {
            store,
            cache,
            informers,
            mapper,
        }
    }

    /// Build the kube-rs backed bundle for a client
    pub fn from_client(client: kube::Client) -> Self {
        let informers = Arc::new(KubeInformers::new(client.clone()));
        Self {
            store: Arc::new(KubeStore::new(client.clone())),
            cache: informers.clone(),
            informers,
            mapper: Arc::new(DiscoveryRestMapper::new(client)),
        }
    }
}

impl std::fmt::Debug for ClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSet").finish_non_exhaustive()
    }
}
