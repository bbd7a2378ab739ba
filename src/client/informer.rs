//! Shared informers backed by kube-rs reflectors
//!
//! Every registered (resource, namespace) pair gets one watch, one reflector
//! store and one broadcast channel. Controllers read from the stores and
//! subscribe to the channel; nothing here ever writes.

use crate::client::live::KubeStore;
use crate::domain::ports::{Informer, InformerFactory, ObjectReader};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broadcast capacity per informer; lagging receivers still get a tick
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct InformerKey {
    group: String,
    version: String,
    plural: String,
    namespace: Option<String>,
}

impl InformerKey {
    fn new(resource: &ApiResource, namespace: Option<&str>) -> Self {
        Self {
            group: resource.group.clone(),
            version: resource.version.clone(),
            plural: resource.plural.clone(),
            namespace: namespace.map(str::to_string),
        }
    }
}

struct Entry {
    informer: Informer,
    store: Store<DynamicObject>,
    /// Taken when the watch is spawned
    writer: Mutex<Option<Writer<DynamicObject>>>,
}

/// Informer factory and cache reader for one cluster
pub struct KubeInformers {
    client: Client,
    live: KubeStore,
    entries: DashMap<InformerKey, std::sync::Arc<Entry>>,
    started: Mutex<Option<CancellationToken>>,
}

impl KubeInformers {
    pub fn new(client: Client) -> Self {
        Self {
            live: KubeStore::new(client.clone()),
            client,
            entries: DashMap::new(),
            started: Mutex::new(None),
        }
    }

    fn spawn_watch(&self, key: &InformerKey, entry: &Entry, cancel: CancellationToken) {
        let Some(writer) = entry.writer.lock().take() else {
            return;
        };
        let resource = entry.informer.resource().clone();
        let api: Api<DynamicObject> = match &key.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };
        let events = entry.informer.clone();
        let kind = resource.kind.clone();
        let namespace = key.namespace.clone();

        tokio::spawn(async move {
            let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()))
                .default_backoff();
            futures::pin_mut!(stream);
            debug!(%kind, ?namespace, "Informer watch started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = stream.next() => match event {
                        Some(Ok(_)) => events.notify(),
                        Some(Err(e)) => warn!(%kind, ?namespace, error = %e, "Watch error"),
                        None => break,
                    }
                }
            }
            debug!(%kind, ?namespace, "Informer watch stopped");
        });
    }

    fn lookup(&self, resource: &ApiResource, namespace: Option<&str>) -> Option<std::sync::Arc<Entry>> {
        self.entries
            .get(&InformerKey::new(resource, namespace))
            .or_else(|| {
                namespace.and_then(|_| self.entries.get(&InformerKey::new(resource, None)))
            })
            .map(|e| e.value().clone())
    }
}

#[async_trait]
impl InformerFactory for KubeInformers {
    fn informer(&self, resource: &ApiResource, namespace: Option<&str>) -> Informer {
        let key = InformerKey::new(resource, namespace);
        if let Some(existing) = self.entries.get(&key) {
            return existing.informer.clone();
        }

        let writer = Writer::new(resource.clone());
        let store = writer.as_reader();
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let entry = std::sync::Arc::new(Entry {
            informer: Informer::new(resource.clone(), namespace.map(str::to_string), tx),
            store,
            writer: Mutex::new(Some(writer)),
        });
        let entry = self.entries.entry(key.clone()).or_insert(entry).value().clone();

        if let Some(cancel) = self.started.lock().clone() {
            self.spawn_watch(&key, &entry, cancel);
        }
        entry.informer.clone()
    }

    fn start(&self, cancel: CancellationToken) {
        *self.started.lock() = Some(cancel.clone());
        for entry in self.entries.iter() {
            self.spawn_watch(entry.key(), entry.value(), cancel.clone());
        }
        info!(count = self.entries.len(), "Started informers");
    }

    async fn wait_for_sync(&self, timeout: Duration) -> bool {
        let stores: Vec<Store<DynamicObject>> =
            self.entries.iter().map(|e| e.value().store.clone()).collect();
        let all = futures::future::join_all(stores.iter().map(|s| s.wait_until_ready()));
        tokio::time::timeout(timeout, all).await.is_ok()
    }
}

#[async_trait]
impl ObjectReader for KubeInformers {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let Some(entry) = self.lookup(resource, namespace) else {
            debug!(kind = %resource.kind, %name, "No informer registered, reading live");
            return self.live.get(resource, namespace, name).await;
        };
        let mut object_ref = ObjectRef::new_with(name, resource.clone());
        if let Some(ns) = namespace {
            object_ref = object_ref.within(ns);
        }
        Ok(entry.store.get(&object_ref).map(|o| (*o).clone()))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let Some(entry) = self.lookup(resource, namespace) else {
            debug!(kind = %resource.kind, "No informer registered, listing live");
            return self.live.list(resource, namespace).await;
        };
        Ok(entry
            .store
            .state()
            .into_iter()
            .filter(|o| namespace.is_none() || o.metadata.namespace.as_deref() == namespace)
            .map(|o| (*o).clone())
            .collect())
    }
}
