//! Leader election using Kubernetes Leases
//!
//! A single `coordination.k8s.io/v1` Lease in the operator namespace decides
//! which replica runs the controllers. Writes carry the lease's
//! resourceVersion, so a concurrent change fails with 409 Conflict instead of
//! producing two leaders.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name of the lease guarding the operator
pub const LEASE_NAME: &str = "cluster-storage-operator-lock";

const LEASE_DURATION: Duration = Duration::from_secs(137);
const RENEW_INTERVAL: Duration = Duration::from_secs(26);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What a replica observes when it reads the lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseState {
    Absent,
    HeldByUs,
    /// Another holder stopped renewing
    Expired { transitions: i32 },
    HeldByOther(String),
}

/// Classify `lease` from the point of view of `identity` at `now`
pub fn lease_state(lease: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> LeaseState {
    let Some(lease) = lease else {
        return LeaseState::Absent;
    };
    let spec = lease.spec.as_ref();
    let holder = spec
        .and_then(|s| s.holder_identity.clone())
        .unwrap_or_default();
    if holder == identity {
        return LeaseState::HeldByUs;
    }
    let transitions = spec.and_then(|s| s.lease_transitions).unwrap_or(0);
    if holder.is_empty() {
        return LeaseState::Expired { transitions };
    }
    let renewed = spec.and_then(|s| s.renew_time.as_ref());
    let duration = spec.and_then(|s| s.lease_duration_seconds);
    match (renewed, duration) {
        (Some(renewed), Some(duration))
            if now <= renewed.0 + chrono::Duration::seconds(i64::from(duration)) =>
        {
            LeaseState::HeldByOther(holder)
        }
        _ => LeaseState::Expired { transitions },
    }
}

fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(e) if e.code == 409)
}

pub struct LeaderElector {
    client: Client,
    namespace: String,
    identity: String,
    lease_duration: Duration,
    renew_interval: Duration,
    retry_interval: Duration,
}

impl LeaderElector {
    pub fn new(client: Client, namespace: &str, identity: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            identity: identity.to_string(),
            lease_duration: LEASE_DURATION,
            renew_interval: RENEW_INTERVAL,
            retry_interval: RETRY_INTERVAL,
        }
    }

    /// Identity of this replica: `POD_NAME`, falling back to the host name
    pub fn default_identity() -> String {
        std::env::var("POD_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| format!("{}-{}", LEASE_NAME, std::process::id()))
    }

    fn api(&self) -> Api<Lease> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Block until the lease is ours; `None` when `cancel` fires first
    pub async fn acquire(
        self: Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<Option<LeaderGuard>> {
        info!(identity = %self.identity, lease = LEASE_NAME, "Waiting for leadership");
        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Leadership acquired");
                    let lost = CancellationToken::new();
                    let elector = Arc::clone(&self);
                    let signal = lost.clone();
                    let renewal = tokio::spawn(async move { elector.renewal_loop(signal).await });
                    return Ok(Some(LeaderGuard { lost, renewal }));
                }
                Ok(false) => debug!(identity = %self.identity, "Lease held by another replica"),
                Err(e) => warn!(identity = %self.identity, error = %e, "Failed to acquire lease"),
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    async fn try_acquire_or_renew(&self) -> Result<bool> {
        let api = self.api();
        let now = Utc::now();
        let existing = match api.get(LEASE_NAME).await {
            Ok(lease) => Some(lease),
            Err(kube::Error::Api(e)) if e.code == 404 => None,
            Err(e) => return Err(e.into()),
        };

        let written = match lease_state(existing.as_ref(), &self.identity, now) {
            LeaseState::HeldByOther(holder) => {
                debug!(%holder, "Lease is current");
                return Ok(false);
            }
            LeaseState::Absent => {
                api.create(&PostParams::default(), &self.lease(None, now, 0))
                    .await
            }
            LeaseState::HeldByUs => {
                let mut renewed = existing.unwrap_or_default();
                if let Some(spec) = renewed.spec.as_mut() {
                    spec.renew_time = Some(MicroTime(now));
                }
                api.replace(LEASE_NAME, &PostParams::default(), &renewed)
                    .await
            }
            LeaseState::Expired { transitions } => {
                let version = existing.and_then(|l| l.metadata.resource_version);
                api.replace(
                    LEASE_NAME,
                    &PostParams::default(),
                    &self.lease(version, now, transitions + 1),
                )
                .await
            }
        };
        match written {
            Ok(_) => Ok(true),
            Err(e) if is_conflict(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn lease(&self, resource_version: Option<String>, now: DateTime<Utc>, transitions: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(LEASE_NAME.to_string()),
                namespace: Some(self.namespace.clone()),
                resource_version,
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(transitions),
                ..Default::default()
            }),
        }
    }

    async fn renewal_loop(&self, lost: CancellationToken) {
        loop {
            tokio::time::sleep(self.renew_interval).await;
            match self.try_acquire_or_renew().await {
                Ok(true) => debug!(identity = %self.identity, "Lease renewed"),
                Ok(false) => {
                    warn!(identity = %self.identity, "Lease taken by another replica");
                    lost.cancel();
                    return;
                }
                Err(e) => {
                    warn!(identity = %self.identity, error = %e, "Failed to renew lease");
                    lost.cancel();
                    return;
                }
            }
        }
    }
}

/// Held leadership; renewal stops when the guard is dropped
pub struct LeaderGuard {
    lost: CancellationToken,
    renewal: JoinHandle<()>,
}

impl LeaderGuard {
    /// Resolves once the lease could not be renewed
    pub async fn lost(&self) {
        self.lost.cancelled().await
    }

    /// Cancel `root` when leadership is lost; the returned error names the cause
    pub async fn guard(self, root: CancellationToken) -> Result<()> {
        tokio::select! {
            _ = self.lost() => {
                root.cancel();
                Err(Error::LeadershipLost)
            }
            _ = root.cancelled() => Ok(()),
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal.abort();
    }
}
