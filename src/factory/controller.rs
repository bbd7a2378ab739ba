//! Controllers: a sync handler plus the queue, triggers and error policy that drive it
//!
//! Every informer event enqueues the same default key, so a controller
//! reconciles the whole of its state on each sync. One worker per controller
//! keeps syncs serial.

use crate::crd::{ConditionStatus, OperatorCondition};
use crate::domain::ports::Informer;
use crate::error::{ErrorAction, Result};
use crate::factory::queue::WorkQueue;
use crate::operator::OperatorClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The only key controllers ever queue
pub const DEFAULT_QUEUE_KEY: &str = "key";

/// Reconcile logic of a controller
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(&self, ctx: &SyncContext) -> Result<()>;
}

/// Per-sync context handed to a [`SyncHandler`]
#[derive(Clone)]
pub struct SyncContext {
    queue: Arc<WorkQueue>,
    key: String,
    cancel: CancellationToken,
}

impl SyncContext {
    pub fn new(queue: Arc<WorkQueue>, key: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            queue,
            key: key.into(),
            cancel,
        }
    }

    /// A context backed by a queue no worker drains
    pub fn detached() -> Self {
        Self::new(WorkQueue::new(), DEFAULT_QUEUE_KEY, CancellationToken::new())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Cancelled when the controller shuts down
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Schedule another sync of the current key
    pub fn requeue_after(&self, delay: Duration) {
        self.queue.add_after(&self.key, delay);
    }
}

pub struct Controller {
    name: String,
    handler: Arc<dyn SyncHandler>,
    informers: Vec<Informer>,
    resync: Option<Duration>,
    degraded: Option<OperatorClient>,
    queue: Arc<WorkQueue>,
}

pub struct ControllerBuilder {
    name: String,
    handler: Arc<dyn SyncHandler>,
    informers: Vec<Informer>,
    resync: Option<Duration>,
    degraded: Option<OperatorClient>,
}

impl ControllerBuilder {
    /// Sync whenever any of these informers sees a change
    pub fn with_informers(mut self, informers: impl IntoIterator<Item = Informer>) -> Self {
        self.informers.extend(informers);
        self
    }

    pub fn resync_every(mut self, interval: Duration) -> Self {
        self.resync = Some(interval);
        self
    }

    /// Report sync errors as `<name>Degraded` on the operator config
    pub fn with_sync_degraded_on_error(mut self, operator: OperatorClient) -> Self {
        self.degraded = Some(operator);
        self
    }

    pub fn build(self) -> Controller {
        Controller {
            name: self.name,
            handler: self.handler,
            informers: self.informers,
            resync: self.resync,
            degraded: self.degraded,
            queue: WorkQueue::new(),
        }
    }
}

impl Controller {
    pub fn builder(name: impl Into<String>, handler: Arc<dyn SyncHandler>) -> ControllerBuilder {
        ControllerBuilder {
            name: name.into(),
            handler,
            informers: Vec::new(),
            resync: None,
            degraded: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    pub fn informers(&self) -> &[Informer] {
        &self.informers
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(controller = %self.name, "Starting controller");

        for informer in &self.informers {
            let mut events = informer.subscribe();
            let queue = self.queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        event = events.recv() => match event {
                            Ok(()) | Err(RecvError::Lagged(_)) => queue.add(DEFAULT_QUEUE_KEY),
                            Err(RecvError::Closed) => break,
                        }
                    }
                }
            });
        }

        if let Some(period) = self.resync {
            let queue = self.queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => queue.add(DEFAULT_QUEUE_KEY),
                    }
                }
            });
        }

        {
            let queue = self.queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                queue.shutdown();
            });
        }

        // Post-start: reconcile once even without events.
        self.queue.add(DEFAULT_QUEUE_KEY);

        while let Some(key) = self.queue.get().await {
            self.process(&key, &cancel).await;
            self.queue.done(&key);
        }
        info!(controller = %self.name, "Controller stopped");
    }

    async fn process(&self, key: &str, cancel: &CancellationToken) {
        let ctx = SyncContext::new(self.queue.clone(), key, cancel.child_token());
        debug!(controller = %self.name, "Syncing");

        let result = tokio::select! {
            result = self.handler.sync(&ctx) => result,
            _ = cancel.cancelled() => return,
        };

        if let Some(operator) = &self.degraded {
            self.report_degraded(operator, result.as_ref().err().map(|e| e.to_string()))
                .await;
        }

        match result {
            Ok(()) => self.queue.forget(key),
            Err(e) => {
                warn!(controller = %self.name, error = %e, "Sync failed");
                match e.action() {
                    ErrorAction::RequeueWithBackoff => self.queue.add_rate_limited(key),
                    ErrorAction::RequeueAfter(delay) => self.queue.add_after(key, delay),
                    // Re-run on the next event or resync only.
                    ErrorAction::NoRequeue => self.queue.forget(key),
                }
            }
        }
    }

    async fn report_degraded(&self, operator: &OperatorClient, error: Option<String>) {
        let condition = match error {
            Some(message) => OperatorCondition::new(
                format!("{}Degraded", self.name),
                ConditionStatus::True,
            )
            .with_reason("SyncError")
            .with_message(message),
            None => OperatorCondition::new(
                format!("{}Degraded", self.name),
                ConditionStatus::False,
            )
            .with_reason("AsExpected"),
        };
        let manager = format!("{}-degraded", self.name);
        if let Err(e) = operator.apply_conditions(&manager, vec![condition]).await {
            warn!(controller = %self.name, error = %e, "Failed to update Degraded condition");
        }
    }
}

/// A group of controllers run together on one cancellation token
#[derive(Default)]
pub struct ControllerManager {
    name: String,
    controllers: Vec<Controller>,
}

impl ControllerManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controllers: Vec::new(),
        }
    }

    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn add(&mut self, controller: Controller) {
        self.controllers.push(controller);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.iter().map(Controller::name).collect()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(manager = %self.name, controllers = self.controllers.len(), "Starting controllers");
        futures::future::join_all(
            self.controllers
                .into_iter()
                .map(|controller| controller.run(cancel.clone())),
        )
        .await;
        info!(manager = %self.name, "All controllers stopped");
    }
}
