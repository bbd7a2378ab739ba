//! Deduplicating, rate-limited work queue
//!
//! A key is queued at most once. A key re-added while a worker holds it is
//! marked dirty and queued again when the worker calls [`WorkQueue::done`],
//! so a burst of events coalesces into one extra sync.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const RATE_LIMIT_BASE: Duration = Duration::from_millis(5);
const RATE_LIMIT_MAX: Duration = Duration::from_secs(1000);

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    failures: Mutex<HashMap<String, (u32, ExponentialBackoff)>>,
    notify: Notify,
}

fn new_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(RATE_LIMIT_BASE)
        .with_multiplier(2.0)
        .with_randomization_factor(0.0)
        .with_max_interval(RATE_LIMIT_MAX)
        .with_max_elapsed_time(None)
        .build()
}

impl WorkQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, key: &str) {
        let mut state = self.state.lock();
        if state.shutting_down || !state.dirty.insert(key.to_string()) {
            return;
        }
        if state.processing.contains(key) {
            return;
        }
        state.queue.push_back(key.to_string());
        drop(state);
        self.notify.notify_one();
    }

    /// Add the key once `delay` has passed, without blocking the caller
    pub fn add_after(self: &Arc<Self>, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(&key);
        });
    }

    /// Add the key after its per-key exponential backoff
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) {
        let delay = {
            let mut failures = self.failures.lock();
            let (count, backoff) = failures
                .entry(key.to_string())
                .or_insert_with(|| (0, new_backoff()));
            *count += 1;
            backoff.next_backoff().unwrap_or(RATE_LIMIT_MAX)
        };
        self.add_after(key, delay);
    }

    /// Reset the backoff of a key after a successful sync
    pub fn forget(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        self.failures.lock().get(key).map_or(0, |(count, _)| *count)
    }

    /// Wait for the next key; `None` once the queue is shut down
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark a key as processed, re-queueing it when it was added meanwhile
    pub fn done(&self, key: &str) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
