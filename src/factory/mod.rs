//! Controller factory
//!
//! Uniform controllers: a sync handler, the informers that trigger it, a
//! resync interval and an optional Degraded-on-error report, driven by a
//! deduplicating work queue with one worker.

pub mod controller;
pub mod queue;

pub use controller::{
    Controller, ControllerBuilder, ControllerManager, SyncContext, SyncHandler, DEFAULT_QUEUE_KEY,
};
pub use queue::WorkQueue;
