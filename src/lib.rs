//! Cluster Storage Operator
//!
//! Keeps cluster storage in shape: a default StorageClass for platforms that
//! need one, the CSI driver operator matching the platform, the vSphere
//! problem detector, and the `storage` ClusterOperator reporting how all of
//! that is doing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Starter (standalone | hosted)                 │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐  │
//! │  │ Status         │  │ DefaultStorage │  │ CSI driver starter     │  │
//! │  │ aggregator     │  │ Class          │  │  └─ per-driver managers│  │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘  │
//! │          │                   │                       │               │
//! │          └───────────────────┼───────────────────────┘               │
//! │                              │                                       │
//! │              ┌───────────────┴───────────────┐                       │
//! │              │ Controller factory + queues   │                       │
//! │              └───────────────┬───────────────┘                       │
//! ├──────────────────────────────┴───────────────────────────────────────┤
//! │         Client & informer plane (guest + management bundles)         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`client`]: object store, informer caches and REST mapper per cluster
//! - [`factory`]: work queues and the controller runner
//! - [`controllers`]: every reconciling controller
//! - [`starter`]: wiring for standalone and hosted control plane mode
//! - [`crd`]: operator and cluster config types
//! - [`error`]: Error types and handling

pub mod assets;
pub mod client;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod domain;
pub mod error;
pub mod factory;
pub mod leader;
pub mod metrics;
pub mod operator;
pub mod resourceapply;
pub mod starter;

#[cfg(test)]
mod scenarios;

pub use config::OperatorConfig;
pub use error::{Error, ErrorAction, Result};
pub use metrics::Metrics;
pub use starter::Operator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
