//! Custom Resource Definitions used by the operator
//!
//! This module contains all CRD types:
//! - Storage: the operator configuration singleton
//! - ClusterCSIDriver: one per CSI driver operator
//! - Infrastructure, FeatureGate, Proxy, ClusterOperator: cluster config

pub mod clustercsidriver;
pub mod conditions;
pub mod config;
pub mod storage;

pub use clustercsidriver::*;
pub use conditions::*;
pub use config::*;
pub use storage::*;
