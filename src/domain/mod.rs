//! Ports between the controllers and the cluster
//!
//! The live kube-rs adapters and the in-memory test cluster in [`crate::client`]
//! implement these traits.

pub mod ports;

pub use ports::*;
