//! Planning and reconciliation engine behind the interactive node
//! initialization wizard.
//!
//! The engine decides what configuration to hand to the daemon: cluster
//! membership, storage pools, networks and node-wide settings. Asking
//! questions, probing the host and talking to remote cluster members all
//! happen through the traits in [`abstractions`].

pub mod abstractions;
pub mod address;
pub mod assembler;
pub mod cluster;
pub mod config;
pub mod daemon_planner;
pub mod error;
pub mod idmap;
pub mod maas;
pub mod network_planner;
pub mod reconcile;
pub mod storage_planner;
pub mod transport;
pub mod trust;
pub mod types;
pub mod validation;

pub use assembler::{ConfigAssembler, PlannerContext};
pub use config::PlannerConfig;
pub use error::{PreseedError, PreseedResult};
pub use types::{ClusterIntent, InitConfig, NetworkSpec, StoragePoolSpec};
