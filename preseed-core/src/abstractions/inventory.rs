//! Existence checks against the local daemon's current state

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{PreseedError, PreseedResult};

/// Abstraction for the node's own (pre-join) resources
#[async_trait]
pub trait LocalInventory: Send + Sync {
    /// Whether a storage pool with this name already exists locally
    async fn storage_pool_exists(&self, name: &str) -> PreseedResult<bool>;

    /// Whether a network with this name already exists locally
    async fn network_exists(&self, name: &str) -> PreseedResult<bool>;
}

/// Mock inventory for testing
#[derive(Debug, Clone, Default)]
pub struct MockInventory {
    pools: HashSet<String>,
    networks: HashSet<String>,
    failure: Option<String>,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup fails as if the daemon could not be reached
    pub fn unreachable(details: &str) -> Self {
        Self {
            failure: Some(details.to_string()),
            ..Self::default()
        }
    }

    fn check_reachable(&self) -> PreseedResult<()> {
        match &self.failure {
            Some(details) => Err(PreseedError::Connection {
                address: "local daemon".to_string(),
                details: details.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn with_pool(mut self, name: &str) -> Self {
        self.pools.insert(name.to_string());
        self
    }

    pub fn with_network(mut self, name: &str) -> Self {
        self.networks.insert(name.to_string());
        self
    }
}

#[async_trait]
impl LocalInventory for MockInventory {
    async fn storage_pool_exists(&self, name: &str) -> PreseedResult<bool> {
        self.check_reachable()?;
        Ok(self.pools.contains(name))
    }

    async fn network_exists(&self, name: &str) -> PreseedResult<bool> {
        self.check_reachable()?;
        Ok(self.networks.contains(name))
    }
}
