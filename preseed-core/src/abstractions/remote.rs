//! Remote cluster member abstractions
//!
//! Trait seams for the three network exchanges of a join (certificate
//! fetch, trust establishment, authenticated resource listing) so the join
//! flow can be driven without a real cluster.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PreseedError, PreseedResult};
use crate::types::{RemoteNetwork, RemoteStoragePool};

/// This node's own certificate key pair, PEM encoded
#[derive(Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub cert_pem: String,
    pub key_pem: String,
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"***")
            .finish()
    }
}

/// Abstraction for reaching a remote cluster member
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Fetch the DER certificate presented by `address` without verifying it
    async fn fetch_certificate(&self, address: &str) -> PreseedResult<Vec<u8>>;

    /// Add `local`'s certificate to the remote trust store using `credential`
    async fn establish_trust(
        &self,
        local: &LocalIdentity,
        address: &str,
        remote_cert_pem: &str,
        credential: &str,
    ) -> PreseedResult<()>;

    /// Open an authenticated client pinned to the remote certificate
    async fn connect(
        &self,
        address: &str,
        local: &LocalIdentity,
        remote_cert_pem: &str,
    ) -> PreseedResult<Box<dyn RemoteNode>>;
}

/// Authenticated client bound to one remote cluster member
#[async_trait]
pub trait RemoteNode: Send + Sync {
    async fn list_storage_pools(&self) -> PreseedResult<Vec<RemoteStoragePool>>;

    async fn list_networks(&self) -> PreseedResult<Vec<RemoteNetwork>>;
}

// Mock implementation for testing

/// Trust exchange recorded by [`MockRemoteConnector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustCall {
    pub address: String,
    pub remote_cert_pem: String,
    pub credential: String,
}

#[derive(Debug, Default)]
struct MockRemoteState {
    certificates: HashMap<String, Vec<u8>>,
    trust_error: Option<String>,
    pools: Vec<RemoteStoragePool>,
    networks: Vec<RemoteNetwork>,
    pools_error: Option<String>,
    networks_error: Option<String>,
    fetch_attempts: Vec<String>,
    trust_calls: Vec<TrustCall>,
    connections: Vec<String>,
}

/// Mock remote cluster for testing
#[derive(Debug, Clone, Default)]
pub struct MockRemoteConnector {
    state: Arc<Mutex<MockRemoteState>>,
}

impl MockRemoteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `der` as the certificate of `address`; unknown addresses fail
    pub fn with_certificate(self, address: &str, der: Vec<u8>) -> Self {
        self.state.lock().certificates.insert(address.to_string(), der);
        self
    }

    pub fn with_trust_error(self, error: &str) -> Self {
        self.state.lock().trust_error = Some(error.to_string());
        self
    }

    pub fn with_pools(self, pools: Vec<RemoteStoragePool>) -> Self {
        self.state.lock().pools = pools;
        self
    }

    pub fn with_networks(self, networks: Vec<RemoteNetwork>) -> Self {
        self.state.lock().networks = networks;
        self
    }

    pub fn with_pools_error(self, error: &str) -> Self {
        self.state.lock().pools_error = Some(error.to_string());
        self
    }

    pub fn with_networks_error(self, error: &str) -> Self {
        self.state.lock().networks_error = Some(error.to_string());
        self
    }

    pub fn fetch_attempts(&self) -> Vec<String> {
        self.state.lock().fetch_attempts.clone()
    }

    pub fn trust_calls(&self) -> Vec<TrustCall> {
        self.state.lock().trust_calls.clone()
    }

    pub fn connections(&self) -> Vec<String> {
        self.state.lock().connections.clone()
    }
}

#[async_trait]
impl RemoteConnector for MockRemoteConnector {
    async fn fetch_certificate(&self, address: &str) -> PreseedResult<Vec<u8>> {
        let mut state = self.state.lock();
        state.fetch_attempts.push(address.to_string());
        state
            .certificates
            .get(address)
            .cloned()
            .ok_or_else(|| PreseedError::Connection {
                address: address.to_string(),
                details: "connection refused".to_string(),
            })
    }

    async fn establish_trust(
        &self,
        _local: &LocalIdentity,
        address: &str,
        remote_cert_pem: &str,
        credential: &str,
    ) -> PreseedResult<()> {
        let mut state = self.state.lock();
        state.trust_calls.push(TrustCall {
            address: address.to_string(),
            remote_cert_pem: remote_cert_pem.to_string(),
            credential: credential.to_string(),
        });

        match &state.trust_error {
            Some(error) => Err(PreseedError::TrustSetup {
                address: address.to_string(),
                details: error.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn connect(
        &self,
        address: &str,
        _local: &LocalIdentity,
        _remote_cert_pem: &str,
    ) -> PreseedResult<Box<dyn RemoteNode>> {
        self.state.lock().connections.push(address.to_string());
        Ok(Box::new(MockRemoteNode {
            state: self.state.clone(),
        }))
    }
}

struct MockRemoteNode {
    state: Arc<Mutex<MockRemoteState>>,
}

#[async_trait]
impl RemoteNode for MockRemoteNode {
    async fn list_storage_pools(&self) -> PreseedResult<Vec<RemoteStoragePool>> {
        let state = self.state.lock();
        match &state.pools_error {
            Some(error) => Err(PreseedError::Connection {
                address: "mock".to_string(),
                details: error.clone(),
            }),
            None => Ok(state.pools.clone()),
        }
    }

    async fn list_networks(&self) -> PreseedResult<Vec<RemoteNetwork>> {
        let state = self.state.lock();
        match &state.networks_error {
            Some(error) => Err(PreseedError::Connection {
                address: "mock".to_string(),
                details: error.clone(),
            }),
            None => Ok(state.networks.clone()),
        }
    }
}
