//! HTTPS client for remote cluster members

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::tls::TlsInfo;
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ApiResponse, API_PREFIX};
use crate::abstractions::{LocalIdentity, RemoteConnector, RemoteNode};
use crate::error::{PreseedError, PreseedResult};
use crate::trust::{certificate_fingerprint, decode_certificate_pem};
use crate::types::{RemoteNetwork, RemoteStoragePool};

/// The remote already trusts this node's certificate
const ALREADY_TRUSTED: &str = "Certificate already in trust store";

fn connection_error(address: &str, err: impl std::fmt::Display) -> PreseedError {
    PreseedError::Connection {
        address: address.to_string(),
        details: err.to_string(),
    }
}

/// Connector speaking the daemon REST API over TLS
#[derive(Debug, Clone)]
pub struct HttpsRemoteConnector {
    connect_timeout: Option<Duration>,
}

impl HttpsRemoteConnector {
    /// Remote calls wait as long as the operating system allows
    pub fn new() -> Self {
        Self {
            connect_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    fn client_builder(&self) -> ClientBuilder {
        let builder = Client::builder();
        match self.connect_timeout {
            Some(timeout) => builder.connect_timeout(timeout),
            None => builder,
        }
    }

    /// Client that only accepts the pinned remote certificate
    fn pinned_client(
        &self,
        remote_cert_pem: &str,
        identity: Option<&LocalIdentity>,
    ) -> PreseedResult<Client> {
        let root = Certificate::from_pem(remote_cert_pem.as_bytes()).map_err(|e| {
            PreseedError::Certificate {
                message: format!("Invalid remote certificate: {}", e),
            }
        })?;

        let mut builder = self
            .client_builder()
            .tls_built_in_root_certs(false)
            .add_root_certificate(root)
            // Cluster certificates are not issued for the address used
            .danger_accept_invalid_hostnames(true);

        if let Some(local) = identity {
            let identity =
                Identity::from_pkcs8_pem(local.cert_pem.as_bytes(), local.key_pem.as_bytes())
                    .map_err(|e| PreseedError::Certificate {
                        message: format!("Invalid local key pair: {}", e),
                    })?;
            builder = builder.identity(identity);
        }

        Ok(builder.build()?)
    }
}

impl Default for HttpsRemoteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteConnector for HttpsRemoteConnector {
    async fn fetch_certificate(&self, address: &str) -> PreseedResult<Vec<u8>> {
        let client = self
            .client_builder()
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .build()?;

        let response = client
            .get(format!("https://{}/", address))
            .send()
            .await
            .map_err(|e| connection_error(address, e))?;

        let der = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(TlsInfo::peer_certificate)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| connection_error(address, "no certificate presented"))?;

        debug!("Fetched {} byte certificate from {}", der.len(), address);
        Ok(der)
    }

    async fn establish_trust(
        &self,
        local: &LocalIdentity,
        address: &str,
        remote_cert_pem: &str,
        credential: &str,
    ) -> PreseedResult<()> {
        let local_der = decode_certificate_pem(&local.cert_pem)?;
        let body = json!({
            "type": "client",
            "certificate": STANDARD.encode(&local_der),
            "password": credential,
            "name": format!("cluster.{}", &certificate_fingerprint(&local_der)[..12]),
        });

        let client = self.pinned_client(remote_cert_pem, None)?;
        let trust_error = |details: String| PreseedError::TrustSetup {
            address: address.to_string(),
            details,
        };

        let response = client
            .post(format!("https://{}{}/certificates", address, API_PREFIX))
            .json(&body)
            .send()
            .await
            .map_err(|e| trust_error(e.to_string()))?;

        let envelope: ApiResponse = response
            .json()
            .await
            .map_err(|e| trust_error(e.to_string()))?;

        match envelope.into_metadata(address) {
            Ok(_) => Ok(()),
            Err(PreseedError::Connection { details, .. }) if details.contains(ALREADY_TRUSTED) => {
                debug!("{} already trusts this node", address);
                Ok(())
            }
            Err(e) => Err(trust_error(e.to_string())),
        }
    }

    async fn connect(
        &self,
        address: &str,
        local: &LocalIdentity,
        remote_cert_pem: &str,
    ) -> PreseedResult<Box<dyn RemoteNode>> {
        let client = self.pinned_client(remote_cert_pem, Some(local))?;
        Ok(Box::new(HttpsRemoteNode {
            client,
            address: address.to_string(),
        }))
    }
}

/// Authenticated client bound to one cluster member
struct HttpsRemoteNode {
    client: Client,
    address: String,
}

impl HttpsRemoteNode {
    async fn list<T: DeserializeOwned>(&self, collection: &str) -> PreseedResult<Vec<T>> {
        let url = format!("https://{}{}/{}?recursion=1", self.address, API_PREFIX, collection);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| connection_error(&self.address, e))?;

        let envelope: ApiResponse = response.json().await?;
        let metadata = envelope.into_metadata(&self.address)?;
        Ok(serde_json::from_value(metadata)?)
    }
}

#[async_trait]
impl RemoteNode for HttpsRemoteNode {
    async fn list_storage_pools(&self) -> PreseedResult<Vec<RemoteStoragePool>> {
        self.list("storage-pools").await
    }

    async fn list_networks(&self) -> PreseedResult<Vec<RemoteNetwork>> {
        self.list("networks").await
    }
}
