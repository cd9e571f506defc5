//! Join handshake with an existing cluster member
//!
//! The remote certificate is fetched over an unverified connection, shown to
//! the operator as a SHA-256 fingerprint and only trusted after explicit
//! confirmation. Trust is then established with the operator-supplied
//! credential and this node's own key pair, yielding a client pinned to the
//! confirmed certificate.

use pem::{EncodeConfig, LineEnding, Pem};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::abstractions::{LocalIdentity, Prompter, RemoteConnector, RemoteNode};
use crate::address::canonical_address;
use crate::config::PlannerConfig;
use crate::error::{PreseedError, PreseedResult};
use crate::types::Secret;
use crate::validation::validate_node_address;

/// File names of this node's certificate key pair inside the data directory
pub const SERVER_CERT_FILE: &str = "server.crt";
pub const SERVER_KEY_FILE: &str = "server.key";

/// Lowercase hex SHA-256 of a DER certificate
pub fn certificate_fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// PEM-encode a DER certificate with `\n` line endings
pub fn encode_certificate_pem(der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new("CERTIFICATE", der.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

/// Extract the DER bytes of a PEM certificate
pub fn decode_certificate_pem(cert_pem: &str) -> PreseedResult<Vec<u8>> {
    let block = pem::parse(cert_pem).map_err(|e| PreseedError::Certificate {
        message: format!("Failed to parse PEM certificate: {}", e),
    })?;

    if block.tag() != "CERTIFICATE" {
        return Err(PreseedError::Certificate {
            message: format!("Expected a CERTIFICATE block, found {}", block.tag()),
        });
    }

    Ok(block.contents().to_vec())
}

/// Short human summary (subject and expiry) of a DER certificate
fn describe_certificate(der: &[u8]) -> PreseedResult<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| {
        PreseedError::Certificate {
            message: format!("Remote presented an invalid certificate: {}", e),
        }
    })?;

    Ok(format!(
        "subject: {}, valid until: {}",
        cert.subject(),
        cert.validity().not_after
    ))
}

/// Load this node's certificate key pair from the data directory
pub async fn load_local_identity(data_dir: &Path) -> PreseedResult<LocalIdentity> {
    let cert_path = data_dir.join(SERVER_CERT_FILE);
    let key_path = data_dir.join(SERVER_KEY_FILE);

    let cert_pem = tokio::fs::read_to_string(&cert_path)
        .await
        .map_err(|e| PreseedError::Certificate {
            message: format!("Failed to read {}: {}", cert_path.display(), e),
        })?;
    let key_pem = tokio::fs::read_to_string(&key_path)
        .await
        .map_err(|e| PreseedError::Certificate {
            message: format!("Failed to read {}: {}", key_path.display(), e),
        })?;

    // Reject garbage early rather than during the TLS handshake
    decode_certificate_pem(&cert_pem)?;

    Ok(LocalIdentity { cert_pem, key_pem })
}

/// A remote cluster member whose certificate the operator has confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedRemote {
    address: String,
    certificate_pem: String,
    fingerprint: String,
    credential: Secret,
}

impl TrustedRemote {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn credential(&self) -> &Secret {
        &self.credential
    }
}

/// Result of a successful join handshake
pub struct TrustedSession {
    pub remote: TrustedRemote,
    pub client: Box<dyn RemoteNode>,
}

/// Drives the join handshake
pub struct TrustNegotiator<'a> {
    connector: &'a dyn RemoteConnector,
    settings: &'a PlannerConfig,
}

impl<'a> TrustNegotiator<'a> {
    pub fn new(connector: &'a dyn RemoteConnector, settings: &'a PlannerConfig) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Full handshake: choose and confirm the remote, confirm the data wipe,
    /// establish trust and connect.
    pub async fn join(&self, prompter: &mut dyn Prompter) -> PreseedResult<TrustedSession> {
        let remote = self.confirm_remote(prompter).await?;

        if !prompter.ask_bool(
            "All existing data is lost when joining a cluster, continue? (yes/no) [default=no] ",
            false,
        )? {
            return Err(PreseedError::aborted("existing data must not be wiped"));
        }

        let local = load_local_identity(&self.settings.data_dir).await?;
        self.establish(remote, &local).await
    }

    /// Ask for the remote address until its certificate can be fetched, then
    /// require fingerprint confirmation and collect the trust credential.
    pub async fn confirm_remote(&self, prompter: &mut dyn Prompter) -> PreseedResult<TrustedRemote> {
        loop {
            let input = prompter.ask_string(
                "IP address or FQDN of an existing cluster node: ",
                "",
                Some(&validate_node_address),
            )?;
            let address = canonical_address(&input, self.settings.default_port);
            debug!("Fetching certificate of cluster node {}", address);

            let der = match self.connector.fetch_certificate(&address).await {
                Ok(der) => der,
                Err(e) => {
                    warn!("Certificate fetch from {} failed: {}", address, e);
                    prompter.say(&format!("Error connecting to existing cluster node: {}", e));
                    continue;
                }
            };

            let summary = match describe_certificate(&der) {
                Ok(summary) => summary,
                Err(e) => {
                    prompter.say(&format!("Error connecting to existing cluster node: {}", e));
                    continue;
                }
            };

            let fingerprint = certificate_fingerprint(&der);
            prompter.say(&format!("Cluster certificate fingerprint: {}", fingerprint));
            prompter.say(&format!("Cluster certificate {}", summary));

            if !prompter.ask_bool("ok? (yes/no) [default=no]: ", false)? {
                return Err(PreseedError::aborted("cluster certificate fingerprint rejected"));
            }

            let credential = prompter.ask_password("Cluster trust password: ")?;
            info!("Operator confirmed cluster node {} ({})", address, fingerprint);

            return Ok(TrustedRemote {
                address,
                certificate_pem: encode_certificate_pem(&der),
                fingerprint,
                credential: Secret::new(credential),
            });
        }
    }

    /// Trust exchange followed by an authenticated connection. Not retried:
    /// a failed exchange may have changed remote state.
    pub async fn establish(
        &self,
        remote: TrustedRemote,
        local: &LocalIdentity,
    ) -> PreseedResult<TrustedSession> {
        self.connector
            .establish_trust(
                local,
                &remote.address,
                &remote.certificate_pem,
                remote.credential.expose(),
            )
            .await
            .map_err(|e| match e {
                PreseedError::TrustSetup { .. } => e,
                other => PreseedError::TrustSetup {
                    address: remote.address.clone(),
                    details: other.to_string(),
                },
            })?;
        info!("Trust established with cluster node {}", remote.address);

        let client = self
            .connector
            .connect(&remote.address, local, &remote.certificate_pem)
            .await?;

        Ok(TrustedSession { remote, client })
    }
}
