//! Production transports behind the remote and inventory abstractions
//!
//! `https` talks to remote cluster members over TLS; `unix_socket` queries
//! the local daemon over its unix socket.

pub mod https;
pub mod unix_socket;

pub use https::HttpsRemoteConnector;
pub use unix_socket::UnixSocketInventory;

use serde::Deserialize;

use crate::error::{PreseedError, PreseedResult};

/// Daemon REST API version prefix
pub const API_PREFIX: &str = "/1.0";

/// Response envelope of the daemon REST API
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: u16,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ApiResponse {
    /// The metadata of a successful response, or the embedded error
    pub(crate) fn into_metadata(self, address: &str) -> PreseedResult<serde_json::Value> {
        if self.kind == "error" || self.error_code >= 400 {
            return Err(PreseedError::Connection {
                address: address.to_string(),
                details: format!("{} (code {})", self.error, self.error_code),
            });
        }
        Ok(self.metadata)
    }
}
