//! Local daemon queries over its unix socket

use async_trait::async_trait;
use hyper::header::HOST;
use hyper::{Body, Method, Request, StatusCode};
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::debug;
use url::Url;

use super::API_PREFIX;
use crate::abstractions::LocalInventory;
use crate::error::{PreseedError, PreseedResult};

/// Inventory backed by the local daemon's REST API
#[derive(Debug, Clone)]
pub struct UnixSocketInventory {
    socket: PathBuf,
}

impl UnixSocketInventory {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    async fn status(&self, path: &str) -> PreseedResult<StatusCode> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|e| PreseedError::Connection {
                address: self.socket.display().to_string(),
                details: e.to_string(),
            })?;

        let (mut sender, connection) = hyper::client::conn::handshake(stream).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Local daemon connection closed: {}", e);
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, "localhost")
            .body(Body::empty())?;

        let response = sender.send_request(request).await?;
        Ok(response.status())
    }

    async fn exists(&self, collection: &str, name: &str) -> PreseedResult<bool> {
        let path = resource_path(collection, name)?;
        let status = self.status(&path).await?;
        debug!("GET {} -> {}", path, status);
        Ok(status.is_success())
    }
}

/// Request path of one named resource, with the name percent-encoded
pub fn resource_path(collection: &str, name: &str) -> PreseedResult<String> {
    let mut url = Url::parse("http://localhost").map_err(|e| PreseedError::InvalidConfiguration {
        message: e.to_string(),
    })?;

    url.path_segments_mut()
        .map_err(|_| PreseedError::InvalidConfiguration {
            message: "daemon URL cannot carry a path".to_string(),
        })?
        .push(API_PREFIX.trim_start_matches('/'))
        .push(collection)
        .push(name);

    Ok(url.path().to_string())
}

#[async_trait]
impl LocalInventory for UnixSocketInventory {
    async fn storage_pool_exists(&self, name: &str) -> PreseedResult<bool> {
        self.exists("storage-pools", name).await
    }

    async fn network_exists(&self, name: &str) -> PreseedResult<bool> {
        self.exists("networks", name).await
    }
}
