// Shared fixtures for the end-to-end wizard tests
#![allow(dead_code)]

use std::fs;

use preseed_core::abstractions::{MockHost, MockInventory, MockRemoteConnector, ScriptedPrompter};
use preseed_core::trust::{decode_certificate_pem, SERVER_CERT_FILE, SERVER_KEY_FILE};
use preseed_core::types::{ConfigMap, RemoteNetwork, RemoteStoragePool, ResourceStatus};
use preseed_core::{ConfigAssembler, InitConfig, PlannerConfig, PlannerContext, PreseedResult};
use tempfile::TempDir;

const REMOTE_CERT: &str = include_str!("../fixtures/remote.crt");
const SERVER_CERT: &str = include_str!("../fixtures/server.crt");
const SERVER_KEY: &str = include_str!("../fixtures/server.key");

/// DER of the certificate served by the fake cluster member
pub fn remote_certificate_der() -> Vec<u8> {
    decode_certificate_pem(REMOTE_CERT).unwrap()
}

/// Mock collaborators plus a data directory holding this node's identity
pub struct Harness {
    pub host: MockHost,
    pub inventory: MockInventory,
    pub connector: MockRemoteConnector,
    pub settings: PlannerConfig,
    data_dir: TempDir,
}

impl Harness {
    pub fn new(host: MockHost, inventory: MockInventory, connector: MockRemoteConnector) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        fs::write(data_dir.path().join(SERVER_CERT_FILE), SERVER_CERT).unwrap();
        fs::write(data_dir.path().join(SERVER_KEY_FILE), SERVER_KEY).unwrap();

        let settings = PlannerConfig {
            data_dir: data_dir.path().to_path_buf(),
            ..Default::default()
        };

        Self {
            host,
            inventory,
            connector,
            settings,
            data_dir,
        }
    }

    /// Same data directory without the local key pair
    pub fn without_identity(self) -> Self {
        fs::remove_file(self.data_dir.path().join(SERVER_KEY_FILE)).unwrap();
        self
    }

    pub fn ctx(&self) -> PlannerContext<'_> {
        PlannerContext {
            host: &self.host,
            inventory: &self.inventory,
            connector: &self.connector,
            settings: &self.settings,
        }
    }

    pub async fn run(&self, answers: &[&str]) -> (PreseedResult<InitConfig>, ScriptedPrompter) {
        let mut prompter = ScriptedPrompter::new(answers.iter().copied());
        let result = ConfigAssembler::new(self.ctx()).run(&mut prompter).await;
        (result, prompter)
    }
}

pub fn config(pairs: &[(&str, &str)]) -> ConfigMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn remote_pool(name: &str, driver: &str, status: &str, pairs: &[(&str, &str)]) -> RemoteStoragePool {
    RemoteStoragePool {
        name: name.to_string(),
        driver: driver.to_string(),
        description: String::new(),
        config: config(pairs),
        status: ResourceStatus::new(status),
    }
}

pub fn remote_network(
    name: &str,
    network_type: &str,
    managed: bool,
    status: &str,
    pairs: &[(&str, &str)],
) -> RemoteNetwork {
    RemoteNetwork {
        name: name.to_string(),
        network_type: network_type.to_string(),
        managed,
        description: String::new(),
        config: config(pairs),
        status: ResourceStatus::new(status),
    }
}
