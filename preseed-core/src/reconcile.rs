//! Reconcile a cluster's resources for a joining node
//!
//! Storage pools and networks are inherited verbatim from the cluster. Only
//! node-local keys (a pool's `source`, a network's external interfaces) are
//! asked again, because their remote values name devices of another machine.

use tracing::{debug, info};

use crate::abstractions::{Prompter, RemoteNode};
use crate::error::{PreseedError, PreseedResult};
use crate::types::{
    ConfigMap, NetworkSpec, ReconciledResources, RemoteNetwork, RemoteStoragePool, StoragePoolSpec,
};
use crate::validation::accept_any;

/// Drivers whose pools have no per-node identity
pub const SHARED_STORAGE_DRIVERS: &[&str] = &["ceph"];

/// Node-local key of a storage pool
pub const POOL_LOCAL_KEY: &str = "source";

/// Node-local key of a network
pub const NETWORK_LOCAL_KEY: &str = "bridge.external_interfaces";

/// Pools a joining node has to define locally
pub fn filter_storage_pools(pools: Vec<RemoteStoragePool>) -> Vec<RemoteStoragePool> {
    pools
        .into_iter()
        .filter(|pool| {
            if pool.status.is_pending() {
                debug!("Skipping pending storage pool {}", pool.name);
                return false;
            }
            if SHARED_STORAGE_DRIVERS.contains(&pool.driver.as_str()) {
                debug!("Skipping cluster-shared storage pool {} ({})", pool.name, pool.driver);
                return false;
            }
            true
        })
        .collect()
}

/// Networks a joining node has to define locally
pub fn filter_networks(networks: Vec<RemoteNetwork>) -> Vec<RemoteNetwork> {
    networks
        .into_iter()
        .filter(|network| network.managed && !network.status.is_pending())
        .collect()
}

/// The remote value of a node-local key, when it carries one
fn remote_local_value<'a>(config: &'a ConfigMap, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

pub struct ResourceReconciler<'a> {
    client: &'a dyn RemoteNode,
}

impl<'a> ResourceReconciler<'a> {
    pub fn new(client: &'a dyn RemoteNode) -> Self {
        Self { client }
    }

    /// List, filter and localize the cluster's pools and networks.
    ///
    /// Listing failures are fatal: trust is already established, so a
    /// failure here is not something re-prompting can fix.
    pub async fn fetch_and_filter(
        &self,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<ReconciledResources> {
        let pools = self
            .client
            .list_storage_pools()
            .await
            .map_err(|e| PreseedError::RemoteListing {
                resource: "storage pools".to_string(),
                details: e.to_string(),
            })?;

        let storage_pools = filter_storage_pools(pools)
            .into_iter()
            .map(|pool| localize_pool(pool, prompter))
            .collect::<PreseedResult<Vec<_>>>()?;

        // Networks are listed only once the pool answers are in
        let networks = self
            .client
            .list_networks()
            .await
            .map_err(|e| PreseedError::RemoteListing {
                resource: "networks".to_string(),
                details: e.to_string(),
            })?;

        let networks = filter_networks(networks)
            .into_iter()
            .map(|network| localize_network(network, prompter))
            .collect::<PreseedResult<Vec<_>>>()?;

        info!(
            "Inheriting {} storage pools and {} networks from the cluster",
            storage_pools.len(),
            networks.len()
        );

        Ok(ReconciledResources {
            storage_pools,
            networks,
        })
    }
}

fn localize_pool(
    pool: RemoteStoragePool,
    prompter: &mut dyn Prompter,
) -> PreseedResult<StoragePoolSpec> {
    let mut config = pool.config;

    if remote_local_value(&config, POOL_LOCAL_KEY).is_some() {
        let question = format!(
            "Choose the local disk or dataset for storage pool \"{}\" (empty for loop disk): ",
            pool.name
        );
        // An empty answer stays an explicit empty override
        let source = prompter.ask_string(&question, "", Some(&accept_any))?;
        config.insert(POOL_LOCAL_KEY.to_string(), source);
    }

    Ok(StoragePoolSpec {
        name: pool.name,
        driver: pool.driver,
        description: pool.description,
        config,
    })
}

fn localize_network(
    network: RemoteNetwork,
    prompter: &mut dyn Prompter,
) -> PreseedResult<NetworkSpec> {
    let mut config = network.config;

    if remote_local_value(&config, NETWORK_LOCAL_KEY).is_some() {
        let question = format!(
            "Choose the local network interface to connect to network \"{}\" (empty for none): ",
            network.name
        );
        let interfaces = prompter.ask_string(&question, "", Some(&accept_any))?;
        config.insert(NETWORK_LOCAL_KEY.to_string(), interfaces);
    }

    Ok(NetworkSpec {
        name: network.name,
        network_type: network.network_type,
        managed: true,
        description: network.description,
        config,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::abstractions::{LocalIdentity, MockRemoteConnector, RemoteConnector, ScriptedPrompter};
    use crate::types::{device, ResourceStatus};
    use pretty_assertions::assert_eq;

    pub(crate) fn remote_pool(name: &str, driver: &str, status: &str) -> RemoteStoragePool {
        RemoteStoragePool {
            name: name.to_string(),
            driver: driver.to_string(),
            description: String::new(),
            config: Default::default(),
            status: ResourceStatus::new(status),
        }
    }

    pub(crate) fn remote_bridge(name: &str, managed: bool, status: &str) -> RemoteNetwork {
        RemoteNetwork {
            name: name.to_string(),
            network_type: "bridge".to_string(),
            managed,
            description: String::new(),
            config: device([("ipv4.address", "10.1.0.1/24")]),
            status: ResourceStatus::new(status),
        }
    }

    async fn client_for(connector: &MockRemoteConnector) -> Box<dyn RemoteNode> {
        let local = LocalIdentity {
            cert_pem: String::new(),
            key_pem: String::new(),
        };
        connector.connect("10.0.0.1:8443", &local, "").await.unwrap()
    }

    #[test]
    fn test_pending_pool_is_excluded() {
        let pools = vec![
            remote_pool("pending", "zfs", "PENDING"),
            remote_pool("ready", "zfs", "CREATED"),
        ];

        let kept = filter_storage_pools(pools);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "ready");
    }

    #[test]
    fn test_shared_driver_is_excluded() {
        let kept = filter_storage_pools(vec![
            remote_pool("remote", "ceph", "CREATED"),
            remote_pool("local", "btrfs", "CREATED"),
        ]);
        assert_eq!(kept.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["local"]);
    }

    #[test]
    fn test_unmanaged_and_pending_networks_are_excluded() {
        let kept = filter_networks(vec![
            remote_bridge("eth0", false, "CREATED"),
            remote_bridge("lxdbr1", true, "Pending"),
            remote_bridge("lxdbr0", true, "CREATED"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "lxdbr0");
    }

    #[tokio::test]
    async fn test_source_override_is_asked_only_when_set_remotely() {
        let mut with_source = remote_pool("data", "zfs", "CREATED");
        with_source
            .config
            .insert("source".to_string(), "tank/lxd".to_string());
        with_source
            .config
            .insert("zfs.pool_name".to_string(), "tank".to_string());
        let without_source = remote_pool("scratch", "dir", "CREATED");

        let connector = MockRemoteConnector::new().with_pools(vec![with_source, without_source]);
        let client = client_for(&connector).await;

        let mut prompter = ScriptedPrompter::new(["local/lxd"]);
        let resources = ResourceReconciler::new(client.as_ref())
            .fetch_and_filter(&mut prompter)
            .await
            .unwrap();

        assert_eq!(prompter.questions().len(), 1);
        assert!(prompter.asked("storage pool \"data\""));

        let data = &resources.storage_pools[0];
        assert_eq!(data.driver, "zfs");
        assert_eq!(data.config["source"], "local/lxd");
        assert_eq!(data.config["zfs.pool_name"], "tank");

        let scratch = &resources.storage_pools[1];
        assert!(!scratch.config.contains_key("source"));
    }

    #[tokio::test]
    async fn test_empty_override_is_kept_explicit() {
        let mut pool = remote_pool("data", "btrfs", "CREATED");
        pool.config
            .insert("source".to_string(), "/dev/sdb".to_string());
        let mut network = remote_bridge("lxdbr0", true, "CREATED");
        network
            .config
            .insert("bridge.external_interfaces".to_string(), "eth1".to_string());

        let connector = MockRemoteConnector::new()
            .with_pools(vec![pool])
            .with_networks(vec![network]);
        let client = client_for(&connector).await;

        let mut prompter = ScriptedPrompter::new(["", ""]);
        let resources = ResourceReconciler::new(client.as_ref())
            .fetch_and_filter(&mut prompter)
            .await
            .unwrap();

        assert_eq!(resources.storage_pools[0].config.get("source"), Some(&String::new()));
        let network = &resources.networks[0];
        assert!(network.managed);
        assert_eq!(network.network_type, "bridge");
        assert_eq!(
            network.config.get("bridge.external_interfaces"),
            Some(&String::new())
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let connector = MockRemoteConnector::new().with_networks_error("500 internal error");
        let client = client_for(&connector).await;

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = ResourceReconciler::new(client.as_ref())
            .fetch_and_filter(&mut prompter)
            .await
            .unwrap_err();

        match err {
            PreseedError::RemoteListing { resource, details } => {
                assert_eq!(resource, "networks");
                assert!(details.contains("500 internal error"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_pools_are_localized_before_networks_are_listed() {
        let mut pool = remote_pool("data", "zfs", "CREATED");
        pool.config
            .insert("source".to_string(), "tank/lxd".to_string());

        let connector = MockRemoteConnector::new()
            .with_pools(vec![pool])
            .with_networks_error("database is locked");
        let client = client_for(&connector).await;

        let mut prompter = ScriptedPrompter::new(["local/lxd"]);
        let err = ResourceReconciler::new(client.as_ref())
            .fetch_and_filter(&mut prompter)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PreseedError::RemoteListing { ref resource, .. } if resource == "networks"
        ));
        assert!(prompter.asked("storage pool \"data\""));
        assert_eq!(prompter.remaining(), 0);
    }
}
