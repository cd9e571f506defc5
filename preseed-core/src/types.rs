//! Data model for the planned node configuration
//!
//! `InitConfig` is the single value every planner mutates. It serializes to
//! the preseed YAML layout consumed by the daemon's init endpoint.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PreseedResult;
use crate::trust::TrustedRemote;

/// Driver or network specific key/value settings, ordered for stable output
pub type ConfigMap = BTreeMap<String, String>;

/// Profile devices keyed by device name
pub type DeviceMap = BTreeMap<String, ConfigMap>;

/// Name of the profile every planner writes devices into
pub const DEFAULT_PROFILE: &str = "default";

/// Device name of the root disk on the default profile
pub const ROOT_DEVICE: &str = "root";

/// Device name of the primary NIC on the default profile
pub const NIC_DEVICE: &str = "eth0";

/// A secret answer (trust password). Never shown in debug output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// A storage pool definition to create on this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePoolSpec {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl StoragePoolSpec {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            description: String::new(),
            config: ConfigMap::new(),
        }
    }
}

/// A network definition to create on this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub network_type: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl NetworkSpec {
    /// A new managed bridge with an empty config
    pub fn bridge(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network_type: "bridge".to_string(),
            managed: true,
            description: String::new(),
            config: ConfigMap::new(),
        }
    }
}

/// Baseline profile applied to new instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub devices: DeviceMap,
}

impl Profile {
    pub fn default_profile() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            description: String::new(),
            config: ConfigMap::new(),
            devices: DeviceMap::new(),
        }
    }
}

/// Remote-side status of a storage pool or network
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceStatus(pub String);

impl ResourceStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// Not yet created on every cluster member
    pub fn is_pending(&self) -> bool {
        self.0.eq_ignore_ascii_case("pending")
    }
}

/// Storage pool as listed by a remote cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStoragePool {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub status: ResourceStatus,
}

/// Network as listed by a remote cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNetwork {
    pub name: String,
    #[serde(rename = "type", default)]
    pub network_type: String,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub status: ResourceStatus,
}

/// Remote storage pools and networks after filtering and local overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledResources {
    pub storage_pools: Vec<StoragePoolSpec>,
    pub networks: Vec<NetworkSpec>,
}

/// Cluster membership settings for a node that forms a new cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapIntent {
    pub server_name: String,
}

/// Cluster membership settings for a node joining an existing cluster.
///
/// Only built from a [`TrustedRemote`], which in turn only exists once the
/// operator confirmed the remote fingerprint and trust was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinIntent {
    server_name: String,
    remote: TrustedRemote,
    resources: ReconciledResources,
}

impl JoinIntent {
    pub(crate) fn new(
        server_name: String,
        remote: TrustedRemote,
        resources: ReconciledResources,
    ) -> Self {
        Self {
            server_name,
            remote,
            resources,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn cluster_address(&self) -> &str {
        self.remote.address()
    }

    pub fn cluster_certificate(&self) -> &str {
        self.remote.certificate_pem()
    }

    pub fn fingerprint(&self) -> &str {
        self.remote.fingerprint()
    }

    pub fn resources(&self) -> &ReconciledResources {
        &self.resources
    }
}

/// How this node relates to a cluster
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClusterIntent {
    #[default]
    Standalone,
    Bootstrap(BootstrapIntent),
    Join(JoinIntent),
}

impl ClusterIntent {
    pub fn is_standalone(&self) -> bool {
        matches!(self, ClusterIntent::Standalone)
    }

    pub fn is_join(&self) -> bool {
        matches!(self, ClusterIntent::Join(_))
    }

    pub fn is_clustered(&self) -> bool {
        !self.is_standalone()
    }
}

impl Serialize for ClusterIntent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClusterIntent::Standalone => serializer.serialize_none(),
            ClusterIntent::Bootstrap(bootstrap) => {
                let mut state = serializer.serialize_struct("cluster", 2)?;
                state.serialize_field("server_name", &bootstrap.server_name)?;
                state.serialize_field("enabled", &true)?;
                state.end()
            }
            ClusterIntent::Join(join) => {
                let mut state = serializer.serialize_struct("cluster", 5)?;
                state.serialize_field("server_name", join.server_name())?;
                state.serialize_field("enabled", &true)?;
                state.serialize_field("cluster_address", join.cluster_address())?;
                state.serialize_field("cluster_certificate", join.cluster_certificate())?;
                state.serialize_field("cluster_password", join.remote.credential().expose())?;
                state.end()
            }
        }
    }
}

/// The complete configuration handed to the submission routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitConfig {
    pub config: ConfigMap,
    pub networks: Vec<NetworkSpec>,
    pub storage_pools: Vec<StoragePoolSpec>,
    profiles: Vec<Profile>,
    #[serde(skip_serializing_if = "ClusterIntent::is_standalone")]
    pub cluster: ClusterIntent,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl InitConfig {
    /// An empty configuration holding only the default profile
    pub fn new() -> Self {
        Self {
            config: ConfigMap::new(),
            networks: Vec::new(),
            storage_pools: Vec::new(),
            profiles: vec![Profile::default_profile()],
            cluster: ClusterIntent::Standalone,
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn default_profile(&self) -> &Profile {
        &self.profiles[0]
    }

    pub fn default_profile_mut(&mut self) -> &mut Profile {
        &mut self.profiles[0]
    }

    /// Insert or replace a device on the default profile
    pub fn set_device(&mut self, name: &str, device: ConfigMap) {
        self.default_profile_mut()
            .devices
            .insert(name.to_string(), device);
    }

    pub fn device(&self, name: &str) -> Option<&ConfigMap> {
        self.default_profile().devices.get(name)
    }

    pub fn has_storage_pool(&self, name: &str) -> bool {
        self.storage_pools.iter().any(|pool| pool.name == name)
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.iter().any(|network| network.name == name)
    }

    /// An external resource-management (MAAS) endpoint has been configured
    pub fn maas_configured(&self) -> bool {
        self.config
            .get("maas.api.url")
            .map_or(false, |url| !url.is_empty())
    }

    /// Record a successful join: the inherited resources become this node's
    /// storage pools and networks.
    pub fn install_join(&mut self, join: JoinIntent) {
        self.storage_pools = join.resources.storage_pools.clone();
        self.networks = join.resources.networks.clone();
        self.cluster = ClusterIntent::Join(join);
    }

    /// Check the cross-entity invariants before hand-off
    pub fn validate(&self) -> PreseedResult<()> {
        crate::validation::validate_init_config(self)
    }

    /// Render as preseed YAML
    pub fn to_yaml(&self) -> PreseedResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Build a device map entry from string pairs
pub fn device<const N: usize>(pairs: [(&str, &str); N]) -> ConfigMap {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
