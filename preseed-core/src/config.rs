//! Planner configuration
//!
//! Defaults for every value the wizard proposes to the operator. Values can
//! be loaded from a TOML file and are then overridden by environment
//! variables, so the same binary can target different daemon layouts.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PreseedError, PreseedResult};

/// Parse an environment variable as a typed value with a default fallback
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Complete planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Daemon data directory (backing filesystem, free space, certificates)
    pub data_dir: PathBuf,

    /// Unix socket of the local daemon, derived from `data_dir` when unset
    pub unix_socket: Option<PathBuf>,

    /// Management port appended to addresses given without one
    pub default_port: u16,

    /// Proposed name for a new bridge
    pub default_bridge: String,

    /// Proposed name for a standalone storage pool
    pub default_pool: String,

    /// Node name used when the hostname cannot be read
    pub fallback_server_name: String,

    /// Loop device sizing bounds
    pub loop_size: LoopSizeConfig,

    /// Defaults offered for ceph pools
    pub ceph: CephDefaults,
}

/// Bounds (in GB) applied to the proposed loop device size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSizeConfig {
    pub min_gb: u64,
    pub max_gb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CephDefaults {
    pub cluster_name: String,
    pub osd_pool_name: String,
    pub pg_num: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/lxd"),
            unix_socket: None,
            default_port: 8443,
            default_bridge: "lxdbr0".to_string(),
            default_pool: "default".to_string(),
            fallback_server_name: "lxd".to_string(),
            loop_size: LoopSizeConfig::default(),
            ceph: CephDefaults::default(),
        }
    }
}

impl Default for LoopSizeConfig {
    fn default() -> Self {
        Self {
            min_gb: 15,
            max_gb: 100,
        }
    }
}

impl Default for CephDefaults {
    fn default() -> Self {
        Self {
            cluster_name: "ceph".to_string(),
            osd_pool_name: "lxd".to_string(),
            pg_num: 32,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> PreseedResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PreseedError::InvalidConfiguration {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: PlannerConfig = toml::from_str(&contents)?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> PreseedResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default().with_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply `PRESEED_*` environment variables on top of the current values
    pub fn with_env_overrides(mut self) -> Self {
        self.data_dir = env_var_or_default("PRESEED_DATA_DIR", self.data_dir);
        if let Ok(socket) = env::var("PRESEED_SOCKET") {
            self.unix_socket = Some(PathBuf::from(socket));
        }
        self.default_port = env_var_or_default("PRESEED_DEFAULT_PORT", self.default_port);
        self.default_bridge = env_var_or_default("PRESEED_DEFAULT_BRIDGE", self.default_bridge);
        self
    }

    /// Effective unix socket path of the local daemon
    pub fn socket_path(&self) -> PathBuf {
        self.unix_socket
            .clone()
            .unwrap_or_else(|| self.data_dir.join("unix.socket"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> PreseedResult<()> {
        if self.default_port == 0 {
            return Err(PreseedError::Validation {
                field: "default_port".to_string(),
                message: "must be between 1 and 65535".to_string(),
            });
        }

        if self.loop_size.min_gb == 0 {
            return Err(PreseedError::Validation {
                field: "loop_size.min_gb".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.loop_size.min_gb > self.loop_size.max_gb {
            return Err(PreseedError::Validation {
                field: "loop_size".to_string(),
                message: format!(
                    "min_gb ({}) exceeds max_gb ({})",
                    self.loop_size.min_gb, self.loop_size.max_gb
                ),
            });
        }

        if self.default_bridge.is_empty() {
            return Err(PreseedError::Validation {
                field: "default_bridge".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.default_pool.is_empty() {
            return Err(PreseedError::Validation {
                field: "default_pool".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> PreseedResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
