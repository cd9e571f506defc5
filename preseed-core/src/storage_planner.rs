//! Storage pool planning for nodes that create their own pools
//!
//! Driver discovery, default selection and loop sizing are plain functions
//! so they can be property tested; [`StoragePoolPlanner`] wires them to the
//! operator questions.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::abstractions::{HostProbe, LocalInventory, Prompter};
use crate::config::{LoopSizeConfig, PlannerConfig};
use crate::error::{PreseedError, PreseedResult};
use crate::types::{device, InitConfig, StoragePoolSpec, ROOT_DEVICE};

const GIB: u64 = 1024 * 1024 * 1024;

/// Companion tool whose absence disables LVM thin provisioning
pub const THIN_PROVISIONING_TOOL: &str = "thin_check";

const THIN_PROVISIONING_WARNING: &str = "\
The LVM thin provisioning tools couldn't be found. LVM can still be used
without thin provisioning but this will disable over-provisioning,
increase the space requirements and creation time of images, containers
and snapshots.

If you wish to use thin provisioning, abort now, install the tools from
your Linux distribution and run the wizard again afterwards.";

/// Storage drivers the planner can create pools for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageDriver {
    Dir,
    Btrfs,
    Lvm,
    Zfs,
    Ceph,
}

impl StorageDriver {
    /// Every driver, in the order candidates are offered
    pub const ALL: [StorageDriver; 5] = [
        StorageDriver::Dir,
        StorageDriver::Btrfs,
        StorageDriver::Lvm,
        StorageDriver::Zfs,
        StorageDriver::Ceph,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StorageDriver::Dir => "dir",
            StorageDriver::Btrfs => "btrfs",
            StorageDriver::Lvm => "lvm",
            StorageDriver::Zfs => "zfs",
            StorageDriver::Ceph => "ceph",
        }
    }

    /// Userspace tool that must be on the execution path
    pub fn tool(&self) -> Option<&'static str> {
        match self {
            StorageDriver::Dir => None,
            StorageDriver::Btrfs => Some("btrfs"),
            StorageDriver::Lvm => Some("lvm"),
            StorageDriver::Zfs => Some("zfs"),
            StorageDriver::Ceph => Some("ceph"),
        }
    }

    /// Networked storage without per-node identity
    pub fn is_cluster_shared(&self) -> bool {
        matches!(self, StorageDriver::Ceph)
    }

    /// Config keys a new pool of this driver may carry
    pub fn known_keys(&self) -> &'static [&'static str] {
        match self {
            StorageDriver::Dir => &["source", "rsync.bwlimit"],
            StorageDriver::Btrfs => &["source", "size", "btrfs.mount_options", "rsync.bwlimit"],
            StorageDriver::Lvm => &[
                "source",
                "size",
                "lvm.use_thinpool",
                "lvm.thinpool_name",
                "lvm.vg_name",
                "rsync.bwlimit",
            ],
            StorageDriver::Zfs => &["source", "size", "zfs.pool_name", "zfs.clone_copy", "rsync.bwlimit"],
            StorageDriver::Ceph => &[
                "source",
                "ceph.cluster_name",
                "ceph.osd.pool_name",
                "ceph.osd.pg_num",
                "ceph.osd.force_reuse",
                "ceph.user.name",
            ],
        }
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StorageDriver {
    type Err = PreseedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageDriver::ALL
            .into_iter()
            .find(|driver| driver.name() == s)
            .ok_or_else(|| PreseedError::Validation {
                field: "driver".to_string(),
                message: format!("unknown storage driver '{}'", s),
            })
    }
}

/// What a new pool is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRole {
    /// The single pool of a node outside any cluster; freely named
    Standalone,
    /// Per-node pool of a new cluster, named `local`
    LocalInCluster,
    /// Shared pool of a new cluster, named `remote`
    RemoteInCluster,
}

impl PoolRole {
    /// Name imposed by the role, if any
    pub fn fixed_name(&self) -> Option<&'static str> {
        match self {
            PoolRole::Standalone => None,
            PoolRole::LocalInCluster => Some("local"),
            PoolRole::RemoteInCluster => Some("remote"),
        }
    }

    fn allows(&self, driver: StorageDriver) -> bool {
        match self {
            PoolRole::Standalone => true,
            PoolRole::LocalInCluster => !driver.is_cluster_shared(),
            PoolRole::RemoteInCluster => driver.is_cluster_shared(),
        }
    }
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolRole::Standalone => f.write_str("usable"),
            PoolRole::LocalInCluster => f.write_str("local"),
            PoolRole::RemoteInCluster => f.write_str("remote"),
        }
    }
}

/// Drivers that can back a pool of `role` on this host, in offer order.
///
/// Inside a user namespace only `dir` and, on a btrfs data directory,
/// `btrfs` can work.
pub fn available_drivers(
    role: PoolRole,
    host: &dyn HostProbe,
    backing_fs: Option<&str>,
) -> Vec<StorageDriver> {
    let in_userns = host.running_in_user_namespace();

    StorageDriver::ALL
        .into_iter()
        .filter(|driver| role.allows(*driver))
        .filter(|driver| {
            if in_userns {
                return match driver {
                    StorageDriver::Dir => true,
                    StorageDriver::Btrfs => backing_fs == Some("btrfs"),
                    _ => false,
                };
            }
            driver
                .tool()
                .map_or(true, |tool| host.find_executable(tool).is_some())
        })
        .collect()
}

/// Proposed driver: one matching the backing filesystem, then zfs, btrfs,
/// dir, then whatever comes first.
pub fn default_driver(candidates: &[StorageDriver], backing_fs: Option<&str>) -> Option<StorageDriver> {
    if let Some(fs) = backing_fs {
        if let Some(driver) = candidates.iter().find(|driver| driver.name() == fs) {
            return Some(*driver);
        }
    }

    [StorageDriver::Zfs, StorageDriver::Btrfs, StorageDriver::Dir]
        .into_iter()
        .find(|preferred| candidates.contains(preferred))
        .or_else(|| candidates.first().copied())
}

/// Proposed loop device size: a fifth of the free space, clamped to bounds
pub fn default_loop_size_gb(free_bytes: u64, bounds: &LoopSizeConfig) -> u64 {
    let raw = free_bytes / GIB / 5;
    raw.clamp(bounds.min_gb, bounds.max_gb)
}

/// Plans one storage pool per call
pub struct StoragePoolPlanner<'a> {
    host: &'a dyn HostProbe,
    inventory: &'a dyn LocalInventory,
    settings: &'a PlannerConfig,
}

impl<'a> StoragePoolPlanner<'a> {
    pub fn new(
        host: &'a dyn HostProbe,
        inventory: &'a dyn LocalInventory,
        settings: &'a PlannerConfig,
    ) -> Self {
        Self {
            host,
            inventory,
            settings,
        }
    }

    /// Plan a pool for `role`, add it to `config` and point the default
    /// profile's root disk at it.
    pub async fn plan(
        &self,
        role: PoolRole,
        config: &mut InitConfig,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<StoragePoolSpec> {
        // An undetectable filesystem matches no driver
        let backing_fs = match self.host.filesystem_type(&self.settings.data_dir) {
            Ok(fs) => Some(fs),
            Err(e) => {
                debug!("Backing filesystem detection failed: {}", e);
                None
            }
        };

        let candidates = available_drivers(role, self.host, backing_fs.as_deref());
        let Some(default) = default_driver(&candidates, backing_fs.as_deref()) else {
            return Err(PreseedError::NoStorageBackend {
                role: role.to_string(),
            });
        };
        debug!(
            "Storage candidates for {} pool: {:?}, default {}",
            role, candidates, default
        );

        let name = self.choose_name(role, config, prompter).await?;

        let driver = if candidates.len() > 1 {
            let choices: Vec<String> = candidates.iter().map(|d| d.name().to_string()).collect();
            let question = format!(
                "Name of the storage backend to use ({}) [default={}]: ",
                choices.join(", "),
                default
            );
            prompter
                .ask_choice(&question, &choices, default.name())?
                .parse::<StorageDriver>()?
        } else {
            default
        };

        let mut pool = StoragePoolSpec::new(name, driver.name());
        self.configure_source(driver, backing_fs.as_deref(), &mut pool, prompter)?;

        if driver == StorageDriver::Lvm && self.host.find_executable(THIN_PROVISIONING_TOOL).is_none() {
            warn!("{} not found, LVM thin provisioning unavailable", THIN_PROVISIONING_TOOL);
            prompter.say(THIN_PROVISIONING_WARNING);
            if !prompter.ask_bool(
                "Do you want to continue without thin provisioning? (yes/no) [default=yes]: ",
                true,
            )? {
                return Err(PreseedError::ThinProvisioningUnavailable);
            }
            pool.config
                .insert("lvm.use_thinpool".to_string(), "false".to_string());
        }

        config.set_device(
            ROOT_DEVICE,
            device([("type", "disk"), ("path", "/"), ("pool", pool.name.as_str())]),
        );
        config.storage_pools.push(pool.clone());
        info!("Planned {} storage pool {} ({})", role, pool.name, pool.driver);

        Ok(pool)
    }

    /// A failed lookup against the local daemon counts as a free name
    async fn name_taken(&self, name: &str, config: &InitConfig) -> bool {
        if config.has_storage_pool(name) {
            return true;
        }
        match self.inventory.storage_pool_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!("Storage pool lookup for {} failed: {}", name, e);
                false
            }
        }
    }

    async fn choose_name(
        &self,
        role: PoolRole,
        config: &InitConfig,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<String> {
        if let Some(name) = role.fixed_name() {
            if self.name_taken(name, config).await {
                return Err(PreseedError::PoolAlreadyExists {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        let default = &self.settings.default_pool;
        let question = format!("Name of the new storage pool [default={}]: ", default);
        loop {
            let name = prompter.ask_string(&question, default, None)?;
            if !self.name_taken(&name, config).await {
                return Ok(name);
            }
            prompter.say(&format!(
                "The requested storage pool \"{}\" already exists. Please choose another name.",
                name
            ));
        }
    }

    fn configure_source(
        &self,
        driver: StorageDriver,
        backing_fs: Option<&str>,
        pool: &mut StoragePoolSpec,
        prompter: &mut dyn Prompter,
    ) -> PreseedResult<()> {
        if driver == StorageDriver::Dir {
            return Ok(());
        }

        let data_dir = &self.settings.data_dir;
        if driver == StorageDriver::Btrfs && backing_fs == Some("btrfs") {
            let question = format!(
                "Would you like to create a new btrfs subvolume under {} (yes/no) [default=yes]: ",
                data_dir.display()
            );
            if prompter.ask_bool(&question, true)? {
                let source = data_dir.join("storage-pools").join(&pool.name);
                set(pool, "source", &source.to_string_lossy());
                return Ok(());
            }
        }

        let label = driver.name().to_uppercase();
        let create = prompter.ask_bool(
            &format!("Create a new {} pool (yes/no) [default=yes]? ", label),
            true,
        )?;

        match (create, driver) {
            (true, StorageDriver::Ceph) => {
                let ceph = &self.settings.ceph;
                let cluster = prompter.ask_string(
                    &format!("Name of the existing CEPH cluster [default={}]: ", ceph.cluster_name),
                    &ceph.cluster_name,
                    None,
                )?;
                let osd_pool = prompter.ask_string(
                    &format!("Name of the OSD storage pool [default={}]: ", ceph.osd_pool_name),
                    &ceph.osd_pool_name,
                    None,
                )?;
                let pg_num = prompter.ask_int(
                    &format!("Number of placement groups [default={}]: ", ceph.pg_num),
                    1,
                    None,
                    i64::from(ceph.pg_num),
                )?;
                set(pool, "ceph.cluster_name", &cluster);
                set(pool, "ceph.osd.pool_name", &osd_pool);
                set(pool, "ceph.osd.pg_num", &pg_num.to_string());
            }
            (true, _) => {
                if prompter.ask_bool(
                    "Would you like to use an existing block device (yes/no) [default=no]? ",
                    false,
                )? {
                    let host = self.host;
                    let is_block_device = move |path: &str| -> Result<(), String> {
                        if host.is_block_device(Path::new(path)) {
                            Ok(())
                        } else {
                            Err(format!("'{}' is not a block device", path))
                        }
                    };
                    let source = prompter.ask_string(
                        "Path to the existing block device: ",
                        "",
                        Some(&is_block_device),
                    )?;
                    set(pool, "source", &source);
                } else {
                    let free = self.host.free_space_bytes(data_dir)?;
                    let default = default_loop_size_gb(free, &self.settings.loop_size);
                    let size = prompter.ask_int(
                        &format!(
                            "Size in GB of the new loop device (1GB minimum) [default={}GB]: ",
                            default
                        ),
                        1,
                        None,
                        default as i64,
                    )?;
                    set(pool, "size", &format!("{}GB", size));
                }
            }
            (false, StorageDriver::Ceph) => {
                let ceph = &self.settings.ceph;
                let cluster = prompter.ask_string(
                    &format!("Name of the existing CEPH cluster [default={}]: ", ceph.cluster_name),
                    &ceph.cluster_name,
                    None,
                )?;
                let osd_pool = prompter.ask_string(
                    &format!(
                        "Name of the existing OSD storage pool [default={}]: ",
                        ceph.osd_pool_name
                    ),
                    &ceph.osd_pool_name,
                    None,
                )?;
                set(pool, "ceph.cluster_name", &cluster);
                set(pool, "source", &osd_pool);
                set(pool, "ceph.osd.pool_name", &osd_pool);
            }
            (false, _) => {
                let source = prompter.ask_string(
                    &format!("Name of the existing {} pool or dataset: ", label),
                    "",
                    None,
                )?;
                set(pool, "source", &source);
            }
        }

        Ok(())
    }
}

fn set(pool: &mut StoragePoolSpec, key: &str, value: &str) {
    pool.config.insert(key.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::{MockHost, MockInventory, ScriptedPrompter};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn drivers(names: &[&str]) -> Vec<StorageDriver> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn test_driver_names_round_trip() {
        for driver in StorageDriver::ALL {
            assert_eq!(driver.name().parse::<StorageDriver>().unwrap(), driver);
        }
        assert!("cephfs".parse::<StorageDriver>().is_err());
    }

    #[test]
    fn test_available_drivers_by_role() {
        let host = MockHost::new()
            .with_executable("btrfs")
            .with_executable("zfs")
            .with_executable("ceph");

        assert_eq!(
            available_drivers(PoolRole::Standalone, &host, Some("ext4")),
            drivers(&["dir", "btrfs", "zfs", "ceph"])
        );
        assert_eq!(
            available_drivers(PoolRole::LocalInCluster, &host, Some("ext4")),
            drivers(&["dir", "btrfs", "zfs"])
        );
        assert_eq!(
            available_drivers(PoolRole::RemoteInCluster, &host, Some("ext4")),
            drivers(&["ceph"])
        );
        assert!(available_drivers(PoolRole::RemoteInCluster, &MockHost::new(), None).is_empty());
    }

    #[test]
    fn test_user_namespace_restricts_drivers() {
        let host = MockHost::new()
            .with_user_namespace(true)
            .with_executable("btrfs")
            .with_executable("zfs");

        assert_eq!(
            available_drivers(PoolRole::Standalone, &host, Some("btrfs")),
            drivers(&["dir", "btrfs"])
        );
        assert_eq!(
            available_drivers(PoolRole::Standalone, &host, Some("ext4")),
            drivers(&["dir"])
        );
    }

    #[test]
    fn test_default_driver_priority() {
        let all = drivers(&["dir", "btrfs", "lvm", "zfs"]);
        assert_eq!(default_driver(&all, Some("btrfs")), Some(StorageDriver::Btrfs));
        assert_eq!(default_driver(&all, Some("ext4")), Some(StorageDriver::Zfs));
        assert_eq!(default_driver(&all, None), Some(StorageDriver::Zfs));
        assert_eq!(
            default_driver(&drivers(&["dir", "btrfs"]), Some("xfs")),
            Some(StorageDriver::Btrfs)
        );
        assert_eq!(default_driver(&drivers(&["dir", "lvm"]), None), Some(StorageDriver::Dir));
        assert_eq!(default_driver(&drivers(&["ceph"]), None), Some(StorageDriver::Ceph));
        assert_eq!(default_driver(&[], Some("btrfs")), None);
    }

    #[test]
    fn test_loop_size_clamp() {
        let bounds = LoopSizeConfig::default();
        assert_eq!(default_loop_size_gb(10 * 5 * GIB, &bounds), 15);
        assert_eq!(default_loop_size_gb(50 * 5 * GIB, &bounds), 50);
        assert_eq!(default_loop_size_gb(500 * 5 * GIB, &bounds), 100);
        assert_eq!(default_loop_size_gb(0, &bounds), 15);
    }

    #[tokio::test]
    async fn test_standalone_dir_pool() {
        let host = MockHost::new();
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new([""]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool, StoragePoolSpec::new("default", "dir"));
        assert_eq!(config.storage_pools, vec![pool]);
        assert_eq!(config.device(ROOT_DEVICE).unwrap()["pool"], "default");
        // A single candidate is used without asking
        assert!(!prompter.asked("storage backend"));
    }

    #[tokio::test]
    async fn test_standalone_name_collision_reprompts() {
        let host = MockHost::new();
        let inventory = MockInventory::new().with_pool("default");
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["", "fast"]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.name, "fast");
        assert!(prompter
            .messages()
            .iter()
            .any(|m| m.contains("\"default\" already exists")));
    }

    #[tokio::test]
    async fn test_fixed_role_collision_is_fatal() {
        let host = MockHost::new();
        let inventory = MockInventory::new().with_pool("local");
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = planner
            .plan(PoolRole::LocalInCluster, &mut config, &mut prompter)
            .await
            .unwrap_err();

        assert!(matches!(err, PreseedError::PoolAlreadyExists { name } if name == "local"));
        assert!(config.storage_pools.is_empty());
    }

    #[tokio::test]
    async fn test_remote_role_without_ceph_is_fatal() {
        let host = MockHost::new();
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let err = planner
            .plan(PoolRole::RemoteInCluster, &mut config, &mut prompter)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No remote storage backends available");
    }

    #[tokio::test]
    async fn test_btrfs_subvolume_on_btrfs() {
        let host = MockHost::new()
            .with_filesystem(Some("btrfs"))
            .with_executable("btrfs");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        // name, driver (default btrfs), subvolume
        let mut prompter = ScriptedPrompter::new(["", "", "yes"]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.driver, "btrfs");
        assert_eq!(pool.config["source"], "/var/lib/lxd/storage-pools/default");
    }

    #[tokio::test]
    async fn test_zfs_loop_size_default() {
        let host = MockHost::new()
            .with_executable("zfs")
            .with_free_space(Some(250 * GIB));
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        // name, driver, create new, no block device, size
        let mut prompter = ScriptedPrompter::new(["", "", "", "", ""]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.driver, "zfs");
        assert_eq!(pool.config["size"], "50GB");
        assert!(prompter.asked("[default=50GB]"));
    }

    #[tokio::test]
    async fn test_block_device_is_validated() {
        let host = MockHost::new()
            .with_executable("zfs")
            .with_block_device("/dev/sdb");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter =
            ScriptedPrompter::new(["", "zfs", "yes", "yes", "/dev/sda", "/dev/sdb"]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.config["source"], "/dev/sdb");
        assert_eq!(
            prompter.rejections(),
            vec![("/dev/sda", "'/dev/sda' is not a block device")]
        );
    }

    #[tokio::test]
    async fn test_existing_ceph_pool() {
        let host = MockHost::new().with_executable("ceph");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["no", "", "containers"]);
        let pool = planner
            .plan(PoolRole::RemoteInCluster, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.name, "remote");
        assert_eq!(pool.config["ceph.cluster_name"], "ceph");
        assert_eq!(pool.config["source"], "containers");
        assert_eq!(pool.config["ceph.osd.pool_name"], "containers");
    }

    #[tokio::test]
    async fn test_new_ceph_pool_defaults() {
        let host = MockHost::new().with_executable("ceph");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["", "", "", ""]);
        let pool = planner
            .plan(PoolRole::RemoteInCluster, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.config["ceph.cluster_name"], "ceph");
        assert_eq!(pool.config["ceph.osd.pool_name"], "lxd");
        assert_eq!(pool.config["ceph.osd.pg_num"], "32");
    }

    #[tokio::test]
    async fn test_undetectable_filesystem_keeps_driver_priority() {
        let host = MockHost::new()
            .with_filesystem(None)
            .with_executable("zfs")
            .with_executable("btrfs");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        // name, backend, new pool, no block device, loop size
        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["", "", "", "", ""]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.driver, "zfs");
        assert_eq!(pool.config["size"], "20GB");
        assert!(prompter.asked("(dir, btrfs, zfs) [default=zfs]"));
        assert!(!prompter.asked("btrfs subvolume"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreachable_inventory_leaves_name_free() {
        let host = MockHost::new();
        let inventory = MockInventory::unreachable("daemon socket missing");
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new([""]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.name, "default");
        assert!(prompter.messages().is_empty());
        assert!(logs_contain("Storage pool lookup for default failed"));
    }

    #[tokio::test]
    async fn test_unreachable_inventory_allows_fixed_name() {
        let host = MockHost::new();
        let inventory = MockInventory::unreachable("daemon socket missing");
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(Vec::<&str>::new());
        let pool = planner
            .plan(PoolRole::LocalInCluster, &mut config, &mut prompter)
            .await
            .unwrap();

        assert_eq!(pool.name, "local");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_lvm_without_thin_tools() {
        let host = MockHost::new().with_executable("lvm");
        let inventory = MockInventory::new();
        let settings = PlannerConfig::default();
        let planner = StoragePoolPlanner::new(&host, &inventory, &settings);

        // existing volume group, then accept degraded mode
        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["", "lvm", "no", "vg0", ""]);
        let pool = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap();
        assert_eq!(pool.config["source"], "vg0");
        assert_eq!(pool.config["lvm.use_thinpool"], "false");
        assert!(logs_contain("thin_check not found"));

        // refusing degraded mode aborts
        let mut config = InitConfig::new();
        let mut prompter = ScriptedPrompter::new(["", "lvm", "no", "vg0", "no"]);
        let err = planner
            .plan(PoolRole::Standalone, &mut config, &mut prompter)
            .await
            .unwrap_err();
        assert!(matches!(err, PreseedError::ThinProvisioningUnavailable));
        assert!(config.storage_pools.is_empty());
        assert!(config.device(ROOT_DEVICE).is_none());
    }
}
