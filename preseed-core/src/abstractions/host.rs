//! Host introspection abstractions for testability
//!
//! Everything the planners need to know about the machine they run on:
//! hostname, data directory filesystem, interfaces, block devices, tools on
//! the execution path and uid/gid delegation.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};

use nix::net::if_::InterfaceFlags;
use tracing::debug;

use crate::error::{PreseedError, PreseedResult};
use crate::idmap::{self, IdmapCapacity};

/// Abstraction for host state lookups
pub trait HostProbe: Send + Sync {
    /// Host name of this machine
    fn hostname(&self) -> PreseedResult<String>;

    /// Filesystem type backing `path` (`btrfs`, `zfs`, `ext4`, ...)
    fn filesystem_type(&self, path: &Path) -> PreseedResult<String>;

    /// Bytes available to unprivileged users on the filesystem backing `path`
    fn free_space_bytes(&self, path: &Path) -> PreseedResult<u64>;

    /// Whether a network interface with this name exists
    fn interface_exists(&self, name: &str) -> bool;

    /// Whether the interface exposes bridge state
    fn interface_is_bridge(&self, name: &str) -> bool;

    /// Whether `path` resolves to a block device
    fn is_block_device(&self, path: &Path) -> bool;

    /// Locate an executable on the execution path
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// First routable address of a non-loopback interface
    fn default_address(&self) -> Option<IpAddr>;

    /// uid/gid ranges delegated to the daemon and whether they can be mapped
    fn idmap_capacity(&self) -> PreseedResult<IdmapCapacity>;

    /// Whether this process runs inside a user namespace
    fn running_in_user_namespace(&self) -> bool;
}

// Production implementation backed by the running kernel

const BTRFS_SUPER_MAGIC: u64 = 0x9123_683e;
const ZFS_SUPER_MAGIC: u64 = 0x2fc1_2fc1;
const XFS_SUPER_MAGIC: u64 = 0x5846_5342;
const EXT4_SUPER_MAGIC: u64 = 0xef53;
const TMPFS_MAGIC: u64 = 0x0102_1994;
const NFS_SUPER_MAGIC: u64 = 0x6969;
const CEPH_SUPER_MAGIC: u64 = 0x00c3_6400;

fn filesystem_name(magic: u64) -> String {
    match magic {
        BTRFS_SUPER_MAGIC => "btrfs".to_string(),
        ZFS_SUPER_MAGIC => "zfs".to_string(),
        XFS_SUPER_MAGIC => "xfs".to_string(),
        EXT4_SUPER_MAGIC => "ext4".to_string(),
        TMPFS_MAGIC => "tmpfs".to_string(),
        NFS_SUPER_MAGIC => "nfs".to_string(),
        CEPH_SUPER_MAGIC => "ceph".to_string(),
        other => format!("{:#x}", other),
    }
}

/// Production host probe
pub struct SystemHost {
    /// Owner of the delegated uid/gid ranges
    idmap_user: String,
}

impl SystemHost {
    /// Create new instance
    pub fn new() -> Self {
        Self {
            idmap_user: "root".to_string(),
        }
    }

    fn probe_error(operation: &str, path: &Path, err: impl std::fmt::Display) -> PreseedError {
        PreseedError::HostProbe {
            operation: operation.to_string(),
            details: format!("{}: {}", path.display(), err),
        }
    }

    fn valid_interface_name(name: &str) -> bool {
        !name.is_empty() && !name.contains('/') && name != "." && name != ".."
    }

    fn read_optional(path: &str) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SystemHost {
    fn hostname(&self) -> PreseedResult<String> {
        let name = nix::unistd::gethostname().map_err(|e| PreseedError::HostProbe {
            operation: "hostname".to_string(),
            details: e.to_string(),
        })?;
        Ok(name.to_string_lossy().into_owned())
    }

    fn filesystem_type(&self, path: &Path) -> PreseedResult<String> {
        let stat = nix::sys::statfs::statfs(path)
            .map_err(|e| Self::probe_error("statfs", path, e))?;
        let magic = (stat.filesystem_type().0 as u64) & 0xffff_ffff;
        Ok(filesystem_name(magic))
    }

    fn free_space_bytes(&self, path: &Path) -> PreseedResult<u64> {
        let stat = nix::sys::statvfs::statvfs(path)
            .map_err(|e| Self::probe_error("statvfs", path, e))?;
        Ok((stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64))
    }

    fn interface_exists(&self, name: &str) -> bool {
        Self::valid_interface_name(name) && Path::new("/sys/class/net").join(name).exists()
    }

    fn interface_is_bridge(&self, name: &str) -> bool {
        Self::valid_interface_name(name)
            && Path::new("/sys/class/net").join(name).join("bridge").exists()
    }

    fn is_block_device(&self, path: &Path) -> bool {
        use std::os::unix::fs::FileTypeExt;

        fs::metadata(path)
            .map(|metadata| metadata.file_type().is_block_device())
            .unwrap_or(false)
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let search_path = env::var_os("PATH")?;
        env::split_paths(&search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| {
                fs::metadata(candidate)
                    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                    .unwrap_or(false)
            })
    }

    fn default_address(&self) -> Option<IpAddr> {
        let addresses = match nix::ifaddrs::getifaddrs() {
            Ok(addresses) => addresses,
            Err(e) => {
                debug!("Failed to list interface addresses: {}", e);
                return None;
            }
        };

        let mut fallback_v6 = None;
        for ifaddr in addresses {
            if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK) {
                continue;
            }
            let Some(address) = ifaddr.address else {
                continue;
            };

            if let Some(sin) = address.as_sockaddr_in() {
                let ip = *SocketAddrV4::from(*sin).ip();
                if !ip.is_loopback() && !ip.is_link_local() && !ip.is_unspecified() {
                    return Some(IpAddr::V4(ip));
                }
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                let ip = *SocketAddrV6::from(*sin6).ip();
                let link_local = ip.segments()[0] & 0xffc0 == 0xfe80;
                if fallback_v6.is_none() && !ip.is_loopback() && !link_local && !ip.is_unspecified() {
                    fallback_v6 = Some(IpAddr::V6(ip));
                }
            }
        }

        fallback_v6
    }

    fn idmap_capacity(&self) -> PreseedResult<IdmapCapacity> {
        let subuid = fs::read_to_string("/etc/subuid")?;
        let subgid = fs::read_to_string("/etc/subgid")?;

        let uid_ranges = idmap::parse_subid(&subuid, &self.idmap_user);
        let gid_ranges = idmap::parse_subid(&subgid, &self.idmap_user);

        let kernel_uids = idmap::parse_kernel_map(&Self::read_optional("/proc/self/uid_map"));
        let kernel_gids = idmap::parse_kernel_map(&Self::read_optional("/proc/self/gid_map"));
        let usable = idmap::ranges_usable(&uid_ranges, &kernel_uids)
            && idmap::ranges_usable(&gid_ranges, &kernel_gids);

        Ok(IdmapCapacity {
            uid_ranges,
            gid_ranges,
            usable,
        })
    }

    fn running_in_user_namespace(&self) -> bool {
        match fs::read_to_string("/proc/self/uid_map") {
            Ok(content) => !idmap::is_initial_namespace_map(&content),
            Err(_) => false,
        }
    }
}

// Mock implementation for testing

/// Mock host for testing
#[derive(Debug, Clone)]
pub struct MockHost {
    hostname: Option<String>,
    filesystem: Option<String>,
    free_space: Option<u64>,
    interfaces: HashMap<String, bool>,
    block_devices: HashSet<PathBuf>,
    executables: HashSet<String>,
    address: Option<IpAddr>,
    idmap: Option<IdmapCapacity>,
    user_namespace: bool,
}

impl MockHost {
    /// A host named `node1` on ext4 with 100GB free and no optional tools
    pub fn new() -> Self {
        Self {
            hostname: Some("node1".to_string()),
            filesystem: Some("ext4".to_string()),
            free_space: Some(100 * 1024 * 1024 * 1024),
            interfaces: HashMap::new(),
            block_devices: HashSet::new(),
            executables: HashSet::new(),
            address: Some(IpAddr::from([192, 168, 1, 10])),
            idmap: None,
            user_namespace: false,
        }
    }

    pub fn with_hostname(mut self, hostname: Option<&str>) -> Self {
        self.hostname = hostname.map(str::to_string);
        self
    }

    /// `None` makes filesystem detection fail
    pub fn with_filesystem(mut self, filesystem: Option<&str>) -> Self {
        self.filesystem = filesystem.map(str::to_string);
        self
    }

    pub fn with_free_space(mut self, bytes: Option<u64>) -> Self {
        self.free_space = bytes;
        self
    }

    pub fn with_interface(mut self, name: &str, is_bridge: bool) -> Self {
        self.interfaces.insert(name.to_string(), is_bridge);
        self
    }

    pub fn with_block_device(mut self, path: &str) -> Self {
        self.block_devices.insert(PathBuf::from(path));
        self
    }

    pub fn with_executable(mut self, name: &str) -> Self {
        self.executables.insert(name.to_string());
        self
    }

    pub fn with_address(mut self, address: Option<IpAddr>) -> Self {
        self.address = address;
        self
    }

    pub fn with_idmap(mut self, idmap: Option<IdmapCapacity>) -> Self {
        self.idmap = idmap;
        self
    }

    pub fn with_user_namespace(mut self, inside: bool) -> Self {
        self.user_namespace = inside;
        self
    }

    fn missing(operation: &str) -> PreseedError {
        PreseedError::HostProbe {
            operation: operation.to_string(),
            details: "not available on mock host".to_string(),
        }
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for MockHost {
    fn hostname(&self) -> PreseedResult<String> {
        self.hostname.clone().ok_or_else(|| Self::missing("hostname"))
    }

    fn filesystem_type(&self, _path: &Path) -> PreseedResult<String> {
        self.filesystem.clone().ok_or_else(|| Self::missing("statfs"))
    }

    fn free_space_bytes(&self, _path: &Path) -> PreseedResult<u64> {
        self.free_space.ok_or_else(|| Self::missing("statvfs"))
    }

    fn interface_exists(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    fn interface_is_bridge(&self, name: &str) -> bool {
        self.interfaces.get(name).copied().unwrap_or(false)
    }

    fn is_block_device(&self, path: &Path) -> bool {
        self.block_devices.contains(path)
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    fn default_address(&self) -> Option<IpAddr> {
        self.address
    }

    fn idmap_capacity(&self) -> PreseedResult<IdmapCapacity> {
        self.idmap.clone().ok_or_else(|| Self::missing("idmap"))
    }

    fn running_in_user_namespace(&self) -> bool {
        self.user_namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_names() {
        assert_eq!(filesystem_name(BTRFS_SUPER_MAGIC), "btrfs");
        assert_eq!(filesystem_name(ZFS_SUPER_MAGIC), "zfs");
        assert_eq!(filesystem_name(0x1234), "0x1234");
    }

    #[test]
    fn test_system_host_rejects_path_like_interface_names() {
        let host = SystemHost::new();
        assert!(!host.interface_exists("../../etc"));
        assert!(!host.interface_exists(""));
    }

    #[test]
    fn test_system_host_root_filesystem_is_probeable() {
        let host = SystemHost::new();
        assert!(host.filesystem_type(Path::new("/")).is_ok());
        assert!(host.free_space_bytes(Path::new("/")).is_ok());
        assert!(!host.is_block_device(Path::new("/")));
    }

    #[test]
    fn test_mock_host_builder() {
        let host = MockHost::new()
            .with_interface("br0", true)
            .with_interface("eth1", false)
            .with_executable("zfs")
            .with_block_device("/dev/sdb");

        assert!(host.interface_is_bridge("br0"));
        assert!(!host.interface_is_bridge("eth1"));
        assert!(host.interface_exists("eth1"));
        assert!(!host.interface_exists("eth2"));
        assert!(host.find_executable("zfs").is_some());
        assert!(host.find_executable("btrfs").is_none());
        assert!(host.is_block_device(Path::new("/dev/sdb")));
        assert!(host.idmap_capacity().is_err());
    }
}
