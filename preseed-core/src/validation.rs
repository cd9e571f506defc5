//! Input validators and configuration invariants
//!
//! Validators follow the prompt contract: `Ok(())` accepts the answer,
//! `Err(description)` is shown to the operator before asking again.

use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use crate::address::has_explicit_port;
use crate::error::{PreseedError, PreseedResult};
use crate::storage_planner::StorageDriver;
use crate::types::{InitConfig, DEFAULT_PROFILE, ROOT_DEVICE};

static INTERFACE_NAME: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[-_a-zA-Z0-9.]*$"));

/// Daemon-level keys any planner may write
pub const DAEMON_KEYS: &[&str] = &[
    "core.https_address",
    "core.trust_password",
    "images.auto_update_interval",
    "maas.api.key",
    "maas.api.url",
    "maas.machine",
];

/// Namespaces a network config key may live in
const NETWORK_KEY_NAMESPACES: &[&str] = &[
    "bridge.", "dns.", "fan.", "ipv4.", "ipv6.", "maas.", "raw.", "tunnel.", "user.", "volatile.",
];

/// Namespaces allowed on every storage driver
const STORAGE_SHARED_NAMESPACES: &[&str] = &["user.", "volatile.", "volume."];

/// Accepts anything, including the empty string
pub fn accept_any(_value: &str) -> Result<(), String> {
    Ok(())
}

/// Accepts any non-empty answer
pub fn non_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("A value is required".to_string());
    }
    Ok(())
}

/// Interface names: 2 to 15 characters from `[-_a-zA-Z0-9.]`
pub fn validate_network_name(value: &str) -> Result<(), String> {
    if value.len() < 2 {
        return Err("Interface name is too short (minimum 2 characters)".to_string());
    }

    if value.len() > 15 {
        return Err("Interface name is too long (maximum 15 characters)".to_string());
    }

    let pattern = INTERFACE_NAME
        .as_ref()
        .map_err(|e| format!("Interface name pattern is invalid: {}", e))?;
    if !pattern.is_match(value) {
        return Err("Interface name contains invalid characters".to_string());
    }

    Ok(())
}

/// `auto` and `none` are accepted for every address family
pub fn is_auto_or_none(value: &str) -> bool {
    value == "auto" || value == "none"
}

/// IPv4 CIDR, `auto` or `none`
pub fn validate_ipv4_setting(value: &str) -> Result<(), String> {
    if is_auto_or_none(value) {
        return Ok(());
    }

    Ipv4Net::from_str(value)
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a valid IPv4 CIDR subnet", value))
}

/// IPv6 CIDR, `auto` or `none`
pub fn validate_ipv6_setting(value: &str) -> Result<(), String> {
    if is_auto_or_none(value) {
        return Ok(());
    }

    Ipv6Net::from_str(value)
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a valid IPv6 CIDR subnet", value))
}

/// A literal IP address or `all`
pub fn validate_bind_address(value: &str) -> Result<(), String> {
    if value == "all" || value.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    Err(format!("'{}' is not an IP address", value))
}

/// A host name or IP address, optionally followed by a numeric port
pub fn validate_node_address(value: &str) -> Result<(), String> {
    let address = value.trim();
    if address.is_empty() {
        return Err("An address is required".to_string());
    }

    if has_explicit_port(address) || address.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if let Some(rest) = address.strip_prefix('[') {
        return match rest.strip_suffix(']').map(str::parse::<Ipv6Addr>) {
            Some(Ok(_)) => Ok(()),
            _ => Err(format!("'{}' is not a valid IPv6 address", address)),
        };
    }

    if address.contains(':') {
        return Err(format!("'{}' does not end in a valid port number", address));
    }

    Ok(())
}

/// Whether `key` may be set on a pool using `driver`.
///
/// Drivers this planner does not know (inherited verbatim from a remote
/// cluster member) are not key-checked.
pub fn storage_key_allowed(driver: &str, key: &str) -> bool {
    let Ok(driver) = StorageDriver::from_str(driver) else {
        return true;
    };

    STORAGE_SHARED_NAMESPACES
        .iter()
        .any(|namespace| key.starts_with(namespace))
        || driver.known_keys().contains(&key)
}

pub fn network_key_allowed(key: &str) -> bool {
    NETWORK_KEY_NAMESPACES
        .iter()
        .any(|namespace| key.starts_with(namespace))
}

fn invalid(field: &str, message: String) -> PreseedError {
    PreseedError::Validation {
        field: field.to_string(),
        message,
    }
}

/// Cross-entity checks run before the configuration leaves the assembler
pub fn validate_init_config(config: &InitConfig) -> PreseedResult<()> {
    let profiles = config.profiles();
    if profiles.len() != 1 || profiles[0].name != DEFAULT_PROFILE {
        return Err(invalid(
            "profiles",
            format!("expected exactly one '{}' profile", DEFAULT_PROFILE),
        ));
    }

    for key in config.config.keys() {
        if !DAEMON_KEYS.contains(&key.as_str()) {
            return Err(invalid("config", format!("unknown daemon key '{}'", key)));
        }
    }

    let mut pool_names = HashSet::new();
    for pool in &config.storage_pools {
        if !pool_names.insert(pool.name.as_str()) {
            return Err(invalid(
                "storage_pools",
                format!("duplicate storage pool '{}'", pool.name),
            ));
        }

        // Inherited pools keep whatever keys the cluster already uses
        if config.cluster.is_join() {
            continue;
        }

        for key in pool.config.keys() {
            if !storage_key_allowed(&pool.driver, key) {
                return Err(invalid(
                    "storage_pools",
                    format!(
                        "key '{}' is not valid for {} pool '{}'",
                        key, pool.driver, pool.name
                    ),
                ));
            }
        }
    }

    let mut network_names = HashSet::new();
    for network in &config.networks {
        if !network_names.insert(network.name.as_str()) {
            return Err(invalid(
                "networks",
                format!("duplicate network '{}'", network.name),
            ));
        }

        if config.cluster.is_join() {
            continue;
        }

        for key in network.config.keys() {
            if !network_key_allowed(key) {
                return Err(invalid(
                    "networks",
                    format!("key '{}' is not valid for network '{}'", key, network.name),
                ));
            }
        }
    }

    if !config.cluster.is_join() {
        if let Some(root) = config.device(ROOT_DEVICE) {
            let pool = root.get("pool").map(String::as_str).unwrap_or_default();
            if !config.has_storage_pool(pool) {
                return Err(invalid(
                    "profiles",
                    format!("root disk references unknown storage pool '{}'", pool),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{device, NetworkSpec, StoragePoolSpec};

    #[test]
    fn test_network_name_rules() {
        assert!(validate_network_name("lxdbr0").is_ok());
        assert!(validate_network_name("br-ext.10").is_ok());
        assert!(validate_network_name("a").is_err());
        assert!(validate_network_name("averyveryverylongname").is_err());
        assert!(validate_network_name("br 0").is_err());
        assert!(validate_network_name("br/0").is_err());
    }

    #[test]
    fn test_address_settings() {
        assert!(validate_ipv4_setting("auto").is_ok());
        assert!(validate_ipv4_setting("none").is_ok());
        assert!(validate_ipv4_setting("10.0.0.0/24").is_ok());
        assert!(validate_ipv4_setting("10.0.0.1/24").is_ok());
        assert!(validate_ipv4_setting("10.0.0.1").is_err());
        assert!(validate_ipv4_setting("fd00::1/64").is_err());

        assert!(validate_ipv6_setting("fd42::1/64").is_ok());
        assert!(validate_ipv6_setting("auto").is_ok());
        assert!(validate_ipv6_setting("10.0.0.0/24").is_err());
    }

    #[test]
    fn test_bind_address() {
        assert!(validate_bind_address("all").is_ok());
        assert!(validate_bind_address("127.0.0.1").is_ok());
        assert!(validate_bind_address("::1").is_ok());
        assert!(validate_bind_address("localhost").is_err());
    }

    #[test]
    fn test_node_address() {
        assert!(validate_node_address("10.0.0.1").is_ok());
        assert!(validate_node_address("10.0.0.1:9443").is_ok());
        assert!(validate_node_address("node1.example.com").is_ok());
        assert!(validate_node_address("fd00::1").is_ok());
        assert!(validate_node_address("[fd00::1]").is_ok());
        assert!(validate_node_address("[fd00::1]:8443").is_ok());

        assert!(validate_node_address("").is_err());
        assert!(validate_node_address("node1:notaport").is_err());
        assert!(validate_node_address("10.0.0.1:99999").is_err());
        assert!(validate_node_address("node1:").is_err());
        assert!(validate_node_address("[node1]").is_err());
    }

    #[test]
    fn test_storage_keys() {
        assert!(storage_key_allowed("lvm", "lvm.use_thinpool"));
        assert!(storage_key_allowed("ceph", "ceph.osd.pg_num"));
        assert!(storage_key_allowed("dir", "user.comment"));
        assert!(!storage_key_allowed("dir", "size"));
        assert!(!storage_key_allowed("zfs", "lvm.use_thinpool"));
        assert!(storage_key_allowed("cephfs", "anything.goes"));
    }

    #[test]
    fn test_validate_rejects_dangling_root_disk() {
        let mut config = InitConfig::new();
        config.set_device(
            ROOT_DEVICE,
            device([("type", "disk"), ("path", "/"), ("pool", "missing")]),
        );

        assert!(config.validate().is_err());

        config.storage_pools.push(StoragePoolSpec::new("missing", "dir"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_unknown_keys() {
        let mut config = InitConfig::new();
        config.networks.push(NetworkSpec::bridge("lxdbr0"));
        config.networks.push(NetworkSpec::bridge("lxdbr0"));
        assert!(config.validate().is_err());

        let mut config = InitConfig::new();
        config
            .config
            .insert("core.bogus".to_string(), "1".to_string());
        assert!(config.validate().is_err());

        let mut config = InitConfig::new();
        let mut bridge = NetworkSpec::bridge("lxdbr0");
        bridge
            .config
            .insert("mtu".to_string(), "1500".to_string());
        config.networks.push(bridge);
        assert!(config.validate().is_err());
    }
}
