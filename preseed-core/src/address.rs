//! Network address helpers
//!
//! Normalizes operator-supplied `host[:port]` strings the same way for
//! cluster addresses, join targets and listener addresses.

use std::net::{IpAddr, SocketAddr};

use crate::error::{PreseedError, PreseedResult};

/// Whether `address` already names a port (`host:port` or `[v6]:port`)
pub fn has_explicit_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }

    if let Some(rest) = address.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((_, port)) => port.parse::<u16>().is_ok(),
            None => false,
        };
    }

    // More than one colon without brackets is a bare IPv6 literal
    match address.split_once(':') {
        Some((host, port)) => !host.is_empty() && !port.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Append `default_port` when the address has none, bracketing IPv6 literals
pub fn canonical_address(address: &str, default_port: u16) -> String {
    let address = address.trim();
    if has_explicit_port(address) {
        return address.to_string();
    }

    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]:{}", address, default_port),
        _ => format!("{}:{}", address, default_port),
    }
}

/// Build the daemon listener address from a bind answer and a port.
///
/// `all` binds every address family through the IPv6 wildcard.
pub fn listener_address(bind: &str, port: u16) -> PreseedResult<String> {
    let bind = if bind == "all" { "::" } else { bind };

    let ip: IpAddr = bind.parse().map_err(|_| PreseedError::Validation {
        field: "bind address".to_string(),
        message: format!("'{}' is not an IP address", bind),
    })?;

    Ok(match ip {
        IpAddr::V4(v4) => format!("{}:{}", v4, port),
        IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
    })
}
