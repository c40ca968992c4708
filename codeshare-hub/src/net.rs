//! LAN address discovery for operator-facing URLs.

use std::net::{IpAddr, Ipv4Addr};

/// Fallback when no LAN address exists.
pub const LOCALHOST: &str = "localhost";

/// First non-loopback IPv4 address of this machine, or `localhost`.
pub fn lan_address() -> String {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => first_lan_ipv4(
            interfaces
                .iter()
                .map(|iface| (iface.is_loopback(), iface.ip())),
        )
        .map_or_else(|| LOCALHOST.to_string(), |ip| ip.to_string()),
        Err(e) => {
            log::warn!("Could not enumerate network interfaces: {e}");
            LOCALHOST.to_string()
        }
    }
}

/// Pick the first address that is IPv4 and not loopback.
pub fn first_lan_ipv4(interfaces: impl IntoIterator<Item = (bool, IpAddr)>) -> Option<Ipv4Addr> {
    interfaces.into_iter().find_map(|(is_loopback, ip)| match ip {
        IpAddr::V4(v4) if !is_loopback && !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

/// Operator-facing URLs for a bound port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUrls {
    pub local: String,
    pub network: String,
}

impl ServerUrls {
    pub fn for_port(port: u16) -> Self {
        Self::with_host(&lan_address(), port)
    }

    pub fn with_host(lan_host: &str, port: u16) -> Self {
        Self {
            local: format!("http://{LOCALHOST}:{port}"),
            network: format!("http://{lan_host}:{port}"),
        }
    }
}
