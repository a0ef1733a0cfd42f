use nix::ifaddrs::getifaddrs;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{debug, warn};

pub const LOOPBACK_ADDRESS: &str = "127.0.0.1";

/// Interface whose address is advertised when no service address is configured.
pub fn default_interface() -> &'static str {
    if cfg!(target_os = "macos") {
        "en0"
    } else {
        "eth0"
    }
}

/// Returns the first usable IPv4 address bound to `interface`.
pub fn interface_ipv4(interface: &str) -> Option<Ipv4Addr> {
    let addresses = match getifaddrs() {
        Ok(addresses) => addresses,
        Err(e) => {
            warn!("Get network interface {} error: {}", interface, e);
            return None;
        }
    };

    addresses
        .filter(|ifaddr| ifaddr.interface_name == interface)
        .filter_map(|ifaddr| {
            ifaddr
                .address
                .and_then(|address| address.as_sockaddr_in().copied())
        })
        .map(|sin| *SocketAddrV4::from(sin).ip())
        .find(|ip| !ip.is_unspecified())
}

/// Resolves the address to advertise: the configured value, else the default
/// interface address, else loopback.
pub fn resolve_service_address(configured: Option<&str>) -> String {
    if let Some(address) = configured.filter(|address| !address.is_empty()) {
        return address.to_string();
    }

    let interface = default_interface();
    match interface_ipv4(interface) {
        Some(ip) => {
            debug!("Using {} address {}", interface, ip);
            ip.to_string()
        }
        None => LOOPBACK_ADDRESS.to_string(),
    }
}
