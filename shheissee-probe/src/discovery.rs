//! Local interface discovery for the network sweep
//!
//! This module handles:
//! - IPv4 interface enumeration
//! - Primary interface selection with priority (Ethernet > WiFi > Other)
//! - Deriving the /24 subnet the network scanner sweeps

use anyhow::{Context, Result};
use if_addrs::{get_if_addrs, IfAddr};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

/// IPv4 interface candidate
#[derive(Debug, Clone)]
pub struct LocalInterface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub interface_type: InterfaceType,
}

/// Classify interface type based on name patterns
pub fn classify_interface(name: &str) -> InterfaceType {
    let name_lower = name.to_lowercase();

    if name_lower == "lo" || name_lower.starts_with("lo0") || name_lower.starts_with("loopback") {
        return InterfaceType::Loopback;
    }

    if name_lower.contains("wlan") || name_lower.contains("wifi") ||
       name_lower.starts_with("wlp") || name_lower.starts_with("wlo") {
        return InterfaceType::Wireless;
    }

    if name_lower.starts_with("eth") || name_lower.starts_with("en") {
        return InterfaceType::Ethernet;
    }

    InterfaceType::Other
}

/// Enumerate non-loopback IPv4 interfaces
pub fn local_interfaces() -> Result<Vec<LocalInterface>> {
    let if_addrs = get_if_addrs().context("Failed to enumerate network interfaces")?;

    let interfaces = if_addrs
        .into_iter()
        .filter(|if_addr| !if_addr.is_loopback())
        .filter_map(|if_addr| match if_addr.addr {
            IfAddr::V4(v4) => Some(LocalInterface {
                interface_type: classify_interface(&if_addr.name),
                name: if_addr.name,
                ip: v4.ip,
            }),
            IfAddr::V6(_) => None,
        })
        .inspect(|iface| debug!("Found interface: {} ({})", iface.name, iface.ip))
        .collect();

    Ok(interfaces)
}

/// Pick the interface to sweep from: Ethernet first, then WiFi, then anything
pub fn select_primary(interfaces: &[LocalInterface]) -> Option<&LocalInterface> {
    interfaces
        .iter()
        .find(|i| i.interface_type == InterfaceType::Ethernet)
        .or_else(|| interfaces.iter().find(|i| i.interface_type == InterfaceType::Wireless))
        .or_else(|| {
            let first = interfaces.iter().find(|i| i.interface_type != InterfaceType::Loopback);
            if let Some(iface) = first {
                warn!("No Ethernet/WiFi found, using first interface: {}", iface.name);
            }
            first
        })
}

/// /24 network containing `ip`, in CIDR notation
pub fn subnet_24(ip: Ipv4Addr) -> String {
    let [a, b, c, _] = ip.octets();
    format!("{}.{}.{}.0/24", a, b, c)
}

/// Subnet of the primary interface
pub fn local_subnet() -> Result<String> {
    let interfaces = local_interfaces()?;
    let primary = select_primary(&interfaces)
        .ok_or_else(|| anyhow::anyhow!("No suitable network interface found"))?;

    let subnet = subnet_24(primary.ip);
    info!("Sweeping {} via {}", subnet, primary.name);
    Ok(subnet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: [u8; 4]) -> LocalInterface {
        LocalInterface {
            name: name.to_string(),
            ip: Ipv4Addr::from(ip),
            interface_type: classify_interface(name),
        }
    }

    #[test]
    fn test_interface_classification() {
        assert_eq!(classify_interface("eth0"), InterfaceType::Ethernet);
        assert_eq!(classify_interface("enp3s0"), InterfaceType::Ethernet);
        assert_eq!(classify_interface("wlan0"), InterfaceType::Wireless);
        assert_eq!(classify_interface("wlp2s0"), InterfaceType::Wireless);
        assert_eq!(classify_interface("lo"), InterfaceType::Loopback);
        assert_eq!(classify_interface("docker0"), InterfaceType::Other);
    }

    #[test]
    fn test_primary_prefers_ethernet() {
        let interfaces = vec![
            iface("docker0", [172, 17, 0, 1]),
            iface("wlan0", [192, 168, 1, 42]),
            iface("eth0", [10, 0, 0, 7]),
        ];
        assert_eq!(select_primary(&interfaces).unwrap().name, "eth0");

        let no_ethernet = vec![iface("docker0", [172, 17, 0, 1]), iface("wlan0", [192, 168, 1, 42])];
        assert_eq!(select_primary(&no_ethernet).unwrap().name, "wlan0");

        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_subnet_derivation() {
        assert_eq!(subnet_24(Ipv4Addr::new(192, 168, 1, 42)), "192.168.1.0/24");
    }
}
