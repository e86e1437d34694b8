//! Network host discovery and port scanning (nmap, fping)

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::discovery;
use crate::error::SourceError;
use crate::execution::CommandExecutor;
use crate::models::{NetworkDevice, Port};
use crate::source::NetworkSource;

const FALLBACK_SUBNET: &str = "192.168.1.0/24";

static IPV4_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap());
static MAC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"MAC Address:\s*([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})").unwrap());

/// Sweep method, tried in order
#[derive(Debug, Clone, Copy)]
enum SweepMethod {
    Nmap,
    Fping,
}

/// Host discovery through nmap with an fping fallback
pub struct NmapScanner {
    config: ProbeConfig,
}

impl NmapScanner {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn subnet(&self) -> String {
        if let Some(subnet) = &self.config.subnet {
            return subnet.clone();
        }
        discovery::local_subnet().unwrap_or_else(|e| {
            warn!("Could not derive local subnet ({}), using {}", e, FALLBACK_SUBNET);
            FALLBACK_SUBNET.to_string()
        })
    }

    async fn sweep(&self, method: SweepMethod, subnet: &str) -> Result<Vec<NetworkDevice>, SourceError> {
        let timeout = self.config.command_timeout();
        match method {
            SweepMethod::Nmap => {
                let output = CommandExecutor::capture("nmap", &["-sn", subnet], timeout).await?;
                Ok(parse_ping_sweep(&output))
            }
            SweepMethod::Fping => {
                // fping exits non-zero when some hosts are unreachable, so only the output matters
                let result = CommandExecutor::run("fping", &["-a", "-g", subnet, "-r", "1"], timeout).await?;
                Ok(parse_fping(&result.output))
            }
        }
    }
}

#[async_trait]
impl NetworkSource for NmapScanner {
    async fn scan(&self) -> Result<Vec<NetworkDevice>, SourceError> {
        let subnet = self.subnet();
        let mut last_error = None;
        let mut swept = false;

        for method in [SweepMethod::Nmap, SweepMethod::Fping] {
            match self.sweep(method, &subnet).await {
                Ok(devices) if !devices.is_empty() => {
                    info!("{:?} sweep of {} found {} hosts", method, subnet, devices.len());
                    return Ok(devices);
                }
                Ok(_) => {
                    debug!("{:?} sweep of {} found no hosts", method, subnet);
                    swept = true;
                }
                Err(e) => {
                    debug!("{:?} sweep failed: {}", method, e);
                    last_error = Some(e);
                }
            }
        }

        if swept {
            return Ok(Vec::new());
        }
        Err(last_error.unwrap_or_else(|| SourceError::Unavailable("nmap, fping".into())))
    }

    async fn scan_ports(&self, mut devices: Vec<NetworkDevice>) -> Result<Vec<NetworkDevice>, SourceError> {
        if !CommandExecutor::is_available("nmap") {
            return Err(SourceError::Unavailable("nmap".into()));
        }

        let timeout = self.config.command_timeout();
        for device in devices.iter_mut() {
            let args = ["-p", self.config.ports.as_str(), "--open", device.ip.as_str()];
            match CommandExecutor::capture("nmap", &args, timeout).await {
                Ok(output) => device.ports = parse_port_scan(&output),
                Err(e) => {
                    warn!("Port scan of {} failed: {}", device.ip, e);
                    device.ports.clear();
                }
            }
        }

        Ok(devices)
    }
}

/// Parse `nmap -sn` output. MAC lines attach to the preceding host.
pub fn parse_ping_sweep(output: &str) -> Vec<NetworkDevice> {
    let mut devices: Vec<NetworkDevice> = Vec::new();

    for line in output.lines() {
        if line.contains("Nmap scan report for") {
            if let Some(ip) = IPV4_RE.captures(line).and_then(|c| c.get(1)) {
                if ip.as_str().parse::<IpAddr>().is_ok() {
                    devices.push(NetworkDevice::new(ip.as_str()));
                }
            }
        } else if let Some(mac) = MAC_RE.captures(line).and_then(|c| c.get(1)) {
            if let Some(last) = devices.last_mut() {
                last.mac = Some(mac.as_str().to_uppercase());
            }
        }
    }

    devices
}

/// Parse `fping -a` output: one reachable address per line
pub fn parse_fping(output: &str) -> Vec<NetworkDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.parse::<IpAddr>().is_ok())
        .map(NetworkDevice::new)
        .collect()
}

/// Parse the PORT/STATE/SERVICE table of an nmap port scan
pub fn parse_port_scan(output: &str) -> Vec<Port> {
    let mut ports = Vec::new();
    let mut in_port_section = false;

    for line in output.lines() {
        if line.contains("Nmap done") {
            break;
        }
        if line.contains("PORT") && line.contains("STATE") && line.contains("SERVICE") {
            in_port_section = true;
            continue;
        }
        if !in_port_section || line.trim().is_empty() || line.starts_with("MAC") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let (number, protocol) = match parts[0].split_once('/') {
            Some((num, proto)) => (num.parse::<u16>(), proto),
            None => continue,
        };
        let Ok(number) = number else { continue };

        ports.push(Port {
            number,
            protocol: protocol.to_string(),
            state: parts[1].to_string(),
            service: parts[2].to_string(),
        });
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    const NMAP_SWEEP: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2024-05-01 10:00 CEST
Nmap scan report for router.lan (192.168.1.1)
Host is up (0.0021s latency).
MAC Address: a4:2b:b0:11:22:33 (TP-Link)
Nmap scan report for 192.168.1.20
Host is up (0.010s latency).
Nmap done: 256 IP addresses (2 hosts up) scanned in 2.31 seconds
";

    const NMAP_PORTS: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2024-05-01 10:01 CEST
Nmap scan report for 192.168.1.20
Host is up (0.0040s latency).
Not shown: 10 closed tcp ports (conn-refused)
PORT     STATE SERVICE
22/tcp   open  ssh
445/tcp  open  microsoft-ds
3389/tcp open  ms-wbt-server
MAC Address: 00:11:22:33:44:55 (Unknown)

Nmap done: 1 IP address (1 host up) scanned in 0.12 seconds
";

    #[test]
    fn test_parse_ping_sweep() {
        let devices = parse_ping_sweep(NMAP_SWEEP);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].ip, "192.168.1.1");
        assert_eq!(devices[0].mac.as_deref(), Some("A4:2B:B0:11:22:33"));
        assert_eq!(devices[1].ip, "192.168.1.20");
        assert!(devices[1].mac.is_none());
    }

    #[test]
    fn test_parse_fping_skips_noise() {
        let devices = parse_fping("192.168.1.1\n\nICMP Host Unreachable from 192.168.1.9\n192.168.1.30\n");
        let ips: Vec<&str> = devices.iter().map(|d| d.ip.as_str()).collect();
        assert_eq!(ips, vec!["192.168.1.1", "192.168.1.30"]);
    }

    #[test]
    fn test_parse_port_scan() {
        let ports = parse_port_scan(NMAP_PORTS);
        let numbers: Vec<u16> = ports.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![22, 445, 3389]);
        assert!(ports.iter().all(Port::is_open));
        assert_eq!(ports[1].service, "microsoft-ds");
        assert_eq!(ports[0].protocol, "tcp");
    }

    #[test]
    fn test_parse_port_scan_without_table() {
        assert!(parse_port_scan("Note: Host seems down.\nNmap done: 1 IP address (0 hosts up)").is_empty());
    }
}
