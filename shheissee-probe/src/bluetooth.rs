//! Bluetooth discovery through bluetoothctl, with hcitool as a last resort

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::SourceError;
use crate::execution::CommandExecutor;
use crate::models::BluetoothDevice;
use crate::source::BluetoothSource;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m|\x01|\x02").unwrap());
static MAC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}$").unwrap());
static RSSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"RSSI:\s*(?:0x[0-9a-fA-F]+\s*\((-?\d+)\)|(-?\d+))").unwrap());

pub struct BluetoothctlScanner {
    config: ProbeConfig,
}

impl BluetoothctlScanner {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    async fn scan_on(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        let window = self.config.bluetooth_scan_secs.to_string();
        let deadline = self.config.command_timeout() + Duration::from_secs(self.config.bluetooth_scan_secs);
        // bluetoothctl reports a non-zero status when the timeout stops the scan
        let result = CommandExecutor::run("bluetoothctl", &["--timeout", &window, "scan", "on"], deadline).await?;
        Ok(parse_scan_events(&result.output))
    }

    async fn cached_devices(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        let output = CommandExecutor::capture("bluetoothctl", &["devices"], self.config.command_timeout()).await?;
        Ok(parse_device_list(&output))
    }

    async fn hcitool(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        let output = CommandExecutor::capture("hcitool", &["scan", "--flush"], self.config.command_timeout()).await?;
        Ok(parse_hcitool(&output))
    }
}

#[async_trait]
impl BluetoothSource for BluetoothctlScanner {
    async fn scan(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        let mut last_error = None;

        match self.scan_on().await {
            Ok(devices) if !devices.is_empty() => {
                info!("bluetoothctl scan found {} devices", devices.len());
                return Ok(devices);
            }
            Ok(_) => debug!("bluetoothctl scan reported no devices, reading the device cache"),
            Err(e) => {
                debug!("bluetoothctl scan failed: {}", e);
                last_error = Some(e);
            }
        }

        match self.cached_devices().await {
            Ok(devices) if !devices.is_empty() => return Ok(devices),
            Ok(_) => {}
            Err(e) => last_error = Some(e),
        }

        match self.hcitool().await {
            Ok(devices) => Ok(devices),
            Err(e) => match last_error {
                // bluetoothctl answered, the radio just sees nothing
                None => Ok(Vec::new()),
                Some(_) => Err(e),
            },
        }
    }

    async fn monitor_connections(&self) -> Result<mpsc::Receiver<String>, SourceError> {
        CommandExecutor::stream_lines("bluetoothctl", &["--monitor"])
    }
}

fn strip_control(line: &str) -> String {
    ANSI_RE.replace_all(line, "").trim().to_string()
}

fn is_mac(candidate: &str) -> bool {
    MAC_RE.is_match(candidate)
}

/// Unnamed devices are announced with their address in dash form
fn name_or_none(address: &str, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == address.replace(':', "-") {
        None
    } else {
        Some(name.to_string())
    }
}

/// Parse `bluetoothctl scan on` events. Devices keep first-seen order;
/// `[CHG]` lines update name and RSSI of known addresses.
pub fn parse_scan_events(output: &str) -> Vec<BluetoothDevice> {
    let mut devices: Vec<BluetoothDevice> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for raw in output.lines() {
        let line = strip_control(raw);
        let Some(rest) = line
            .strip_prefix("[NEW] Device ")
            .or_else(|| line.strip_prefix("[CHG] Device "))
        else {
            continue;
        };

        let (address, detail) = rest.split_once(' ').unwrap_or((rest, ""));
        if !is_mac(address) {
            continue;
        }
        let address = address.to_uppercase();

        let slot = *index.entry(address.clone()).or_insert_with(|| {
            devices.push(BluetoothDevice::new(address.clone()));
            devices.len() - 1
        });
        let device = &mut devices[slot];

        if let Some(caps) = RSSI_RE.captures(detail) {
            if let Some(rssi) = caps.get(1).or_else(|| caps.get(2)).and_then(|m| m.as_str().parse().ok()) {
                device.rssi = Some(rssi);
            }
        } else if let Some(name) = detail.strip_prefix("Name: ").or_else(|| detail.strip_prefix("Alias: ")) {
            device.name = name_or_none(&address, name);
        } else if line.starts_with("[NEW]") && device.name.is_none() {
            device.name = name_or_none(&address, detail);
        }
    }

    devices
}

/// Parse `bluetoothctl devices`: `Device <MAC> <name>`
pub fn parse_device_list(output: &str) -> Vec<BluetoothDevice> {
    output
        .lines()
        .map(strip_control)
        .filter_map(|line| {
            let rest = line.strip_prefix("Device ")?;
            let (address, name) = rest.split_once(' ').unwrap_or((rest, ""));
            if !is_mac(address) {
                return None;
            }
            let address = address.to_uppercase();
            Some(BluetoothDevice {
                name: name_or_none(&address, name),
                address,
                rssi: None,
            })
        })
        .collect()
}

/// Parse `hcitool scan`: `<MAC>\t<name>` after a `Scanning ...` header
pub fn parse_hcitool(output: &str) -> Vec<BluetoothDevice> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let address = parts.next()?;
            if !is_mac(address) {
                return None;
            }
            let name = parts.collect::<Vec<_>>().join(" ");
            let address = address.to_uppercase();
            Some(BluetoothDevice {
                name: name_or_none(&address, &name),
                address,
                rssi: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_events() {
        let output = "\
Discovery started
[CHG] Controller 00:1A:7D:DA:71:13 Discovering: yes
\x1b[0;92m[NEW]\x1b[0m Device 4C:87:5D:01:02:03 Pixel 7
[NEW] Device 5A:11:22:33:44:55 5A-11-22-33-44-55
[CHG] Device 4C:87:5D:01:02:03 RSSI: -58
[CHG] Device 5A:11:22:33:44:55 RSSI: 0xffffffb5 (-75)
[CHG] Device 5A:11:22:33:44:55 Name: Tile
[CHG] Device zz:zz RSSI: -10
";
        let devices = parse_scan_events(output);
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].address, "4C:87:5D:01:02:03");
        assert_eq!(devices[0].name.as_deref(), Some("Pixel 7"));
        assert_eq!(devices[0].rssi, Some(-58));

        assert_eq!(devices[1].name.as_deref(), Some("Tile"));
        assert_eq!(devices[1].rssi, Some(-75));
    }

    #[test]
    fn test_unnamed_device_has_no_name() {
        let devices = parse_scan_events("[NEW] Device 5A:11:22:33:44:55 5A-11-22-33-44-55\n");
        assert_eq!(devices.len(), 1);
        assert!(devices[0].name.is_none());
        assert!(devices[0].rssi.is_none());
    }

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list("Device AA:BB:CC:DD:EE:FF Test Device 1\nDevice 11:22:33:44:55:66\ngarbage\n");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name.as_deref(), Some("Test Device 1"));
        assert!(devices[1].name.is_none());
    }

    #[test]
    fn test_parse_hcitool() {
        let devices = parse_hcitool("Scanning ...\n\tAA:BB:CC:DD:EE:FF\tJBL Flip 5\n\t11:22:33:44:55:66\tn/a\n");
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(devices[0].name.as_deref(), Some("JBL Flip 5"));
    }
}
