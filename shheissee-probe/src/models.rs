//! Device records handed from the sources to the engine.
//!
//! Records are rebuilt every cycle; the engine never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal domain a record was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Network,
    Bluetooth,
    Wifi,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Network => "network",
            Domain::Bluetooth => "bluetooth",
            Domain::Wifi => "wifi",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open port reported by a port scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub protocol: String,
    pub service: String,
    pub state: String,
}

impl Port {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// Host found on the wired/IP network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
}

impl NetworkDevice {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: None,
            ports: Vec::new(),
        }
    }
}

/// Nearby Bluetooth / BLE device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
}

impl BluetoothDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
        }
    }

    /// Device name, or an empty string when the device did not advertise one
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// WiFi access point seen during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiDevice {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_dbm: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl WifiDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ssid: None,
            signal_dbm: None,
            channel: None,
        }
    }

    pub fn display_ssid(&self) -> &str {
        self.ssid.as_deref().unwrap_or("")
    }
}

/// One observed device, whatever its domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "lowercase")]
pub enum DeviceRecord {
    Network(NetworkDevice),
    Bluetooth(BluetoothDevice),
    Wifi(WifiDevice),
}

impl DeviceRecord {
    /// Identity key: IP for network hosts, hardware address otherwise
    pub fn identifier(&self) -> &str {
        match self {
            DeviceRecord::Network(d) => &d.ip,
            DeviceRecord::Bluetooth(d) => &d.address,
            DeviceRecord::Wifi(d) => &d.address,
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            DeviceRecord::Network(_) => Domain::Network,
            DeviceRecord::Bluetooth(_) => Domain::Bluetooth,
            DeviceRecord::Wifi(_) => Domain::Wifi,
        }
    }
}

impl From<NetworkDevice> for DeviceRecord {
    fn from(device: NetworkDevice) -> Self {
        DeviceRecord::Network(device)
    }
}

impl From<BluetoothDevice> for DeviceRecord {
    fn from(device: BluetoothDevice) -> Self {
        DeviceRecord::Bluetooth(device)
    }
}

impl From<WifiDevice> for DeviceRecord {
    fn from(device: WifiDevice) -> Self {
        DeviceRecord::Wifi(device)
    }
}

/// Findings of the optional WiFi probes (wash, iwconfig, airodump-ng).
/// A probe that could not run leaves its field at the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiSignals {
    pub wps_capable: bool,
    pub deauth_frames: u32,
    pub monitor_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_identifier_and_domain() {
        let net: DeviceRecord = NetworkDevice::new("10.0.0.5").into();
        let bt: DeviceRecord = BluetoothDevice::new("AA:BB:CC:DD:EE:FF").into();
        let wifi: DeviceRecord = WifiDevice::new("00:11:22:33:44:55").into();

        assert_eq!(net.identifier(), "10.0.0.5");
        assert_eq!(bt.identifier(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(wifi.identifier(), "00:11:22:33:44:55");
        assert_eq!(net.domain(), Domain::Network);
        assert_eq!(bt.domain().to_string(), "bluetooth");
        assert_eq!(wifi.domain().as_str(), "wifi");
    }

    #[test]
    fn test_record_serializes_with_domain_tag() {
        let record: DeviceRecord = BluetoothDevice {
            address: "AA:BB:CC:DD:EE:FF".into(),
            name: Some("Headset".into()),
            rssi: Some(-61),
        }
        .into();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["domain"], "bluetooth");
        assert_eq!(json["rssi"], -61);
    }
}
