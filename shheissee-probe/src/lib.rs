//! Shheissee Probe - device snapshot sources for the intrusion monitor
//!
//! This crate talks to the operating system on behalf of the detection engine:
//! - Network discovery (nmap / fping) and per-host port scans
//! - Bluetooth discovery (bluetoothctl / hcitool) and the live connection stream
//! - WiFi discovery (iwlist / nmcli) plus the optional WPS, monitor-mode and deauth probes
//!
//! Every adapter returns plain device records; classification lives in the kernel.

pub mod bluetooth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod models;
pub mod network;
pub mod source;
pub mod wifi;

pub use bluetooth::BluetoothctlScanner;
pub use config::ProbeConfig;
pub use error::SourceError;
pub use models::{BluetoothDevice, DeviceRecord, Domain, NetworkDevice, Port, WifiDevice, WifiSignals};
pub use network::NmapScanner;
pub use source::{BluetoothSource, NetworkSource, WifiSource};
pub use wifi::WirelessScanner;
