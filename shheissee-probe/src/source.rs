//! Seams between the engine and the OS-level discovery adapters.
//!
//! The engine only ever sees these traits, so tests can swap in scripted
//! sources without any utility installed.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SourceError;
use crate::models::{BluetoothDevice, NetworkDevice, WifiDevice, WifiSignals};

/// Wired/IP network discovery
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Hosts currently answering on the monitored subnet
    async fn scan(&self) -> Result<Vec<NetworkDevice>, SourceError>;

    /// Fill in open ports for already discovered hosts.
    /// Hosts whose individual scan fails come back with no ports.
    async fn scan_ports(&self, devices: Vec<NetworkDevice>) -> Result<Vec<NetworkDevice>, SourceError>;
}

/// Bluetooth / BLE discovery
#[async_trait]
pub trait BluetoothSource: Send + Sync {
    async fn scan(&self) -> Result<Vec<BluetoothDevice>, SourceError>;

    /// Live, line-oriented event stream from the Bluetooth stack.
    /// The receiver yields `None` once the underlying stream ends.
    async fn monitor_connections(&self) -> Result<mpsc::Receiver<String>, SourceError>;
}

/// WiFi access point discovery
#[async_trait]
pub trait WifiSource: Send + Sync {
    async fn scan(&self) -> Result<Vec<WifiDevice>, SourceError>;

    /// Optional probes; sources without them report nothing
    async fn probe_signals(&self) -> WifiSignals {
        WifiSignals::default()
    }
}
