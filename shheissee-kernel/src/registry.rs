/**
 * KNOWN-DEVICE REGISTRY - Operator-curated allowlists
 *
 * ROLE: Loads and saves the JSON allowlists that separate expected devices
 * from unexpected ones (network: IP/MAC strings, Bluetooth: {address, name}).
 *
 * BEHAVIOUR: A missing file is created as `[]` together with its directory.
 * An unreadable or corrupt file is a startup failure. Matching is exact.
 */

use serde::{Deserialize, Serialize};
use shheissee_probe::NetworkDevice;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DetectorConfig;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to load allowlist {path}: {reason}")]
    LoadFailed { path: String, reason: String },
    #[error("failed to persist allowlist {path}: {reason}")]
    PersistenceFailed { path: String, reason: String },
}

impl RegistryError {
    fn load(path: &str, reason: impl ToString) -> Self {
        Self::LoadFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    fn persist(path: &str, reason: impl ToString) -> Self {
        Self::PersistenceFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownBluetoothDevice {
    pub address: String,
    #[serde(default)]
    pub name: String,
}

/// Both allowlists, loaded once at startup and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct KnownDevices {
    pub network: HashSet<String>,
    pub bluetooth: HashSet<String>,
}

impl KnownDevices {
    pub async fn load(config: &DetectorConfig) -> Result<Self, RegistryError> {
        let network = load_network(&config.known_devices_file).await?;
        let bluetooth = load_bluetooth(&config.bluetooth_devices_file)
            .await?
            .into_iter()
            .map(|device| device.address)
            .collect();

        Ok(Self { network, bluetooth })
    }

    /// A host is known when either its IP or its MAC is listed
    pub fn is_known_network(&self, device: &NetworkDevice) -> bool {
        self.network.contains(&device.ip)
            || device.mac.as_ref().is_some_and(|mac| self.network.contains(mac))
    }

    pub fn is_known_bluetooth(&self, address: &str) -> bool {
        self.bluetooth.contains(address)
    }
}

async fn read_or_create(path: &str) -> Result<Option<String>, RegistryError> {
    if Path::new(path).exists() {
        return tokio::fs::read_to_string(path)
            .await
            .map(Some)
            .map_err(|e| RegistryError::load(path, e));
    }

    info!("Allowlist {} not found, creating an empty one", path);
    if let Err(e) = write_json(path, &Vec::<String>::new()).await {
        warn!("{}", e);
    }
    Ok(None)
}

async fn write_json<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<(), RegistryError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| RegistryError::persist(path, e))?;

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RegistryError::persist(path, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| RegistryError::persist(path, e))
}

/// Network allowlist: a JSON array of IP or MAC strings
pub async fn load_network(path: &str) -> Result<HashSet<String>, RegistryError> {
    let Some(content) = read_or_create(path).await? else {
        return Ok(HashSet::new());
    };
    let entries: Vec<String> = serde_json::from_str(&content).map_err(|e| RegistryError::load(path, e))?;

    info!("Loaded {} known network devices from {}", entries.len(), path);
    Ok(entries.into_iter().collect())
}

pub async fn save_network(path: &str, entries: &[String]) -> Result<(), RegistryError> {
    write_json(path, entries).await
}

/// Bluetooth allowlist: a JSON array of `{address, name}` objects
pub async fn load_bluetooth(path: &str) -> Result<Vec<KnownBluetoothDevice>, RegistryError> {
    let Some(content) = read_or_create(path).await? else {
        return Ok(Vec::new());
    };
    let devices: Vec<KnownBluetoothDevice> =
        serde_json::from_str(&content).map_err(|e| RegistryError::load(path, e))?;

    info!("Loaded {} known Bluetooth devices from {}", devices.len(), path);
    Ok(devices)
}

pub async fn save_bluetooth(path: &str, devices: &[KnownBluetoothDevice]) -> Result<(), RegistryError> {
    write_json(path, devices).await
}

/// Overwrite both allowlists with the demo scenario: three known hosts and two known headsets
pub async fn write_demo(config: &DetectorConfig) -> Result<(), RegistryError> {
    let network: Vec<String> = ["192.168.1.10", "192.168.1.20", "192.168.1.30"]
        .into_iter()
        .map(String::from)
        .collect();
    let bluetooth = vec![
        KnownBluetoothDevice {
            address: "AA:BB:CC:DD:EE:FF".into(),
            name: "Test Device 1".into(),
        },
        KnownBluetoothDevice {
            address: "11:22:33:44:55:66".into(),
            name: "Test Device 2".into(),
        },
    ];

    save_network(&config.known_devices_file, &network).await?;
    save_bluetooth(&config.bluetooth_devices_file, &bluetooth).await
}
