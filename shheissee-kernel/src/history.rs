/**
 * ANOMALY STATE STORE - Rolling per-device history
 *
 * ROLE: Remembers when each device was first and last observed, how often,
 * its recent RSSI samples (Bluetooth) and its recent connection timestamps
 * (network). The cross-domain rules read it once per cycle.
 *
 * CAPACITY: 10 RSSI samples and 20 connection timestamps per device, oldest
 * evicted first. Devices inactive for longer than the retention window are
 * dropped with all their histories.
 */

use serde::Serialize;
use shheissee_probe::{BluetoothDevice, NetworkDevice};
use std::collections::{HashMap, VecDeque};
use time::OffsetDateTime;
use tracing::debug;

pub const RSSI_CAPACITY: usize = 10;
pub const CONNECTION_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceHistory {
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssiSample {
    pub value: i32,
    pub at: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct AnomalyStore {
    devices: HashMap<String, DeviceHistory>,
    rssi: HashMap<String, VecDeque<RssiSample>>,
    connections: HashMap<String, VecDeque<OffsetDateTime>>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
    queue.push_back(value);
    while queue.len() > capacity {
        queue.pop_front();
    }
}

impl AnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, id: &str, now: OffsetDateTime) {
        let history = self.devices.entry(id.to_string()).or_insert_with(|| DeviceHistory {
            first_seen: now,
            last_seen: now,
            count: 0,
        });
        history.last_seen = history.last_seen.max(now);
        history.count += 1;
    }

    /// Network sighting: also counts as one connection
    pub fn record_network_observation(&mut self, device: &NetworkDevice, now: OffsetDateTime) {
        if device.ip.is_empty() {
            return;
        }
        self.touch(&device.ip, now);
        let timestamps = self.connections.entry(device.ip.clone()).or_default();
        push_bounded(timestamps, now, CONNECTION_CAPACITY);
    }

    /// Bluetooth sighting: RSSI is sampled only when the device reported one
    pub fn record_bluetooth_observation(&mut self, device: &BluetoothDevice, now: OffsetDateTime) {
        if device.address.is_empty() {
            return;
        }
        self.touch(&device.address, now);
        if let Some(value) = device.rssi {
            let samples = self.rssi.entry(device.address.clone()).or_default();
            push_bounded(samples, RssiSample { value, at: now }, RSSI_CAPACITY);
        }
    }

    /// Drop devices not seen for longer than `retention`. Returns how many went.
    pub fn prune_inactive(&mut self, now: OffsetDateTime, retention: time::Duration) -> usize {
        let Some(cutoff) = now.checked_sub(retention) else {
            return 0;
        };
        let before = self.devices.len();

        self.devices.retain(|id, history| {
            let keep = history.last_seen >= cutoff;
            if !keep {
                debug!("Evicting history of {} (last seen {})", id, history.last_seen);
            }
            keep
        });
        let devices = &self.devices;
        self.rssi.retain(|id, _| devices.contains_key(id));
        self.connections.retain(|id, _| devices.contains_key(id));

        before - self.devices.len()
    }

    pub fn device(&self, id: &str) -> Option<&DeviceHistory> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = (&str, &DeviceHistory)> {
        self.devices.iter().map(|(id, h)| (id.as_str(), h))
    }

    pub fn rssi_histories(&self) -> impl Iterator<Item = (&str, &VecDeque<RssiSample>)> {
        self.rssi.iter().map(|(id, h)| (id.as_str(), h))
    }

    pub fn connection_histories(&self) -> impl Iterator<Item = (&str, &VecDeque<OffsetDateTime>)> {
        self.connections.iter().map(|(id, h)| (id.as_str(), h))
    }

    pub fn rssi_values(&self, id: &str) -> Vec<i32> {
        self.rssi
            .get(id)
            .map(|samples| samples.iter().map(|s| s.value).collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, id: &str) -> usize {
        self.connections.get(id).map_or(0, VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    const T0: OffsetDateTime = datetime!(2024-05-01 10:00:00 UTC);

    fn bt(address: &str, rssi: Option<i32>) -> BluetoothDevice {
        BluetoothDevice {
            rssi,
            ..BluetoothDevice::new(address)
        }
    }

    #[test]
    fn test_histories_stay_bounded() {
        let mut store = AnomalyStore::new();
        let host = NetworkDevice::new("10.0.0.5");

        for i in 0..50 {
            let now = T0 + Duration::seconds(i);
            store.record_network_observation(&host, now);
            store.record_bluetooth_observation(&bt("AA:BB:CC:DD:EE:FF", Some(-40 - i as i32)), now);
            assert!(store.connection_count("10.0.0.5") <= CONNECTION_CAPACITY);
            assert!(store.rssi_values("AA:BB:CC:DD:EE:FF").len() <= RSSI_CAPACITY);
        }

        // oldest samples were evicted first
        let values = store.rssi_values("AA:BB:CC:DD:EE:FF");
        assert_eq!(values.first(), Some(&-80));
        assert_eq!(values.last(), Some(&-89));
        assert_eq!(store.device("10.0.0.5").unwrap().count, 50);
    }

    #[test]
    fn test_first_and_last_seen() {
        let mut store = AnomalyStore::new();
        let host = NetworkDevice::new("10.0.0.5");

        store.record_network_observation(&host, T0);
        store.record_network_observation(&host, T0 + Duration::minutes(5));

        let history = store.device("10.0.0.5").unwrap();
        assert_eq!(history.first_seen, T0);
        assert_eq!(history.last_seen, T0 + Duration::minutes(5));
        assert!(history.last_seen >= history.first_seen);
        assert_eq!(history.count, 2);
    }

    #[test]
    fn test_rssi_only_sampled_when_present() {
        let mut store = AnomalyStore::new();
        store.record_bluetooth_observation(&bt("AA:BB:CC:DD:EE:FF", None), T0);

        assert_eq!(store.device("AA:BB:CC:DD:EE:FF").unwrap().count, 1);
        assert!(store.rssi_values("AA:BB:CC:DD:EE:FF").is_empty());
        assert_eq!(store.rssi_histories().count(), 0);
    }

    #[test]
    fn test_empty_identifiers_are_ignored() {
        let mut store = AnomalyStore::new();
        store.record_network_observation(&NetworkDevice::new(""), T0);
        store.record_bluetooth_observation(&bt("", Some(-50)), T0);

        assert!(store.is_empty());
        assert_eq!(store.connection_histories().count(), 0);
    }

    #[test]
    fn test_prune_inactive_devices() {
        let mut store = AnomalyStore::new();
        store.record_network_observation(&NetworkDevice::new("10.0.0.5"), T0);
        store.record_bluetooth_observation(&bt("AA:BB:CC:DD:EE:FF", Some(-50)), T0 + Duration::hours(20));

        let removed = store.prune_inactive(T0 + Duration::hours(25), Duration::hours(24));

        assert_eq!(removed, 1);
        assert!(store.device("10.0.0.5").is_none());
        assert_eq!(store.connection_count("10.0.0.5"), 0);
        assert_eq!(store.rssi_values("AA:BB:CC:DD:EE:FF"), vec![-50]);
    }

    #[test]
    fn test_prune_with_unbounded_retention_keeps_everything() {
        let mut store = AnomalyStore::new();
        store.record_network_observation(&NetworkDevice::new("10.0.0.5"), T0);

        assert_eq!(store.prune_inactive(T0 + Duration::days(3650), Duration::MAX), 0);
        assert_eq!(store.prune_inactive(T0, Duration::hours(1_000_000_000)), 0);
        assert_eq!(store.len(), 1);
    }
}
