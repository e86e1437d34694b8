//! Connection-Monitor: turns the live `bluetoothctl --monitor` stream into attacks

use once_cell::sync::Lazy;
use regex::Regex;
use shheissee_probe::SourceError;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::detector::Detector;
use crate::models::{Attack, AttackKind, Severity};

/// Capacity of the queue between the line converter and the log appender
pub const ATTACK_QUEUE: usize = 100;

static MAC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})").unwrap());

/// Attacks carried by one monitor line; empty when the line names no device
pub fn parse_monitor_line(line: &str, now: OffsetDateTime) -> Vec<Attack> {
    let Some(mac) = MAC_RE.captures(line).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    let mac = mac.as_str().to_uppercase();

    let mut attacks = Vec::new();
    if line.contains("Device connected") {
        attacks.push(Attack::new(
            AttackKind::BluetoothConnectionAttempt,
            Severity::Medium,
            format!("Bluetooth connection/pairing attempt from device ({})", mac),
            mac.clone(),
            now,
        ));
    }
    if line.contains("PIN") || line.contains("Passkey") {
        attacks.push(Attack::new(
            AttackKind::BluetoothAuthAttempt,
            Severity::High,
            format!("Bluetooth authentication attempt from device ({})", mac),
            mac,
            now,
        ));
    }
    attacks
}

async fn convert_lines(mut lines: mpsc::Receiver<String>, attacks: mpsc::Sender<Attack>) {
    while let Some(line) = lines.recv().await {
        for attack in parse_monitor_line(&line, OffsetDateTime::now_utc()) {
            if attacks.send(attack).await.is_err() {
                debug!("Attack consumer gone, stopping line conversion");
                return;
            }
        }
    }
}

impl Detector {
    /// Follow the Bluetooth event stream until it ends. Returns how many attacks it produced.
    pub async fn monitor_connections(&self) -> Result<usize, SourceError> {
        let timeout = self.scan_timeout();
        let lines = tokio::time::timeout(timeout, self.bluetooth_source().monitor_connections())
            .await
            .unwrap_or(Err(SourceError::Timeout(timeout)))?;
        info!("Bluetooth connection monitor started");

        let (tx, mut rx) = mpsc::channel(ATTACK_QUEUE);
        tokio::spawn(convert_lines(lines, tx));

        let mut count = 0;
        while let Some(attack) = rx.recv().await {
            self.record_attack(attack).await;
            count += 1;
        }

        info!("Bluetooth event stream ended after {} events", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::detector::tests::{quiet_sources, RecordingSink};
    use crate::detector::{AttackFeed, Sources};
    use crate::registry::KnownDevices;
    use shheissee_devkit::StubBluetoothSource;
    use std::sync::Arc;
    use std::time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 10:00:00 UTC);

    #[test]
    fn test_connection_line() {
        let attacks = parse_monitor_line("[CHG] Device aa:bb:cc:dd:ee:ff Device connected: yes", NOW);

        assert_eq!(attacks.len(), 1);
        assert_eq!(attacks[0].kind, AttackKind::BluetoothConnectionAttempt);
        assert_eq!(attacks[0].severity, Severity::Medium);
        assert_eq!(attacks[0].target, "AA:BB:CC:DD:EE:FF");
        assert_eq!(
            attacks[0].description,
            "Bluetooth connection/pairing attempt from device (AA:BB:CC:DD:EE:FF)"
        );
    }

    #[test]
    fn test_auth_lines() {
        let pin = parse_monitor_line("Request PIN code for 11:22:33:44:55:66", NOW);
        let passkey = parse_monitor_line("[agent] Passkey request from 11:22:33:44:55:66", NOW);

        assert_eq!(pin[0].kind, AttackKind::BluetoothAuthAttempt);
        assert_eq!(pin[0].severity, Severity::High);
        assert_eq!(passkey[0].kind, AttackKind::BluetoothAuthAttempt);
    }

    #[test]
    fn test_lines_without_device_ignored() {
        assert!(parse_monitor_line("Device connected", NOW).is_empty());
        assert!(parse_monitor_line("[NEW] Controller 00:1A:7D:DA:71:13 host [default]", NOW).is_empty());
        assert!(parse_monitor_line("", NOW).is_empty());
    }

    #[tokio::test]
    async fn test_monitor_appends_until_stream_ends() {
        let bluetooth = StubBluetoothSource::new(vec![])
            .with_monitor_lines([
                "[CHG] Device AA:BB:CC:DD:EE:01 Device connected: yes",
                "noise without an address",
                "Request PIN code for AA:BB:CC:DD:EE:02",
            ])
            .with_line_interval(Duration::from_millis(5));
        let sources = Sources {
            bluetooth: Arc::new(bluetooth),
            ..quiet_sources()
        };
        let sink = Arc::new(RecordingSink::default());
        let detector = Detector::new(&DetectorConfig::default(), KnownDevices::default(), sources)
            .with_sink(sink.clone());

        let count = detector.monitor_connections().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(detector.attack_count().await, 2);
        let kinds: Vec<AttackKind> = sink.attacks.lock().iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![AttackKind::BluetoothConnectionAttempt, AttackKind::BluetoothAuthAttempt]
        );
    }

    #[tokio::test]
    async fn test_monitor_unavailable() {
        let sources = Sources {
            bluetooth: Arc::new(
                StubBluetoothSource::new(vec![]).with_monitor_failure(SourceError::Unavailable("bluetoothctl".into())),
            ),
            ..quiet_sources()
        };
        let detector = Detector::new(&DetectorConfig::default(), KnownDevices::default(), sources);

        assert_eq!(
            detector.monitor_connections().await,
            Err(SourceError::Unavailable("bluetoothctl".into()))
        );
    }
}
