use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag of an attack event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackKind {
    // network
    UnknownDevice,
    SuspiciousPort,
    // bluetooth
    KnobAttack,
    BluetoothProximity,
    BleRelayAttack,
    BiasAttack,
    BluetoothMassScanning,
    BlueborneVulnerability,
    BluetoothSpoofing,
    BluetoothMitm,
    BleFlooding,
    UnknownBluetooth,
    BluetoothConnectionAttempt,
    BluetoothAuthAttempt,
    // wifi
    EvilTwin,
    RogueAp,
    OpenNetwork,
    WeakEncryption,
    WpsVulnerability,
    WifiDeauthAttack,
    WifiMonitoring,
    // cross-domain
    AiConnectionAnomaly,
    AiRssiAnomaly,
    AiMassDeviceAnomaly,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::UnknownDevice => "UNKNOWN_DEVICE",
            AttackKind::SuspiciousPort => "SUSPICIOUS_PORT",
            AttackKind::KnobAttack => "KNOB_ATTACK",
            AttackKind::BluetoothProximity => "BLUETOOTH_PROXIMITY",
            AttackKind::BleRelayAttack => "BLE_RELAY_ATTACK",
            AttackKind::BiasAttack => "BIAS_ATTACK",
            AttackKind::BluetoothMassScanning => "BLUETOOTH_MASS_SCANNING",
            AttackKind::BlueborneVulnerability => "BLUEBORNE_VULNERABILITY",
            AttackKind::BluetoothSpoofing => "BLUETOOTH_SPOOFING",
            AttackKind::BluetoothMitm => "BLUETOOTH_MITM",
            AttackKind::BleFlooding => "BLE_FLOODING",
            AttackKind::UnknownBluetooth => "UNKNOWN_BLUETOOTH",
            AttackKind::BluetoothConnectionAttempt => "BLUETOOTH_CONNECTION_ATTEMPT",
            AttackKind::BluetoothAuthAttempt => "BLUETOOTH_AUTH_ATTEMPT",
            AttackKind::EvilTwin => "EVIL_TWIN",
            AttackKind::RogueAp => "ROGUE_AP",
            AttackKind::OpenNetwork => "OPEN_NETWORK",
            AttackKind::WeakEncryption => "WEAK_ENCRYPTION",
            AttackKind::WpsVulnerability => "WPS_VULNERABILITY",
            AttackKind::WifiDeauthAttack => "WIFI_DEAUTH_ATTACK",
            AttackKind::WifiMonitoring => "WIFI_MONITORING",
            AttackKind::AiConnectionAnomaly => "AI_CONNECTION_ANOMALY",
            AttackKind::AiRssiAnomaly => "AI_RSSI_ANOMALY",
            AttackKind::AiMassDeviceAnomaly => "AI_MASS_DEVICE_ANOMALY",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic security finding. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    #[serde(rename = "type")]
    pub kind: AttackKind,
    pub severity: Severity,
    pub description: String,
    pub target: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Attack {
    pub fn new(
        kind: AttackKind,
        severity: Severity,
        description: impl Into<String>,
        target: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            target: target.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_attack_json_shape() {
        let attack = Attack::new(
            AttackKind::AiMassDeviceAnomaly,
            Severity::High,
            "mass appearance",
            "network",
            datetime!(2024-05-01 10:00:00 UTC),
        );

        let json = serde_json::to_value(&attack).unwrap();
        assert_eq!(json["type"], "AI_MASS_DEVICE_ANOMALY");
        assert_eq!(json["severity"], "HIGH");
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00Z");

        let back: Attack = serde_json::from_value(json).unwrap();
        assert_eq!(back, attack);
    }

    #[test]
    fn test_kind_tags_match_serde() {
        for kind in [AttackKind::BleRelayAttack, AttackKind::RogueAp, AttackKind::WifiDeauthAttack] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
        assert!(Severity::High > Severity::Medium && Severity::Medium > Severity::Low);
    }
}
