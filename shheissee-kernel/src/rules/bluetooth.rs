//! Bluetooth rule family

use shheissee_probe::BluetoothDevice;
use std::collections::BTreeMap;

use super::{first_keyword, Finding, Rule, RuleContext, RuleSpec};
use crate::models::{AttackKind, Severity};

const KNOB_RSSI: i32 = -20;
const PROXIMITY_RSSI: i32 = -30;
const RELAY_RSSI: i32 = -80;
const MASS_SCANNING_DEVICES: usize = 20;
const FLOODING_DEVICES: usize = 10;

const BLUEBORNE_KEYWORDS: &[&str] = &["android", "ios", "linux", "windows"];
const SPOOFING_KEYWORDS: &[&str] = &["attack", "hack", "exploit", "test", "spoof", "evil", "malware", "virus"];
const MITM_KEYWORDS: &[&str] = &["proxy", "gateway", "bridge", "intercept"];
const BLE_PREFIXES: &[&str] = &["00:", "01:", "02:"];

fn rssi_above(device: &BluetoothDevice, threshold: i32) -> bool {
    device.rssi.is_some_and(|rssi| rssi > threshold)
}

fn knob(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    rssi_above(device, KNOB_RSSI)
}

fn describe_knob(device: &BluetoothDevice) -> Finding {
    Finding::new(
        format!(
            "Potential KNOB attack: Device extremely close ({}, RSSI: {})",
            device.display_name(),
            device.rssi.unwrap_or_default()
        ),
        device.address.clone(),
    )
}

fn too_close(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    rssi_above(device, PROXIMITY_RSSI)
}

fn describe_proximity(device: &BluetoothDevice) -> Finding {
    Finding::new(
        format!(
            "Device too close (possible attack): {} ({}, RSSI: {})",
            device.display_name(),
            device.address,
            device.rssi.unwrap_or_default()
        ),
        device.address.clone(),
    )
}

fn weak_signal(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    device.rssi.is_some_and(|rssi| rssi < RELAY_RSSI)
}

fn describe_relay(device: &BluetoothDevice) -> Finding {
    Finding::new(
        format!(
            "Potential BLE relay attack: Weak signal device ({}, RSSI: {})",
            device.display_name(),
            device.rssi.unwrap_or_default()
        ),
        device.address.clone(),
    )
}

fn duplicate_names(snapshot: &[BluetoothDevice], _: &RuleContext<'_>) -> Vec<Finding> {
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for device in snapshot {
        let name = device.display_name();
        if !name.is_empty() {
            by_name.entry(name).or_default().push(&device.address);
        }
    }

    by_name
        .into_iter()
        .filter(|(_, addresses)| addresses.len() > 1)
        .map(|(name, addresses)| {
            Finding::new(
                format!(
                    "Potential BIAS attack: Multiple devices with same name '{}' ({} devices)",
                    name,
                    addresses.len()
                ),
                addresses.join(", "),
            )
        })
        .collect()
}

fn mass_scanning(snapshot: &[BluetoothDevice], _: &RuleContext<'_>) -> Vec<Finding> {
    if snapshot.len() <= MASS_SCANNING_DEVICES {
        return Vec::new();
    }
    vec![Finding::new(
        format!(
            "Mass scanning detected: {} Bluetooth devices found (unusual activity)",
            snapshot.len()
        ),
        "bluetooth_network",
    )]
}

fn blueborne_candidate(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_name(), BLUEBORNE_KEYWORDS).is_some()
}

fn describe_blueborne(device: &BluetoothDevice) -> Finding {
    let platform = match first_keyword(device.display_name(), BLUEBORNE_KEYWORDS) {
        Some("android") => "Android",
        Some("ios") => "iOS",
        Some("linux") => "Linux",
        _ => "Windows",
    };
    Finding::new(
        format!(
            "Potential BlueBorne vulnerable device: {} ({}) - {} device - check for BlueBorne vulnerabilities",
            device.display_name(),
            device.address,
            platform
        ),
        device.address.clone(),
    )
}

fn suspicious_name(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_name(), SPOOFING_KEYWORDS).is_some()
}

fn describe_spoofing(device: &BluetoothDevice) -> Finding {
    Finding::new(
        format!("Suspicious Bluetooth device name: {} ({})", device.display_name(), device.address),
        device.address.clone(),
    )
}

fn relay_name(device: &BluetoothDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_name(), MITM_KEYWORDS).is_some()
}

fn describe_mitm(device: &BluetoothDevice) -> Finding {
    let role = first_keyword(device.display_name(), MITM_KEYWORDS).unwrap_or("relay");
    Finding::new(
        format!(
            "Potential Man-in-the-Middle device: {} ({}) - appears to be {}",
            device.display_name(),
            device.address,
            role
        ),
        device.address.clone(),
    )
}

fn ble_flooding(snapshot: &[BluetoothDevice], _: &RuleContext<'_>) -> Vec<Finding> {
    let count = snapshot
        .iter()
        .filter(|d| BLE_PREFIXES.iter().any(|prefix| d.address.starts_with(prefix)))
        .count();
    if count <= FLOODING_DEVICES {
        return Vec::new();
    }
    vec![Finding::new(
        format!("BLE flooding attack suspected: {} BLE devices detected", count),
        "ble_network",
    )]
}

fn unregistered(device: &BluetoothDevice, ctx: &RuleContext<'_>) -> bool {
    !ctx.known.is_known_bluetooth(&device.address)
}

fn describe_unknown(device: &BluetoothDevice) -> Finding {
    Finding::new(
        format!("Unknown Bluetooth device: {} ({})", device.display_name(), device.address),
        device.address.clone(),
    )
}

pub const BLUETOOTH_RULES: &[RuleSpec<BluetoothDevice>] = &[
    RuleSpec {
        kind: AttackKind::KnobAttack,
        severity: Severity::High,
        rule: Rule::Device { matches: knob, describe: describe_knob },
    },
    RuleSpec {
        kind: AttackKind::BiasAttack,
        severity: Severity::High,
        rule: Rule::Snapshot(duplicate_names),
    },
    RuleSpec {
        kind: AttackKind::BluetoothMassScanning,
        severity: Severity::Medium,
        rule: Rule::Snapshot(mass_scanning),
    },
    RuleSpec {
        kind: AttackKind::BleRelayAttack,
        severity: Severity::Medium,
        rule: Rule::Device { matches: weak_signal, describe: describe_relay },
    },
    RuleSpec {
        kind: AttackKind::BlueborneVulnerability,
        severity: Severity::High,
        rule: Rule::Device { matches: blueborne_candidate, describe: describe_blueborne },
    },
    RuleSpec {
        kind: AttackKind::BluetoothProximity,
        severity: Severity::Medium,
        rule: Rule::Device { matches: too_close, describe: describe_proximity },
    },
    RuleSpec {
        kind: AttackKind::BluetoothSpoofing,
        severity: Severity::High,
        rule: Rule::Device { matches: suspicious_name, describe: describe_spoofing },
    },
    RuleSpec {
        kind: AttackKind::BleFlooding,
        severity: Severity::Medium,
        rule: Rule::Snapshot(ble_flooding),
    },
    RuleSpec {
        kind: AttackKind::BluetoothMitm,
        severity: Severity::High,
        rule: Rule::Device { matches: relay_name, describe: describe_mitm },
    },
    RuleSpec {
        kind: AttackKind::UnknownBluetooth,
        severity: Severity::High,
        rule: Rule::Device { matches: unregistered, describe: describe_unknown },
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attack;
    use crate::registry::KnownDevices;
    use crate::rules::evaluate;
    use shheissee_devkit::fixtures;
    use time::macros::datetime;

    fn classify_known(snapshot: &[BluetoothDevice]) -> Vec<Attack> {
        // register everything so UNKNOWN_BLUETOOTH stays out of the way
        let known = KnownDevices {
            bluetooth: snapshot.iter().map(|d| d.address.clone()).collect(),
            ..Default::default()
        };
        let ctx = RuleContext::new(&known, datetime!(2024-05-01 10:00:00 UTC));
        evaluate(BLUETOOTH_RULES, snapshot, &ctx)
    }

    fn kinds(attacks: &[Attack]) -> Vec<AttackKind> {
        attacks.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_bias_one_attack_per_duplicated_name() {
        let snapshot = [
            fixtures::bt_named("AA:00:00:00:00:0A", "X"),
            fixtures::bt_named("BB:00:00:00:00:0B", "X"),
            fixtures::bt_named("CC:00:00:00:00:0C", "X"),
        ];
        let attacks = classify_known(&snapshot);

        assert_eq!(kinds(&attacks), vec![AttackKind::BiasAttack]);
        assert_eq!(attacks[0].target, "AA:00:00:00:00:0A, BB:00:00:00:00:0B, CC:00:00:00:00:0C");
        assert!(attacks[0].description.contains("'X' (3 devices)"));
    }

    #[test]
    fn test_unnamed_devices_never_share_a_name() {
        let snapshot = [fixtures::bt("AA:00:00:00:00:0A"), fixtures::bt("BB:00:00:00:00:0B")];
        assert!(classify_known(&snapshot).is_empty());
    }

    #[test]
    fn test_rssi_thresholds() {
        let very_close = classify_known(&[fixtures::bt_with_rssi("AA:00:00:00:00:01", -10)]);
        assert_eq!(kinds(&very_close), vec![AttackKind::KnobAttack, AttackKind::BluetoothProximity]);

        let close = classify_known(&[fixtures::bt_with_rssi("AA:00:00:00:00:02", -25)]);
        assert_eq!(kinds(&close), vec![AttackKind::BluetoothProximity]);

        let far = classify_known(&[fixtures::bt_with_rssi("AA:00:00:00:00:03", -85)]);
        assert_eq!(kinds(&far), vec![AttackKind::BleRelayAttack]);

        let normal = classify_known(&[fixtures::bt_with_rssi("AA:00:00:00:00:04", -60)]);
        assert!(normal.is_empty());
    }

    #[test]
    fn test_missing_rssi_skips_signal_rules() {
        assert!(classify_known(&[fixtures::bt("AA:00:00:00:00:05")]).is_empty());
    }

    #[test]
    fn test_name_keyword_rules() {
        let attacks = classify_known(&[
            fixtures::bt_named("AA:00:00:00:00:01", "Galaxy Android"),
            fixtures::bt_named("AA:00:00:00:00:02", "EvilSpeaker"),
            fixtures::bt_named("AA:00:00:00:00:03", "BT Gateway"),
        ]);

        assert_eq!(
            kinds(&attacks),
            vec![
                AttackKind::BlueborneVulnerability,
                AttackKind::BluetoothSpoofing,
                AttackKind::BluetoothMitm,
            ]
        );
        assert!(attacks[0].description.contains("Android device"));
        assert!(attacks[2].description.ends_with("appears to be gateway"));
    }

    #[test]
    fn test_mass_scanning_and_flooding() {
        let swarm = fixtures::bt_swarm("00", 21);
        let attacks = classify_known(&swarm);

        assert_eq!(kinds(&attacks), vec![AttackKind::BluetoothMassScanning, AttackKind::BleFlooding]);
        assert_eq!(attacks[0].target, "bluetooth_network");
        assert_eq!(attacks[1].target, "ble_network");

        // 11 prefixed devices flood, 20 devices do not count as mass scanning
        let mut mixed = fixtures::bt_swarm("01", 11);
        mixed.extend(fixtures::bt_swarm("AB", 9));
        assert_eq!(kinds(&classify_known(&mixed)), vec![AttackKind::BleFlooding]);

        assert!(classify_known(&fixtures::bt_swarm("02", 10)).is_empty());
    }

    #[test]
    fn test_unknown_bluetooth() {
        let known = KnownDevices::default();
        let ctx = RuleContext::new(&known, datetime!(2024-05-01 10:00:00 UTC));
        let attacks = evaluate(BLUETOOTH_RULES, &[fixtures::bt_named("FF:EE:DD:CC:BB:AA", "Headset")], &ctx);

        assert_eq!(kinds(&attacks), vec![AttackKind::UnknownBluetooth]);
        assert_eq!(attacks[0].description, "Unknown Bluetooth device: Headset (FF:EE:DD:CC:BB:AA)");
    }
}
