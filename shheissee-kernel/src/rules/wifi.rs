//! WiFi rule family, including the findings of the optional radio probes

use shheissee_probe::WifiDevice;
use std::collections::BTreeMap;

use super::{first_keyword, Finding, Rule, RuleContext, RuleSpec};
use crate::models::{AttackKind, Severity};

const HIDDEN_SSID: &str = "Hidden";
const ROGUE_KEYWORDS: &[&str] = &["free", "public", "hack", "test", "evil", "wifi", "guest", "default"];
const DEAUTH_FRAMES: u32 = 5;

fn evil_twins(snapshot: &[WifiDevice], _: &RuleContext<'_>) -> Vec<Finding> {
    let mut by_ssid: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for device in snapshot {
        let ssid = device.display_ssid();
        if !ssid.is_empty() && ssid != HIDDEN_SSID {
            by_ssid.entry(ssid).or_default().push(&device.address);
        }
    }

    by_ssid
        .into_iter()
        .filter(|(_, addresses)| addresses.len() > 1)
        .map(|(ssid, addresses)| {
            Finding::new(
                format!(
                    "Potential evil twin attack: SSID '{}' appears {} times",
                    ssid,
                    addresses.len()
                ),
                addresses.join(", "),
            )
        })
        .collect()
}

fn rogue_name(device: &WifiDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_ssid(), ROGUE_KEYWORDS).is_some()
}

fn describe_rogue(device: &WifiDevice) -> Finding {
    Finding::new(
        format!("Potentially rogue access point detected: {}", device.display_ssid()),
        device.display_ssid(),
    )
}

fn open_name(device: &WifiDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_ssid(), &["open"]).is_some()
}

fn describe_open(device: &WifiDevice) -> Finding {
    Finding::new(
        format!("Open WiFi network detected: {}", device.display_ssid()),
        device.display_ssid(),
    )
}

fn wep_name(device: &WifiDevice, _: &RuleContext<'_>) -> bool {
    first_keyword(device.display_ssid(), &["wep"]).is_some()
}

fn describe_wep(device: &WifiDevice) -> Finding {
    Finding::new(
        format!("Weak encryption (WEP) detected on network: {}", device.display_ssid()),
        device.display_ssid(),
    )
}

fn wps_enabled(_: &[WifiDevice], ctx: &RuleContext<'_>) -> Vec<Finding> {
    if !ctx.wifi.wps_capable {
        return Vec::new();
    }
    vec![Finding::new(
        "WPS-enabled networks detected - vulnerable to pixie dust and brute force attacks",
        "wifi_network",
    )]
}

fn deauth_flood(_: &[WifiDevice], ctx: &RuleContext<'_>) -> Vec<Finding> {
    if ctx.wifi.deauth_frames <= DEAUTH_FRAMES {
        return Vec::new();
    }
    vec![Finding::new(
        format!(
            "Deauthentication attack detected: {} deauth packets observed",
            ctx.wifi.deauth_frames
        ),
        "wifi_network",
    )]
}

fn monitor_mode(_: &[WifiDevice], ctx: &RuleContext<'_>) -> Vec<Finding> {
    if !ctx.wifi.monitor_mode {
        return Vec::new();
    }
    vec![Finding::new("WiFi monitoring active - checking for attacks", "wifi")]
}

pub const WIFI_RULES: &[RuleSpec<WifiDevice>] = &[
    RuleSpec {
        kind: AttackKind::EvilTwin,
        severity: Severity::High,
        rule: Rule::Snapshot(evil_twins),
    },
    RuleSpec {
        kind: AttackKind::RogueAp,
        severity: Severity::High,
        rule: Rule::Device { matches: rogue_name, describe: describe_rogue },
    },
    RuleSpec {
        kind: AttackKind::OpenNetwork,
        severity: Severity::Medium,
        rule: Rule::Device { matches: open_name, describe: describe_open },
    },
    RuleSpec {
        kind: AttackKind::WeakEncryption,
        severity: Severity::High,
        rule: Rule::Device { matches: wep_name, describe: describe_wep },
    },
    RuleSpec {
        kind: AttackKind::WpsVulnerability,
        severity: Severity::Medium,
        rule: Rule::Snapshot(wps_enabled),
    },
    RuleSpec {
        kind: AttackKind::WifiDeauthAttack,
        severity: Severity::High,
        rule: Rule::Snapshot(deauth_flood),
    },
    RuleSpec {
        kind: AttackKind::WifiMonitoring,
        severity: Severity::Low,
        rule: Rule::Snapshot(monitor_mode),
    },
];
