//! Network rule family: unregistered hosts and risky open services

use shheissee_probe::NetworkDevice;

use super::{Finding, Rule, RuleContext, RuleSpec};
use crate::models::{AttackKind, Severity};

/// Ports flagged when open, with the service they usually carry
pub const SUSPICIOUS_PORTS: &[(u16, &str)] = &[(21, "FTP"), (23, "Telnet"), (445, "SMB"), (3389, "RDP")];

fn unregistered(device: &NetworkDevice, ctx: &RuleContext<'_>) -> bool {
    !ctx.known.is_known_network(device)
}

fn describe_unknown(device: &NetworkDevice) -> Finding {
    Finding::new(format!("Unknown device detected: {}", device.ip), device.ip.clone())
}

fn suspicious_ports(snapshot: &[NetworkDevice], _: &RuleContext<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for device in snapshot {
        for port in device.ports.iter().filter(|p| p.is_open()) {
            if let Some((_, service)) = SUSPICIOUS_PORTS.iter().find(|(number, _)| *number == port.number) {
                findings.push(Finding::new(
                    format!("Suspicious open port detected: {}:{} ({})", device.ip, port.number, service),
                    device.ip.clone(),
                ));
            }
        }
    }
    findings
}

pub const NETWORK_RULES: &[RuleSpec<NetworkDevice>] = &[
    RuleSpec {
        kind: AttackKind::UnknownDevice,
        severity: Severity::High,
        rule: Rule::Device {
            matches: unregistered,
            describe: describe_unknown,
        },
    },
    RuleSpec {
        kind: AttackKind::SuspiciousPort,
        severity: Severity::Medium,
        rule: Rule::Snapshot(suspicious_ports),
    },
];
