/**
 * JOURNAL - Log writer for attacks and scan results
 *
 * ROLE: Implements the `AttackSink` seam on top of `tracing`. Every record goes
 * to target `shheissee::intrusion`, which the file layer persists. Attacks are
 * written twice: a human line and a machine-readable `ATTACK_DETAILS` line.
 */

use shheissee_probe::{Domain, SourceError};
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

use crate::models::{Attack, Severity};

pub const INTRUSION_TARGET: &str = "shheissee::intrusion";

/// Downstream consumer of the attack log. Called synchronously, in append order.
pub trait AttackSink: Send + Sync {
    fn log_attack(&self, attack: &Attack);

    fn log_scan_result(&self, _domain: Domain, _device_count: usize, _attack_count: usize, _error: Option<&SourceError>) {}
}

/// `ATTACK_DETAILS: TYPE=..|SEVERITY=..|TARGET=..|TIME=..|DESC=..` with pipes in the description escaped
pub fn attack_details(attack: &Attack) -> String {
    format!(
        "ATTACK_DETAILS: TYPE={}|SEVERITY={}|TARGET={}|TIME={}|DESC={}",
        attack.kind,
        attack.severity,
        attack.target,
        attack.timestamp.format(&Rfc3339).unwrap_or_default(),
        attack.description.replace('|', "\\|")
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl AttackSink for Journal {
    fn log_attack(&self, attack: &Attack) {
        let line = format!(
            "[{}] {}: {} (Target: {})",
            attack.severity, attack.kind, attack.description, attack.target
        );
        match attack.severity {
            Severity::High => warn!(target: INTRUSION_TARGET, kind = %attack.kind, "{}", line),
            Severity::Medium | Severity::Low => info!(target: INTRUSION_TARGET, kind = %attack.kind, "{}", line),
        }
        info!(target: INTRUSION_TARGET, "{}", attack_details(attack));
    }

    fn log_scan_result(&self, domain: Domain, device_count: usize, attack_count: usize, error: Option<&SourceError>) {
        match error {
            Some(e) => error!(target: INTRUSION_TARGET, %domain, "SCAN_FAILED: {} scan failed - {}", domain, e),
            None => info!(
                target: INTRUSION_TARGET,
                %domain,
                devices = device_count,
                attacks = attack_count,
                "SCAN_COMPLETE: {} scan finished - {} devices found, {} attacks detected",
                domain,
                device_count,
                attack_count
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttackKind;
    use time::macros::datetime;

    #[test]
    fn test_attack_details_line() {
        let attack = Attack::new(
            AttackKind::BluetoothSpoofing,
            Severity::High,
            "Suspicious name: a|b",
            "AA:BB:CC:DD:EE:FF",
            datetime!(2024-05-01 10:00:00 UTC),
        );

        assert_eq!(
            attack_details(&attack),
            "ATTACK_DETAILS: TYPE=BLUETOOTH_SPOOFING|SEVERITY=HIGH|TARGET=AA:BB:CC:DD:EE:FF|TIME=2024-05-01T10:00:00Z|DESC=Suspicious name: a\\|b"
        );
    }
}
