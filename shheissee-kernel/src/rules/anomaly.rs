//! Cross-domain ("AI") rule family, evaluated over the whole Anomaly State Store

use std::collections::VecDeque;
use time::{Duration, OffsetDateTime};

use super::Finding;
use crate::history::{AnomalyStore, RssiSample};
use crate::models::{Attack, AttackKind, Severity};

const MIN_CONNECTIONS: usize = 10;
const MIN_RSSI_SAMPLES: usize = 5;
const RSSI_JUMP_DBM: i32 = 20;
const MASS_APPEARANCE_DEVICES: usize = 3;

fn burst_interval() -> Duration {
    Duration::seconds(10)
}

fn recent_window() -> Duration {
    Duration::seconds(60)
}

pub struct AnomalyRule {
    pub kind: AttackKind,
    pub severity: Severity,
    pub evaluate: fn(&AnomalyStore, OffsetDateTime) -> Vec<Finding>,
}

/// Mean gap between consecutive timestamps over the whole window is under 10s
pub fn is_connection_burst(timestamps: &VecDeque<OffsetDateTime>) -> bool {
    let (Some(first), Some(last)) = (timestamps.front(), timestamps.back()) else {
        return false;
    };
    if timestamps.len() < 2 {
        return false;
    }
    let gaps = timestamps.len() as i32 - 1;
    (*last - *first) / gaps < burst_interval()
}

/// Latest sample jumped more than 20 dBm from the previous one
pub fn is_rssi_jump(values: &[i32]) -> bool {
    match values {
        [.., previous, latest] => (latest - previous).abs() > RSSI_JUMP_DBM,
        _ => false,
    }
}

fn connection_anomalies(store: &AnomalyStore, _: OffsetDateTime) -> Vec<Finding> {
    let mut ids: Vec<&str> = store
        .connection_histories()
        .filter(|(_, timestamps)| timestamps.len() >= MIN_CONNECTIONS && is_connection_burst(timestamps))
        .map(|(id, _)| id)
        .collect();
    ids.sort_unstable();

    ids.into_iter()
        .map(|id| {
            Finding::new(
                format!("AI detected unusually frequent connections from device {}", id),
                id,
            )
        })
        .collect()
}

fn rssi_values(samples: &VecDeque<RssiSample>) -> Vec<i32> {
    samples.iter().map(|s| s.value).collect()
}

fn rssi_anomalies(store: &AnomalyStore, _: OffsetDateTime) -> Vec<Finding> {
    let mut ids: Vec<&str> = store
        .rssi_histories()
        .filter(|(_, samples)| samples.len() >= MIN_RSSI_SAMPLES && is_rssi_jump(&rssi_values(samples)))
        .map(|(id, _)| id)
        .collect();
    ids.sort_unstable();

    ids.into_iter()
        .map(|id| Finding::new(format!("AI detected anomalous RSSI behavior for device {}", id), id))
        .collect()
}

fn mass_appearance(store: &AnomalyStore, now: OffsetDateTime) -> Vec<Finding> {
    let recent = store
        .devices()
        .filter(|(_, history)| now - history.last_seen < recent_window())
        .count();
    if recent <= MASS_APPEARANCE_DEVICES {
        return Vec::new();
    }
    vec![Finding::new(
        format!(
            "AI detected mass appearance of {} unknown devices - potential scanning attack",
            recent
        ),
        "network",
    )]
}

pub const ANOMALY_RULES: &[AnomalyRule] = &[
    AnomalyRule {
        kind: AttackKind::AiConnectionAnomaly,
        severity: Severity::High,
        evaluate: connection_anomalies,
    },
    AnomalyRule {
        kind: AttackKind::AiRssiAnomaly,
        severity: Severity::Medium,
        evaluate: rssi_anomalies,
    },
    AnomalyRule {
        kind: AttackKind::AiMassDeviceAnomaly,
        severity: Severity::High,
        evaluate: mass_appearance,
    },
];

/// Run the cross-domain table over the store as of `now`
pub fn evaluate_store(store: &AnomalyStore, now: OffsetDateTime) -> Vec<Attack> {
    ANOMALY_RULES
        .iter()
        .flat_map(|rule| {
            (rule.evaluate)(store, now)
                .into_iter()
                .map(move |finding| Attack::new(rule.kind, rule.severity, finding.description, finding.target, now))
        })
        .collect()
}
