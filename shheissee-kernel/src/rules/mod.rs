/**
 * ATTACK CLASSIFIER - Declarative rule tables
 *
 * ROLE: Maps one domain snapshot (plus the registry and the WiFi probe signals)
 * to Attack events. Each domain has a table of {kind, severity, rule}; the
 * cross-domain family reads the Anomaly State Store instead of a snapshot.
 *
 * SHAPE:
 * - `Rule::Device`: predicate + description, evaluated per device in snapshot order
 * - `Rule::Snapshot`: whole-snapshot evaluation (duplicates, counts, per-port checks)
 *
 * Rules are independent; one device may trigger several in one cycle.
 */

use shheissee_probe::WifiSignals;
use time::OffsetDateTime;

use crate::models::{Attack, AttackKind, Severity};
use crate::registry::KnownDevices;

pub mod anomaly;
pub mod bluetooth;
pub mod network;
pub mod wifi;

/// Inputs shared by every rule of one evaluation
pub struct RuleContext<'a> {
    pub known: &'a KnownDevices,
    pub now: OffsetDateTime,
    pub wifi: WifiSignals,
}

impl<'a> RuleContext<'a> {
    pub fn new(known: &'a KnownDevices, now: OffsetDateTime) -> Self {
        Self {
            known,
            now,
            wifi: WifiSignals::default(),
        }
    }

    pub fn with_wifi_signals(mut self, wifi: WifiSignals) -> Self {
        self.wifi = wifi;
        self
    }
}

/// Description and target of one match; kind, severity and time come from the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub description: String,
    pub target: String,
}

impl Finding {
    pub fn new(description: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target: target.into(),
        }
    }
}

pub enum Rule<D> {
    Device {
        matches: fn(&D, &RuleContext<'_>) -> bool,
        describe: fn(&D) -> Finding,
    },
    Snapshot(fn(&[D], &RuleContext<'_>) -> Vec<Finding>),
}

pub struct RuleSpec<D> {
    pub kind: AttackKind,
    pub severity: Severity,
    pub rule: Rule<D>,
}

impl<D> RuleSpec<D> {
    fn findings(&self, snapshot: &[D], ctx: &RuleContext<'_>) -> Vec<Finding> {
        match &self.rule {
            Rule::Device { matches, describe } => snapshot
                .iter()
                .filter(|device| matches(*device, ctx))
                .map(|device| describe(device))
                .collect(),
            Rule::Snapshot(evaluate) => evaluate(snapshot, ctx),
        }
    }
}

/// Run every rule of `table` over `snapshot`, in table order
pub fn evaluate<D>(table: &[RuleSpec<D>], snapshot: &[D], ctx: &RuleContext<'_>) -> Vec<Attack> {
    table
        .iter()
        .flat_map(|spec| {
            spec.findings(snapshot, ctx)
                .into_iter()
                .map(move |finding| Attack::new(spec.kind, spec.severity, finding.description, finding.target, ctx.now))
        })
        .collect()
}

/// Case-insensitive substring match against a keyword list
pub(crate) fn first_keyword<'k>(text: &str, keywords: &[&'k str]) -> Option<&'k str> {
    let lower = text.to_lowercase();
    keywords.iter().copied().find(|keyword| lower.contains(keyword))
}
