/**
 * DASHBOARD FEED - Cached view of the attack log for the HTTP API
 *
 * ROLE: Keeps the last `DASHBOARD_CAPACITY` attacks and the total count in a
 * shared cache, replaced wholesale by a background poller. HTTP handlers only
 * ever read this cache, so they never wait on a scan cycle.
 */

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::detector::AttackFeed;
use crate::models::Attack;
use crate::state::{new_state, Shared};

pub const DASHBOARD_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub total_attacks: usize,
    /// Oldest first
    pub attacks: Vec<Attack>,
    pub refreshed_at: OffsetDateTime,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            total_attacks: 0,
            attacks: Vec::new(),
            refreshed_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Clone, Default)]
pub struct DashboardFeed {
    snapshot: Shared<DashboardSnapshot>,
}

impl DashboardFeed {
    pub fn new() -> Self {
        Self {
            snapshot: new_state(DashboardSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.read().clone()
    }

    /// Last `limit` cached attacks, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Attack> {
        let snapshot = self.snapshot.read();
        let start = snapshot.attacks.len().saturating_sub(limit);
        snapshot.attacks[start..].to_vec()
    }

    pub fn replace(&self, total_attacks: usize, mut attacks: Vec<Attack>) {
        if attacks.len() > DASHBOARD_CAPACITY {
            attacks.drain(..attacks.len() - DASHBOARD_CAPACITY);
        }
        *self.snapshot.write() = DashboardSnapshot {
            total_attacks,
            attacks,
            refreshed_at: OffsetDateTime::now_utc(),
        };
    }

    /// Count and attacks come from the same read of the log
    pub async fn refresh(&self, feed: &dyn AttackFeed) {
        let (total, attacks) = feed.log_view(DASHBOARD_CAPACITY).await;
        debug!("Dashboard refreshed: {} attacks total, {} cached", total, attacks.len());
        self.replace(total, attacks);
    }

    /// Republish the log into the cache every `every`
    pub fn spawn_poller(&self, feed: Arc<dyn AttackFeed>, every: Duration) -> JoinHandle<()> {
        let dashboard = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                dashboard.refresh(feed.as_ref()).await;
            }
        })
    }
}
