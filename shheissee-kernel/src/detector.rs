/**
 * DETECTION ENGINE - Scan loop orchestration
 *
 * ROLE: Owns the Anomaly State Store and the cumulative attack log. Runs one
 * cycle as network (+ port scan) -> Bluetooth -> WiFi, records observations,
 * evaluates the rule tables and hands every new attack to the sinks.
 *
 * CONCURRENCY:
 * - A cycle holds the writer lock from the first source call to the last sink
 *   call, so readers see the log either before or after a cycle, never halfway.
 * - Readers take the reader lock and get copies.
 * - Every source call is bound to `scan_timeout`; an expired call skips that
 *   domain for the cycle, like any other source failure.
 * - Port scans run one host per call, up to `PORT_SCAN_CONCURRENCY` at once,
 *   all sharing one `scan_timeout` deadline. A host that misses it keeps no
 *   ports; hosts already scanned keep theirs.
 */

use async_trait::async_trait;
use shheissee_probe::{
    BluetoothDevice, BluetoothSource, BluetoothctlScanner, Domain, NetworkDevice, NetworkSource, NmapScanner,
    ProbeConfig, SourceError, WifiDevice, WifiSource, WirelessScanner,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::history::AnomalyStore;
use crate::journal::AttackSink;
use crate::models::Attack;
use crate::registry::KnownDevices;
use crate::rules::{self, anomaly, bluetooth::BLUETOOTH_RULES, network::NETWORK_RULES, wifi::WIFI_RULES, RuleContext};

/// Hosts port-scanned at the same time
pub const PORT_SCAN_CONCURRENCY: usize = 8;

/// Read-only view of the attack log handed to the dashboard
#[async_trait]
pub trait AttackFeed: Send + Sync {
    async fn attack_count(&self) -> usize;

    /// Last `limit` attacks, oldest first
    async fn recent_attacks(&self, limit: usize) -> Vec<Attack>;

    /// Total count and the last `limit` attacks, read in one consistent view
    async fn log_view(&self, limit: usize) -> (usize, Vec<Attack>);
}

/// One adapter per signal domain
#[derive(Clone)]
pub struct Sources {
    pub network: Arc<dyn NetworkSource>,
    pub bluetooth: Arc<dyn BluetoothSource>,
    pub wifi: Arc<dyn WifiSource>,
}

impl Sources {
    /// The OS-backed adapters (nmap/fping, bluetoothctl/hcitool, iwlist/nmcli)
    pub fn system(probe: &ProbeConfig) -> Self {
        Self {
            network: Arc::new(NmapScanner::new(probe.clone())),
            bluetooth: Arc::new(BluetoothctlScanner::new(probe.clone())),
            wifi: Arc::new(WirelessScanner::new(probe.clone())),
        }
    }
}

#[derive(Default)]
struct EngineState {
    store: AnomalyStore,
    log: Vec<Attack>,
}

pub struct Detector {
    sources: Sources,
    known: KnownDevices,
    sinks: Vec<Arc<dyn AttackSink>>,
    state: RwLock<EngineState>,
    scan_interval: Duration,
    scan_timeout: Duration,
    retention: time::Duration,
}

impl Detector {
    pub fn new(config: &DetectorConfig, known: KnownDevices, sources: Sources) -> Self {
        Self {
            sources,
            known,
            sinks: Vec::new(),
            state: RwLock::new(EngineState::default()),
            scan_interval: config.scan_interval(),
            scan_timeout: config.scan_timeout(),
            retention: config.history_retention(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AttackSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn known(&self) -> &KnownDevices {
        &self.known
    }

    pub(crate) fn bluetooth_source(&self) -> &Arc<dyn BluetoothSource> {
        &self.sources.bluetooth
    }

    pub(crate) fn scan_timeout(&self) -> Duration {
        self.scan_timeout
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        tokio::time::timeout(self.scan_timeout, call)
            .await
            .unwrap_or(Err(SourceError::Timeout(self.scan_timeout)))
    }

    fn append(&self, state: &mut EngineState, attacks: Vec<Attack>) {
        for attack in attacks {
            state.log.push(attack);
            if let Some(appended) = state.log.last() {
                for sink in &self.sinks {
                    sink.log_attack(appended);
                }
            }
        }
    }

    fn report_scan(&self, domain: Domain, devices: usize, attacks: usize, error: Option<&SourceError>) {
        for sink in &self.sinks {
            sink.log_scan_result(domain, devices, attacks, error);
        }
    }

    /// Append an attack found outside the scan loop (connection monitor)
    pub(crate) async fn record_attack(&self, attack: Attack) {
        let mut state = self.state.write().await;
        self.append(&mut state, vec![attack]);
    }

    async fn scan_network(&self, state: &mut EngineState) {
        let devices = match self.bounded(self.sources.network.scan()).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Network scan failed: {}", e);
                self.report_scan(Domain::Network, 0, 0, Some(&e));
                return;
            }
        };

        let now = OffsetDateTime::now_utc();
        for device in &devices {
            state.store.record_network_observation(device, now);
        }

        let devices = self.scan_ports(devices).await;

        let ctx = RuleContext::new(&self.known, now);
        let mut attacks = rules::evaluate(NETWORK_RULES, &devices, &ctx);
        attacks.extend(anomaly::evaluate_store(&state.store, now));

        let count = attacks.len();
        self.append(state, attacks);
        self.report_scan(Domain::Network, devices.len(), count, None);
    }

    /// Scan hosts independently; a failed or late host keeps its plain record
    async fn scan_ports(&self, devices: Vec<NetworkDevice>) -> Vec<NetworkDevice> {
        let deadline = Instant::now() + self.scan_timeout;
        let permits = Arc::new(Semaphore::new(PORT_SCAN_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for (index, device) in devices.iter().cloned().enumerate() {
            let source = self.sources.network.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let ip = device.ip.clone();
                let scanned = tokio::time::timeout_at(deadline, async {
                    let _permit = permits
                        .acquire()
                        .await
                        .map_err(|_| SourceError::scan_failed("port scan cancelled"))?;
                    source.scan_ports(vec![device]).await
                })
                .await;
                (index, ip, scanned)
            });
        }

        let mut scanned = devices;
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(Ok(mut result)))) => {
                    if let Some(device) = result.pop() {
                        scanned[index] = device;
                    }
                }
                Ok((_, ip, Ok(Err(e)))) => failures.push(format!("{} ({})", ip, e)),
                Ok((_, ip, Err(_))) => failures.push(format!("{} (timed out)", ip)),
                Err(e) => failures.push(format!("task ({})", e)),
            }
        }

        if !failures.is_empty() {
            warn!(
                "Port scan incomplete for {} of {} hosts: {}",
                failures.len(),
                scanned.len(),
                failures.join(", ")
            );
        }
        scanned
    }

    async fn scan_bluetooth(&self, state: &mut EngineState) {
        let devices = match self.bounded(self.sources.bluetooth.scan()).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Bluetooth scan failed: {}", e);
                self.report_scan(Domain::Bluetooth, 0, 0, Some(&e));
                return;
            }
        };

        let now = OffsetDateTime::now_utc();
        for device in &devices {
            state.store.record_bluetooth_observation(device, now);
        }

        let ctx = RuleContext::new(&self.known, now);
        let attacks = rules::evaluate(BLUETOOTH_RULES, &devices, &ctx);

        let count = attacks.len();
        self.append(state, attacks);
        self.report_scan(Domain::Bluetooth, devices.len(), count, None);
    }

    async fn scan_wifi(&self, state: &mut EngineState) {
        let devices = match self.bounded(self.sources.wifi.scan()).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("WiFi scan failed: {}", e);
                self.report_scan(Domain::Wifi, 0, 0, Some(&e));
                return;
            }
        };

        let signals = match tokio::time::timeout(self.scan_timeout, self.sources.wifi.probe_signals()).await {
            Ok(signals) => signals,
            Err(_) => {
                debug!("WiFi probes timed out, ignoring them this cycle");
                Default::default()
            }
        };

        let ctx = RuleContext::new(&self.known, OffsetDateTime::now_utc()).with_wifi_signals(signals);
        let attacks = rules::evaluate(WIFI_RULES, &devices, &ctx);

        let count = attacks.len();
        self.append(state, attacks);
        self.report_scan(Domain::Wifi, devices.len(), count, None);
    }

    /// One full pass over every domain. Returns the attacks this cycle appended.
    pub async fn run_cycle(&self) -> Vec<Attack> {
        let mut state = self.state.write().await;
        let first_new = state.log.len();

        let evicted = state.store.prune_inactive(OffsetDateTime::now_utc(), self.retention);
        if evicted > 0 {
            debug!("Evicted {} inactive devices from history", evicted);
        }

        self.scan_network(&mut state).await;
        self.scan_bluetooth(&mut state).await;
        self.scan_wifi(&mut state).await;

        state.log[first_new..].to_vec()
    }

    /// Single cycle on demand
    pub async fn quick_scan(&self) -> Vec<Attack> {
        info!("Running quick security scan");
        let attacks = self.run_cycle().await;
        info!("Quick scan finished with {} findings", attacks.len());
        attacks
    }

    /// Cycle, sleep `scan_interval`, repeat until `shutdown` resolves.
    /// A cycle in progress always completes.
    pub async fn run_continuous<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let attacks = self.run_cycle().await;
            info!(
                "Scan complete: {} new attacks. Next scan in {}s",
                attacks.len(),
                self.scan_interval.as_secs()
            );

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping the scan loop");
                    break;
                }
                _ = tokio::time::sleep(self.scan_interval) => {}
            }
        }
    }

    pub async fn list_bluetooth(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        self.bounded(self.sources.bluetooth.scan()).await
    }

    pub async fn list_wifi(&self) -> Result<Vec<WifiDevice>, SourceError> {
        self.bounded(self.sources.wifi.scan()).await
    }

    /// Rescan Bluetooth every `every` and hand each result to `show`, until
    /// `shutdown` resolves. Returns the number of scans.
    pub async fn watch_bluetooth<F, S>(&self, every: Duration, shutdown: S, mut show: F) -> usize
    where
        F: FnMut(Result<Vec<BluetoothDevice>, SourceError>),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut scans = 0;
        loop {
            let result = self.list_bluetooth().await;
            if let Err(e) = &result {
                warn!("Bluetooth monitoring error: {}", e);
            }
            show(result);
            scans += 1;

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(every) => {}
            }
        }
        scans
    }
}

#[async_trait]
impl AttackFeed for Detector {
    async fn attack_count(&self) -> usize {
        self.state.read().await.log.len()
    }

    async fn recent_attacks(&self, limit: usize) -> Vec<Attack> {
        let state = self.state.read().await;
        let start = state.log.len().saturating_sub(limit);
        state.log[start..].to_vec()
    }

    async fn log_view(&self, limit: usize) -> (usize, Vec<Attack>) {
        let state = self.state.read().await;
        let start = state.log.len().saturating_sub(limit);
        (state.log.len(), state.log[start..].to_vec())
    }
}
