/*!
Stub device sources

Each stub replays a script of responses: calls consume the queued responses in
order and the last one keeps repeating. Optional delays make slow or hanging
utilities reproducible, and call counters let tests assert how often the engine
asked.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use shheissee_probe::{
    BluetoothDevice, BluetoothSource, NetworkDevice, NetworkSource, Port, SourceError, WifiDevice,
    WifiSignals, WifiSource,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Queue of scripted responses; the last one is sticky
struct Script<T> {
    queue: VecDeque<Result<T, SourceError>>,
}

impl<T: Clone> Script<T> {
    fn new(first: Result<T, SourceError>) -> Self {
        Self {
            queue: VecDeque::from([first]),
        }
    }

    fn push(&mut self, next: Result<T, SourceError>) {
        self.queue.push_back(next);
    }

    fn next(&mut self) -> Result<T, SourceError> {
        if self.queue.len() > 1 {
            if let Some(front) = self.queue.pop_front() {
                return front;
            }
        }
        self.queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(SourceError::Unavailable("stub".into())))
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub struct StubNetworkSource {
    scans: Mutex<Script<Vec<NetworkDevice>>>,
    open_ports: HashMap<String, Vec<Port>>,
    slow_hosts: HashMap<String, Duration>,
    port_failure: Option<SourceError>,
    delay: Option<Duration>,
    scan_calls: AtomicUsize,
    port_scan_calls: AtomicUsize,
}

impl StubNetworkSource {
    pub fn new(devices: Vec<NetworkDevice>) -> Self {
        Self::scripted(Ok(devices))
    }

    pub fn failing(error: SourceError) -> Self {
        Self::scripted(Err(error))
    }

    fn scripted(first: Result<Vec<NetworkDevice>, SourceError>) -> Self {
        Self {
            scans: Mutex::new(Script::new(first)),
            open_ports: HashMap::new(),
            slow_hosts: HashMap::new(),
            port_failure: None,
            delay: None,
            scan_calls: AtomicUsize::new(0),
            port_scan_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the response for the following scan
    pub fn then(self, next: Result<Vec<NetworkDevice>, SourceError>) -> Self {
        self.scans.lock().push(next);
        self
    }

    /// Ports reported for `ip` by `scan_ports`
    pub fn with_ports(mut self, ip: &str, ports: Vec<Port>) -> Self {
        self.open_ports.insert(ip.to_string(), ports);
        self
    }

    /// Port scans that include `ip` take `delay` before answering
    pub fn with_slow_host(mut self, ip: &str, delay: Duration) -> Self {
        self.slow_hosts.insert(ip.to_string(), delay);
        self
    }

    pub fn with_port_failure(mut self, error: SourceError) -> Self {
        self.port_failure = Some(error);
        self
    }

    /// Every scan sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn port_scan_calls(&self) -> usize {
        self.port_scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkSource for StubNetworkSource {
    async fn scan(&self) -> Result<Vec<NetworkDevice>, SourceError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.scans.lock().next()
    }

    async fn scan_ports(&self, mut devices: Vec<NetworkDevice>) -> Result<Vec<NetworkDevice>, SourceError> {
        self.port_scan_calls.fetch_add(1, Ordering::SeqCst);
        let slowest = devices.iter().filter_map(|d| self.slow_hosts.get(&d.ip)).max().copied();
        pause(slowest).await;
        if let Some(error) = &self.port_failure {
            return Err(error.clone());
        }
        for device in devices.iter_mut() {
            if let Some(ports) = self.open_ports.get(&device.ip) {
                device.ports = ports.clone();
            }
        }
        Ok(devices)
    }
}

// ---------------------------------------------------------------------------
// Bluetooth
// ---------------------------------------------------------------------------

pub struct StubBluetoothSource {
    scans: Mutex<Script<Vec<BluetoothDevice>>>,
    monitor: Result<Vec<String>, SourceError>,
    line_interval: Option<Duration>,
    delay: Option<Duration>,
    scan_calls: AtomicUsize,
}

impl StubBluetoothSource {
    pub fn new(devices: Vec<BluetoothDevice>) -> Self {
        Self::scripted(Ok(devices))
    }

    pub fn failing(error: SourceError) -> Self {
        Self::scripted(Err(error))
    }

    fn scripted(first: Result<Vec<BluetoothDevice>, SourceError>) -> Self {
        Self {
            scans: Mutex::new(Script::new(first)),
            monitor: Ok(Vec::new()),
            line_interval: None,
            delay: None,
            scan_calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, next: Result<Vec<BluetoothDevice>, SourceError>) -> Self {
        self.scans.lock().push(next);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lines replayed by `monitor_connections`; the stream closes after the last one
    pub fn with_monitor_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.monitor = Ok(lines.into_iter().map(Into::into).collect());
        self
    }

    /// Pause between replayed monitor lines
    pub fn with_line_interval(mut self, interval: Duration) -> Self {
        self.line_interval = Some(interval);
        self
    }

    pub fn with_monitor_failure(mut self, error: SourceError) -> Self {
        self.monitor = Err(error);
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BluetoothSource for StubBluetoothSource {
    async fn scan(&self) -> Result<Vec<BluetoothDevice>, SourceError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.scans.lock().next()
    }

    async fn monitor_connections(&self) -> Result<mpsc::Receiver<String>, SourceError> {
        let lines = self.monitor.clone()?;
        let interval = self.line_interval;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            for line in lines {
                pause(interval).await;
                if tx.send(line).await.is_err() {
                    tracing::debug!("stub monitor consumer went away");
                    break;
                }
            }
        });

        Ok(rx)
    }
}

// ---------------------------------------------------------------------------
// WiFi
// ---------------------------------------------------------------------------

pub struct StubWifiSource {
    scans: Mutex<Script<Vec<WifiDevice>>>,
    signals: WifiSignals,
    delay: Option<Duration>,
    scan_calls: AtomicUsize,
}

impl StubWifiSource {
    pub fn new(devices: Vec<WifiDevice>) -> Self {
        Self::scripted(Ok(devices))
    }

    pub fn failing(error: SourceError) -> Self {
        Self::scripted(Err(error))
    }

    fn scripted(first: Result<Vec<WifiDevice>, SourceError>) -> Self {
        Self {
            scans: Mutex::new(Script::new(first)),
            signals: WifiSignals::default(),
            delay: None,
            scan_calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, next: Result<Vec<WifiDevice>, SourceError>) -> Self {
        self.scans.lock().push(next);
        self
    }

    pub fn with_signals(mut self, signals: WifiSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WifiSource for StubWifiSource {
    async fn scan(&self) -> Result<Vec<WifiDevice>, SourceError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.scans.lock().next()
    }

    async fn probe_signals(&self) -> WifiSignals {
        self.signals
    }
}
