/**
 * SHHEISSEE - Personal-network intrusion monitor
 *
 * ROLE: Bootstrap. Loads config and allowlists, wires the OS-backed sources,
 * the journal and console sinks into the detection engine, then runs the
 * requested command.
 *
 * COMMANDS: monitor (continuous scan + dashboard), scan (one cycle),
 * bluetooth (live connection monitor), devices, demo, web (dashboard only).
 * Without a command: the numbered menu on a terminal, monitor otherwise.
 */

mod config;
mod console;
mod dashboard;
mod detector;
mod history;
mod http;
mod journal;
mod logging;
mod models;
mod monitor;
mod registry;
mod rules;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::config::{load_config, load_config_from, DetectorConfig};
use crate::console::{ConsoleReporter, MenuChoice};
use crate::dashboard::DashboardFeed;
use crate::detector::{AttackFeed, Detector, Sources};
use crate::http::AppState;
use crate::journal::Journal;
use crate::registry::KnownDevices;

#[derive(Parser)]
#[command(name = "shheissee", version, about = "Personal-network intrusion monitor")]
struct Cli {
    /// Config file (overrides SHHEISSEE_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Continuous monitoring with the web dashboard
    #[command(alias = "start")]
    Monitor,
    /// Run a single scan cycle and print the findings
    Scan,
    /// Watch live Bluetooth connection and pairing attempts
    Bluetooth,
    /// List nearby devices
    Devices {
        #[command(subcommand)]
        kind: DeviceKind,
    },
    /// Write demo allowlists
    Demo,
    /// Serve the dashboard without scanning
    Web,
}

#[derive(Subcommand)]
enum DeviceKind {
    Bluetooth {
        /// Keep rescanning until Ctrl-C
        #[arg(long)]
        watch: bool,
        /// Seconds between scans in watch mode
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    Wifi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => load_config_from(path).await,
        None => load_config().await,
    };
    let _log_guard = logging::init_logging(&config.log_file).context("initialising logging")?;

    let command = match cli.command {
        Some(command) => command,
        None if std::io::stdin().is_terminal() => return run_menu(&config).await,
        None => Command::Monitor,
    };

    match command {
        Command::Monitor => run_monitor(&config).await,
        Command::Scan => run_scan(&config).await,
        Command::Bluetooth => run_bluetooth_monitor(&config).await,
        Command::Devices { kind } => list_devices(&config, kind).await,
        Command::Demo => {
            registry::write_demo(&config).await?;
            println!("Demo allowlists written to {} and {}", config.known_devices_file, config.bluetooth_devices_file);
            Ok(())
        }
        Command::Web => run_web(&config).await,
    }
}

async fn build_detector(config: &DetectorConfig) -> anyhow::Result<Detector> {
    let known = KnownDevices::load(config).await.context("loading known-device allowlists")?;
    info!(
        "Loaded {} known network and {} known Bluetooth devices",
        known.network.len(),
        known.bluetooth.len()
    );

    Ok(Detector::new(config, known, Sources::system(&config.probe))
        .with_sink(Arc::new(Journal))
        .with_sink(Arc::new(ConsoleReporter)))
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn start_dashboard(config: &DetectorConfig, feed: Arc<dyn AttackFeed>) -> DashboardFeed {
    let dashboard = DashboardFeed::new();
    dashboard.spawn_poller(feed, config.dashboard_refresh());
    dashboard
}

async fn run_monitor(config: &DetectorConfig) -> anyhow::Result<()> {
    let detector = Arc::new(build_detector(config).await?);
    ConsoleReporter.print_status(detector.known(), detector.attack_count().await);

    let dashboard = start_dashboard(config, detector.clone());
    let port = config.web_server_port;
    tokio::spawn(async move {
        if let Err(e) = http::serve(port, AppState::from_env(dashboard)).await {
            error!("Dashboard unavailable: {:#}", e);
        }
    });

    detector.run_continuous(shutdown_signal()).await;
    info!("Monitoring stopped, {} attacks recorded", detector.attack_count().await);
    Ok(())
}

async fn run_scan(config: &DetectorConfig) -> anyhow::Result<()> {
    let detector = build_detector(config).await?;
    let attacks = detector.quick_scan().await;
    ConsoleReporter.print_summary(&attacks);
    Ok(())
}

async fn run_bluetooth_monitor(config: &DetectorConfig) -> anyhow::Result<()> {
    let detector = build_detector(config).await?;
    println!("Monitoring Bluetooth connection attempts. Press Ctrl+C to stop.");

    tokio::select! {
        result = detector.monitor_connections() => {
            let count = result.context("starting the Bluetooth connection monitor")?;
            info!("Bluetooth monitor finished with {} events", count);
        }
        _ = shutdown_signal() => info!("Bluetooth monitor stopped"),
    }
    Ok(())
}

async fn list_devices(config: &DetectorConfig, kind: DeviceKind) -> anyhow::Result<()> {
    let detector = build_detector(config).await?;
    match kind {
        DeviceKind::Bluetooth { watch: true, interval } => {
            watch_bluetooth_devices(&detector, Duration::from_secs(interval.max(1))).await;
        }
        DeviceKind::Bluetooth { watch: false, .. } => {
            let devices = detector.list_bluetooth().await.context("scanning Bluetooth devices")?;
            ConsoleReporter.print_bluetooth_devices(&devices, detector.known());
        }
        DeviceKind::Wifi => {
            let devices = detector.list_wifi().await.context("scanning WiFi networks")?;
            ConsoleReporter.print_wifi_devices(&devices);
        }
    }
    Ok(())
}

async fn run_web(config: &DetectorConfig) -> anyhow::Result<()> {
    let detector = Arc::new(build_detector(config).await?);
    let dashboard = start_dashboard(config, detector);
    let state = AppState::from_env(dashboard);
    if state.api_key.is_none() {
        warn!("{} not set, API is open to anyone who can reach the port", http::API_KEY_ENV);
    }

    tokio::select! {
        result = http::serve(config.web_server_port, state) => result,
        _ = shutdown_signal() => Ok(()),
    }
}

async fn watch_bluetooth_devices(detector: &Detector, every: Duration) {
    println!("Monitoring Bluetooth devices. Press Ctrl+C to stop.");
    let scans = detector
        .watch_bluetooth(every, shutdown_signal(), |result| {
            match result {
                Ok(devices) => ConsoleReporter.print_bluetooth_devices(&devices, detector.known()),
                Err(e) => println!("Bluetooth scan failed: {}", e),
            }
            println!("Next scan in {} seconds...", every.as_secs());
        })
        .await;
    info!("Bluetooth device watch stopped after {} scans", scans);
}

/// Numbered menu on stdin; returns on "7" or end of input
async fn run_menu(config: &DetectorConfig) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("{}", console::render_menu());
        print!("{}", console::MENU_PROMPT);
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("reading menu choice")? else {
            return Ok(());
        };
        let Some(choice) = MenuChoice::parse(&line) else {
            println!("{}", console::MENU_INVALID);
            continue;
        };

        let result = match choice {
            MenuChoice::FullMonitoring => run_monitor(config).await,
            MenuChoice::ListBluetooth => {
                list_devices(config, DeviceKind::Bluetooth { watch: false, interval: 30 }).await
            }
            MenuChoice::WatchBluetooth => {
                list_devices(config, DeviceKind::Bluetooth { watch: true, interval: 30 }).await
            }
            MenuChoice::ConnectionMonitor => run_bluetooth_monitor(config).await,
            MenuChoice::QuickScan => run_scan(config).await,
            MenuChoice::ListWifi => list_devices(config, DeviceKind::Wifi).await,
            MenuChoice::Exit => {
                println!("Goodbye.");
                return Ok(());
            }
        };
        if let Err(e) = result {
            error!("{:#}", e);
        }
    }
}
