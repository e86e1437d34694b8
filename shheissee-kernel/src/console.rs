//! Operator-facing terminal output: attack cards, status banner, device tables

use shheissee_probe::{BluetoothDevice, WifiDevice};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::journal::AttackSink;
use crate::models::{Attack, Severity};
use crate::registry::KnownDevices;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const PURPLE: &str = "\x1b[35m";

const BANNER: &str = r##"
 mmmm  m    m m    m mmmmmm mmmmm   mmmm   mmmm  mmmmmm mmmmmm
#"   " #    # #    # #        #    #"   " #"   " #      #
"#mmm  #mmmm# #mmmm# #mmmmm   #    "#mmm  "#mmm  #mmmmm #mmmmm
    "# #    # #    # #        #        "#     "# #      #
"mmm#" #    # #    # #mmmmm mm#mm  "mmm#" "mmm#" #mmmmm #mmmmm
"##;

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::High => RED,
        Severity::Medium => YELLOW,
        Severity::Low => BLUE,
    }
}

fn local_time(at: OffsetDateTime) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    at.to_offset(offset)
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Colored, multi-line card for one attack
pub fn render_attack(attack: &Attack) -> String {
    format!(
        "\n{color}{BOLD}[{severity}] {kind}{RESET}\n\
         {BOLD}Description:{RESET} {description}\n\
         {BOLD}Target:{RESET} {target}\n\
         {BOLD}Time:{RESET} {time}",
        color = severity_color(attack.severity),
        severity = attack.severity,
        kind = attack.kind,
        description = attack.description,
        target = attack.target,
        time = local_time(attack.timestamp),
    )
}

pub fn render_bluetooth_table(devices: &[BluetoothDevice], known: &KnownDevices) -> String {
    if devices.is_empty() {
        return format!("{YELLOW}No Bluetooth devices found nearby.{RESET}");
    }

    let mut out = format!("\n{GREEN}Found {} Bluetooth device(s):{RESET}\n", devices.len());
    out.push_str(&format!(
        "{BOLD}{:<18} {:<30} {:<6} {:<10}{RESET}\n",
        "MAC Address", "Device Name", "RSSI", "Status"
    ));
    out.push_str(&"-".repeat(70));
    out.push('\n');

    for device in devices {
        let rssi = device.rssi.map_or_else(|| "N/A".to_string(), |r| r.to_string());
        let status = if known.is_known_bluetooth(&device.address) { "Known" } else { "Unknown" };
        out.push_str(&format!(
            "{:<18} {:<30} {:<6} {:<10}\n",
            device.address,
            device.display_name(),
            rssi,
            status
        ));
    }
    out
}

pub fn render_wifi_table(devices: &[WifiDevice]) -> String {
    if devices.is_empty() {
        return format!("{YELLOW}No WiFi networks found nearby.{RESET}");
    }

    let mut out = format!("\n{GREEN}Found {} WiFi network(s):{RESET}\n", devices.len());
    out.push_str(&format!(
        "{BOLD}{:<18} {:<32} {:<8} {:<8}{RESET}\n",
        "BSSID", "SSID", "Signal", "Channel"
    ));
    out.push_str(&"-".repeat(70));
    out.push('\n');

    for device in devices {
        let ssid = if device.display_ssid().is_empty() { "Hidden" } else { device.display_ssid() };
        let signal = device.signal_dbm.map_or_else(|| "N/A".to_string(), |s| format!("{} dBm", s));
        out.push_str(&format!(
            "{:<18} {:<32} {:<8} {:<8}\n",
            device.address,
            ssid,
            signal,
            device.channel.as_deref().unwrap_or("-")
        ));
    }
    out
}

/// Banner plus monitoring totals
pub fn render_status(known: &KnownDevices, total_attacks: usize) -> String {
    format!(
        "\n{PURPLE}{BOLD}{BANNER}{RESET}\n\
         {GREEN}Shheissee Monitoring Status: {BOLD}ACTIVE{RESET}\n\
         Known Network Devices: {}\n\
         Known Bluetooth Devices: {}\n\
         Total Attacks Detected: {}\n\
         {BLUE}Press Ctrl+C to stop monitoring{RESET}\n",
        known.network.len(),
        known.bluetooth.len(),
        total_attacks,
    )
}

/// Interactive menu entries, numbered 1-7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    FullMonitoring,
    ListBluetooth,
    WatchBluetooth,
    ConnectionMonitor,
    QuickScan,
    ListWifi,
    Exit,
}

impl MenuChoice {
    const ALL: [MenuChoice; 7] = [
        MenuChoice::FullMonitoring,
        MenuChoice::ListBluetooth,
        MenuChoice::WatchBluetooth,
        MenuChoice::ConnectionMonitor,
        MenuChoice::QuickScan,
        MenuChoice::ListWifi,
        MenuChoice::Exit,
    ];

    /// Trimmed "1".."7"; anything else is `None`
    pub fn parse(input: &str) -> Option<Self> {
        let n: usize = input.trim().parse().ok()?;
        Self::ALL.get(n.checked_sub(1)?).copied()
    }

    fn label(self) -> &'static str {
        match self {
            MenuChoice::FullMonitoring => "Start full monitoring (network + Bluetooth + WiFi)",
            MenuChoice::ListBluetooth => "List nearby Bluetooth devices",
            MenuChoice::WatchBluetooth => "Monitor Bluetooth devices (continuous)",
            MenuChoice::ConnectionMonitor => "Monitor Bluetooth connection attempts",
            MenuChoice::QuickScan => "Quick security scan",
            MenuChoice::ListWifi => "List nearby WiFi networks",
            MenuChoice::Exit => "Exit",
        }
    }
}

pub const MENU_PROMPT: &str = "Select an option (1-7): ";
pub const MENU_INVALID: &str = "Invalid choice. Please select 1-7.";

pub fn render_menu() -> String {
    let mut out = format!("\n{PURPLE}{BOLD}{BANNER}{RESET}\n{BOLD}Main Menu{RESET}\n");
    for (i, choice) in MenuChoice::ALL.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, choice.label()));
    }
    out
}

/// Prints attack cards as they are appended
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn print_status(&self, known: &KnownDevices, total_attacks: usize) {
        println!("{}", render_status(known, total_attacks));
    }

    pub fn print_summary(&self, attacks: &[Attack]) {
        if attacks.is_empty() {
            println!("{GREEN}No threats detected.{RESET}");
            return;
        }
        let high = attacks.iter().filter(|a| a.severity == Severity::High).count();
        println!(
            "\n{BOLD}{} finding(s), {}{} high severity{RESET}",
            attacks.len(),
            RED,
            high
        );
    }

    pub fn print_bluetooth_devices(&self, devices: &[BluetoothDevice], known: &KnownDevices) {
        println!("{}", render_bluetooth_table(devices, known));
    }

    pub fn print_wifi_devices(&self, devices: &[WifiDevice]) {
        println!("{}", render_wifi_table(devices));
    }
}

impl AttackSink for ConsoleReporter {
    fn log_attack(&self, attack: &Attack) {
        println!("{}", render_attack(attack));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttackKind;
    use time::macros::datetime;

    #[test]
    fn test_attack_card() {
        let attack = Attack::new(
            AttackKind::RogueAp,
            Severity::High,
            "Potentially rogue access point detected: FreeWifi",
            "FreeWifi",
            datetime!(2024-05-01 10:00:00 UTC),
        );
        let card = render_attack(&attack);

        assert!(card.contains(RED));
        assert!(card.contains("[HIGH] ROGUE_AP"));
        assert!(card.contains("Target:\x1b[0m FreeWifi"));
    }

    #[test]
    fn test_bluetooth_table_status() {
        let known = KnownDevices {
            bluetooth: ["AA:BB:CC:DD:EE:FF".to_string()].into(),
            ..Default::default()
        };
        let devices = vec![
            BluetoothDevice {
                name: Some("Headset".into()),
                rssi: Some(-60),
                ..BluetoothDevice::new("AA:BB:CC:DD:EE:FF")
            },
            BluetoothDevice::new("11:22:33:44:55:66"),
        ];
        let table = render_bluetooth_table(&devices, &known);
        let rows: Vec<&str> = table.lines().filter(|l| l.contains(':') && !l.contains("Found")).collect();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("Headset") && rows[0].contains("-60") && rows[0].trim_end().ends_with("Known"));
        assert!(rows[1].contains("N/A") && rows[1].trim_end().ends_with("Unknown"));
    }

    #[test]
    fn test_status_shows_whole_banner_and_totals() {
        let known = KnownDevices {
            network: ["10.0.0.1".to_string(), "10.0.0.2".to_string()].into(),
            bluetooth: ["AA:BB:CC:DD:EE:FF".to_string()].into(),
            ..Default::default()
        };
        let status = render_status(&known, 7);

        assert!(status.contains("\"#mmm  #mmmm# #mmmm#"));
        assert!(status.contains("\"mmm#\" #    # #    # #mmmmm"));
        assert_eq!(BANNER.lines().filter(|l| !l.is_empty()).count(), 5);
        assert!(status.contains("ACTIVE"));
        assert!(status.contains("Known Network Devices: 2"));
        assert!(status.contains("Known Bluetooth Devices: 1"));
        assert!(status.contains("Total Attacks Detected: 7"));
    }

    #[test]
    fn test_menu_choices() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::FullMonitoring));
        assert_eq!(MenuChoice::parse(" 3\n"), Some(MenuChoice::WatchBluetooth));
        assert_eq!(MenuChoice::parse("7"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("0"), None);
        assert_eq!(MenuChoice::parse("8"), None);
        assert_eq!(MenuChoice::parse("scan"), None);
        assert_eq!(MenuChoice::parse(""), None);

        let menu = render_menu();
        assert!(menu.contains("1. Start full monitoring"));
        assert!(menu.contains("7. Exit"));
        assert_eq!(menu.lines().filter(|l| l.starts_with("  ")).count(), 7);
    }

    #[test]
    fn test_empty_tables() {
        assert!(render_wifi_table(&[]).contains("No WiFi networks"));
        assert!(render_bluetooth_table(&[], &KnownDevices::default()).contains("No Bluetooth devices"));
    }
}
