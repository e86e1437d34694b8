//! WiFi access point discovery (iwlist, nmcli) and the optional radio probes

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::SourceError;
use crate::execution::CommandExecutor;
use crate::models::{WifiDevice, WifiSignals};
use crate::source::WifiSource;

static SIGNAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Signal level=(-?\d+) dBm").unwrap());

pub struct WirelessScanner {
    config: ProbeConfig,
}

impl WirelessScanner {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    async fn iwlist(&self) -> Result<Vec<WifiDevice>, SourceError> {
        let iface = self.config.wifi_interface.as_str();
        let output = CommandExecutor::capture("iwlist", &[iface, "scan"], self.config.command_timeout()).await?;
        Ok(parse_iwlist(&output))
    }

    async fn nmcli(&self) -> Result<Vec<WifiDevice>, SourceError> {
        let args = ["-t", "-f", "SSID,BSSID,CHAN,SIGNAL", "device", "wifi", "list"];
        let output = CommandExecutor::capture("nmcli", &args, self.config.command_timeout()).await?;
        Ok(parse_nmcli(&output))
    }

    async fn probe_wps(&self) -> bool {
        let Some(argv) = self.config.wps_probe_argv() else {
            return false;
        };
        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
        match CommandExecutor::capture(&argv[0], &args, self.config.command_timeout()).await {
            Ok(output) => output.contains("WPS") || output.contains("Version"),
            Err(e) => {
                debug!("WPS probe skipped: {}", e);
                false
            }
        }
    }

    async fn probe_monitor_mode(&self) -> bool {
        match CommandExecutor::capture("iwconfig", &[], self.config.command_timeout()).await {
            Ok(output) => output.contains("Mode:Monitor"),
            Err(e) => {
                debug!("iwconfig probe skipped: {}", e);
                false
            }
        }
    }

    async fn probe_deauth(&self) -> u32 {
        if !CommandExecutor::is_available("airodump-ng") {
            return 0;
        }

        let prefix = std::env::temp_dir().join("shheissee_airodump");
        let prefix = prefix.to_string_lossy().to_string();
        let window = self.config.deauth_capture_secs.to_string();
        let args = [
            window.as_str(),
            "airodump-ng",
            "--output-format",
            "csv",
            "-w",
            prefix.as_str(),
            self.config.wifi_interface.as_str(),
        ];
        let deadline = self.config.command_timeout() + Duration::from_secs(self.config.deauth_capture_secs);

        // `timeout` ends the capture with a non-zero status, so only the output matters
        let frames = match CommandExecutor::run("timeout", &args, deadline).await {
            Ok(result) => count_deauth_frames(&result.output),
            Err(e) => {
                debug!("Deauth capture skipped: {}", e);
                0
            }
        };

        for suffix in ["-01.csv", "-01.cap"] {
            let _ = tokio::fs::remove_file(format!("{}{}", prefix, suffix)).await;
        }
        frames
    }
}

#[async_trait]
impl WifiSource for WirelessScanner {
    async fn scan(&self) -> Result<Vec<WifiDevice>, SourceError> {
        match self.iwlist().await {
            Ok(devices) => {
                info!("iwlist found {} access points", devices.len());
                Ok(devices)
            }
            Err(e) => {
                debug!("iwlist failed ({}), trying nmcli", e);
                self.nmcli().await
            }
        }
    }

    async fn probe_signals(&self) -> WifiSignals {
        let (wps_capable, monitor_mode, deauth_frames) =
            tokio::join!(self.probe_wps(), self.probe_monitor_mode(), self.probe_deauth());

        WifiSignals {
            wps_capable,
            deauth_frames,
            monitor_mode,
        }
    }
}

/// Parse `iwlist <iface> scan` output, one device per `Cell`
pub fn parse_iwlist(output: &str) -> Vec<WifiDevice> {
    let mut devices = Vec::new();
    let mut current: Option<WifiDevice> = None;

    for raw in output.lines() {
        let line = raw.trim();

        if let Some((_, address)) = line.split_once("Address:") {
            if let Some(done) = current.take() {
                devices.push(done);
            }
            let address = address.trim();
            if !address.is_empty() {
                current = Some(WifiDevice::new(address.to_uppercase()));
            }
            continue;
        }

        let Some(device) = current.as_mut() else { continue };

        if let Some(essid) = line.strip_prefix("ESSID:") {
            let ssid = essid.trim().trim_matches('"');
            device.ssid = (!ssid.is_empty()).then(|| ssid.to_string());
        } else if let Some(channel) = line.strip_prefix("Channel:") {
            device.channel = Some(channel.trim().to_string());
        } else if let Some(caps) = SIGNAL_RE.captures(line) {
            device.signal_dbm = caps.get(1).and_then(|m| m.as_str().parse().ok());
        }
    }

    if let Some(done) = current {
        devices.push(done);
    }
    devices
}

/// Split one terse nmcli line on unescaped `:`
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    field.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// nmcli reports signal quality in percent
fn quality_to_dbm(quality: u8) -> i32 {
    i32::from(quality.min(100)) / 2 - 100
}

/// Parse `nmcli -t -f SSID,BSSID,CHAN,SIGNAL device wifi list`
pub fn parse_nmcli(output: &str) -> Vec<WifiDevice> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [ssid, bssid, channel, signal] = fields.as_slice() else {
                return None;
            };
            if bssid.is_empty() {
                return None;
            }
            Some(WifiDevice {
                address: bssid.to_uppercase(),
                ssid: (!ssid.is_empty()).then(|| ssid.clone()),
                signal_dbm: signal.trim().parse::<u8>().ok().map(quality_to_dbm),
                channel: (!channel.is_empty()).then(|| channel.clone()),
            })
        })
        .collect()
}

/// Deauthentication frames mentioned in an airodump-ng capture
pub fn count_deauth_frames(output: &str) -> u32 {
    output.matches("DEAUTH").count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const IWLIST: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: aa:bb:cc:00:00:01
                    Channel:6
                    Frequency:2.437 GHz (Channel 6)
                    Quality=70/70  Signal level=-40 dBm
                    Encryption key:on
                    ESSID:"HomeNet"
          Cell 02 - Address: AA:BB:CC:00:00:02
                    Channel:11
                    Quality=30/70  Signal level=-80 dBm
                    ESSID:""
"#;

    #[test]
    fn test_parse_iwlist() {
        let devices = parse_iwlist(IWLIST);
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].address, "AA:BB:CC:00:00:01");
        assert_eq!(devices[0].ssid.as_deref(), Some("HomeNet"));
        assert_eq!(devices[0].signal_dbm, Some(-40));
        assert_eq!(devices[0].channel.as_deref(), Some("6"));

        assert!(devices[1].ssid.is_none());
        assert_eq!(devices[1].signal_dbm, Some(-80));
    }

    #[test]
    fn test_parse_nmcli_terse_escapes() {
        let output = "HomeNet:AA\\:BB\\:CC\\:00\\:00\\:01:6:80\n\
                      Cafe\\:Guest:AA\\:BB\\:CC\\:00\\:00\\:02:11:40\n\
                      :AA\\:BB\\:CC\\:00\\:00\\:03:1:10\n\
                      broken line\n";
        let devices = parse_nmcli(output);
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].ssid.as_deref(), Some("HomeNet"));
        assert_eq!(devices[0].address, "AA:BB:CC:00:00:01");
        assert_eq!(devices[0].signal_dbm, Some(-60));

        assert_eq!(devices[1].ssid.as_deref(), Some("Cafe:Guest"));
        assert_eq!(devices[1].channel.as_deref(), Some("11"));

        assert!(devices[2].ssid.is_none());
    }

    #[test]
    fn test_count_deauth_frames() {
        assert_eq!(count_deauth_frames("DEAUTH a\nDEAUTH b\nBEACON\n"), 2);
        assert_eq!(count_deauth_frames(""), 0);
    }
}
