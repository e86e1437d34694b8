//! Adapter settings (subnet, interface, timeouts, probe commands)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// CIDR to sweep; derived from the primary interface when unset
    pub subnet: Option<String>,
    pub wifi_interface: String,
    pub command_timeout_secs: u64,
    pub bluetooth_scan_secs: u64,
    /// nmap `-p` argument used for per-host port scans
    pub ports: String,
    /// WPS probe command; `{iface}` is replaced with `wifi_interface`
    pub wps_probe: Option<String>,
    pub deauth_capture_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            subnet: None,
            wifi_interface: "wlan0".to_string(),
            command_timeout_secs: 60,
            bluetooth_scan_secs: 8,
            ports: "21,22,23,25,53,80,110,143,443,993,995,3389,445".to_string(),
            wps_probe: Some("wash -i {iface} -s".to_string()),
            deauth_capture_secs: 10,
        }
    }
}

impl ProbeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// WPS probe split into program + args, with the interface substituted
    pub fn wps_probe_argv(&self) -> Option<Vec<String>> {
        let raw = self.wps_probe.as_ref()?.replace("{iface}", &self.wifi_interface);
        match shell_words::split(&raw) {
            Ok(argv) if !argv.is_empty() => Some(argv),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring malformed WPS probe command '{}': {}", raw, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.wifi_interface, "wlan0");
        assert!(config.ports.contains("3389"));
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_wps_probe_substitutes_interface() {
        let config = ProbeConfig {
            wifi_interface: "wlp2s0".into(),
            ..Default::default()
        };
        assert_eq!(
            config.wps_probe_argv().unwrap(),
            vec!["wash", "-i", "wlp2s0", "-s"]
        );
    }

    #[test]
    fn test_wps_probe_disabled() {
        let config = ProbeConfig {
            wps_probe: None,
            ..Default::default()
        };
        assert!(config.wps_probe_argv().is_none());

        let unterminated = ProbeConfig {
            wps_probe: Some("wash -i 'wlan0".into()),
            ..Default::default()
        };
        assert!(unterminated.wps_probe_argv().is_none());
    }
}
