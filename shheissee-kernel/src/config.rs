use serde::{Deserialize, Serialize};
use shheissee_probe::ProbeConfig;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{error, warn};

pub const CONFIG_ENV: &str = "SHHEISSEE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "shheissee.yaml";

/// Retention ceiling (100 years); anything above means "never evict"
pub const MAX_RETENTION_HOURS: i64 = 100 * 365 * 24;
const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub known_devices_file: String,
    pub bluetooth_devices_file: String,
    pub log_file: String,
    pub scan_interval_secs: u64,
    /// Carried for compatibility with existing config files; no rule reads it
    pub anomaly_threshold: f64,
    pub web_server_port: u16,
    /// Deadline for every individual source call
    pub scan_timeout_secs: u64,
    pub history_retention_hours: i64,
    pub dashboard_refresh_secs: u64,
    pub probe: ProbeConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            known_devices_file: "model/known_devices.json".into(),
            bluetooth_devices_file: "model/known_bluetooth_devices.json".into(),
            log_file: "log/intrusion_log.log".into(),
            scan_interval_secs: 60,
            anomaly_threshold: 2.0,
            web_server_port: 8080,
            scan_timeout_secs: 120,
            history_retention_hours: DEFAULT_RETENTION_HOURS,
            dashboard_refresh_secs: 5,
            probe: ProbeConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn history_retention(&self) -> time::Duration {
        time::Duration::hours(self.history_retention_hours.clamp(0, MAX_RETENTION_HOURS))
    }

    /// Bring out-of-range values back into range, logging each correction
    pub fn validated(mut self) -> Self {
        if self.history_retention_hours < 0 {
            warn!(
                "history_retention_hours {} is negative, using {}",
                self.history_retention_hours, DEFAULT_RETENTION_HOURS
            );
            self.history_retention_hours = DEFAULT_RETENTION_HOURS;
        } else if self.history_retention_hours > MAX_RETENTION_HOURS {
            warn!(
                "history_retention_hours {} is too large, capping at {}",
                self.history_retention_hours, MAX_RETENTION_HOURS
            );
            self.history_retention_hours = MAX_RETENTION_HOURS;
        }
        self
    }

    pub fn dashboard_refresh(&self) -> Duration {
        Duration::from_secs(self.dashboard_refresh_secs.max(1))
    }
}

/// Load the config named by `SHHEISSEE_CONFIG` (default `shheissee.yaml`)
pub async fn load_config() -> DetectorConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: &str) -> DetectorConfig {
    if !Path::new(path).exists() {
        warn!("No config at {}, using defaults", path);
        return DetectorConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            error!("Cannot read config {}: {}, using defaults", path, e);
            return DetectorConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return DetectorConfig::default();
    }
    serde_yaml::from_str::<DetectorConfig>(&txt)
        .map(DetectorConfig::validated)
        .unwrap_or_else(|e| {
            error!("Invalid config {}: {}", path, e);
            DetectorConfig::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let config = load_config_from("/definitely/not/here.yaml").await;
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.web_server_port, 8080);
        assert_eq!(config.known_devices_file, "model/known_devices.json");
    }

    #[tokio::test]
    async fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shheissee.yaml");
        tokio::fs::write(
            &path,
            "scan_interval_secs: 15\nprobe:\n  subnet: 10.0.0.0/24\n  wifi_interface: wlp2s0\n",
        )
        .await
        .unwrap();

        let config = load_config_from(path.to_str().unwrap()).await;
        assert_eq!(config.scan_interval(), Duration::from_secs(15));
        assert_eq!(config.probe.subnet.as_deref(), Some("10.0.0.0/24"));
        assert_eq!(config.probe.wifi_interface, "wlp2s0");
        assert_eq!(config.probe.command_timeout_secs, 60);
        assert_eq!(config.history_retention_hours, 24);
    }

    #[tokio::test]
    async fn test_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        tokio::fs::write(&path, "scan_interval_secs: [not a number").await.unwrap();

        let config = load_config_from(path.to_str().unwrap()).await;
        assert_eq!(config.scan_interval_secs, 60);
    }

    #[tokio::test]
    async fn test_unreadable_config_falls_back() {
        // a directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();

        let config = load_config_from(dir.path().to_str().unwrap()).await;
        assert_eq!(config.scan_interval_secs, 60);
    }

    #[tokio::test]
    async fn test_retention_out_of_range_is_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let huge = dir.path().join("huge.yaml");
        tokio::fs::write(&huge, "history_retention_hours: 1000000000\n").await.unwrap();
        let negative = dir.path().join("negative.yaml");
        tokio::fs::write(&negative, "history_retention_hours: -5\n").await.unwrap();

        let config = load_config_from(huge.to_str().unwrap()).await;
        assert_eq!(config.history_retention_hours, MAX_RETENTION_HOURS);

        let config = load_config_from(negative.to_str().unwrap()).await;
        assert_eq!(config.history_retention_hours, 24);
    }

    #[test]
    fn test_retention_duration_is_clamped() {
        let config = DetectorConfig {
            history_retention_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.history_retention(), time::Duration::hours(MAX_RETENTION_HOURS));

        let config = DetectorConfig {
            history_retention_hours: -3,
            ..Default::default()
        };
        assert_eq!(config.history_retention(), time::Duration::ZERO);
    }
}
