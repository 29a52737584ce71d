//! Configuration management for Doorman.
//!
//! Settings come from defaults, an optional YAML file, and `DOORMAN__`
//! environment variables, in increasing order of precedence. Nested keys are
//! separated by double underscores, e.g.
//! `DOORMAN__ADMISSION__MAX_REQUESTS_PER_WINDOW=5`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::admission::AdmissionConfig;
use crate::error::{DoormanError, Result};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DOORMAN";

/// Upper bound on configured durations.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration for the Doorman service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoormanConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission gate configuration
    #[serde(default)]
    pub admission: AdmissionSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5050))
}

/// Admission gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSettings {
    /// Sliding window length in seconds
    #[serde(default = "default_time_window")]
    pub time_window_secs: u64,

    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: usize,

    /// Violations before a client is blacklisted
    #[serde(default = "default_blacklist_after")]
    pub blacklist_after_violations: u32,

    /// Blacklist duration in seconds
    #[serde(default = "default_blacklist_duration")]
    pub blacklist_duration_secs: u64,

    /// Seconds between sweeps of idle client state; 0 disables sweeping
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            time_window_secs: default_time_window(),
            max_requests_per_window: default_max_requests(),
            blacklist_after_violations: default_blacklist_after(),
            blacklist_duration_secs: default_blacklist_duration(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_time_window() -> u64 {
    10
}

fn default_max_requests() -> usize {
    3
}

fn default_blacklist_after() -> u32 {
    2
}

fn default_blacklist_duration() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    60
}

impl AdmissionSettings {
    /// The gate parameters these settings describe.
    pub fn gate_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            time_window: Duration::from_secs(self.time_window_secs),
            max_requests_per_window: self.max_requests_per_window,
            blacklist_after_violations: self.blacklist_after_violations,
            blacklist_duration: Duration::from_secs(self.blacklist_duration_secs),
        }
    }

    /// How often to sweep, if at all.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            (self.time_window_secs == 0, "time_window_secs must be greater than zero"),
            (
                self.max_requests_per_window == 0,
                "max_requests_per_window must be greater than zero",
            ),
            (
                self.blacklist_after_violations == 0,
                "blacklist_after_violations must be greater than zero",
            ),
            (
                self.blacklist_duration_secs == 0,
                "blacklist_duration_secs must be greater than zero",
            ),
            (
                self.time_window_secs > MAX_DURATION_SECS
                    || self.blacklist_duration_secs > MAX_DURATION_SECS
                    || self.sweep_interval_secs > MAX_DURATION_SECS,
                "durations must not exceed one year",
            ),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(DoormanError::Config(message.to_string())),
            None => Ok(()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DoormanConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: DoormanConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| DoormanError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DoormanConfig = serde_yaml::from_str(yaml)
            .map_err(|e| DoormanError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| DoormanError::Config(e.to_string()))
    }

    /// Check that the configuration describes a usable gate.
    pub fn validate(&self) -> Result<()> {
        self.admission.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_limits() {
        let config = DoormanConfig::default();
        let gate = config.admission.gate_config();

        assert_eq!(gate, AdmissionConfig::default());
        assert_eq!(config.server.grpc_addr, "127.0.0.1:5050".parse().unwrap());
        assert_eq!(config.admission.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
admission:
  max_requests_per_window: 10
  blacklist_duration_secs: 300
logging:
  format: json
"#;
        let config = DoormanConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.admission.max_requests_per_window, 10);
        assert_eq!(config.admission.blacklist_duration_secs, 300);
        assert_eq!(config.admission.time_window_secs, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_zero_sweep_interval_disables_sweeping() {
        let config = DoormanConfig::from_yaml("admission:\n  sweep_interval_secs: 0\n").unwrap();
        assert_eq!(config.admission.sweep_interval(), None);
    }

    #[test]
    fn test_rejects_unusable_limits() {
        for yaml in [
            "admission:\n  time_window_secs: 0\n",
            "admission:\n  max_requests_per_window: 0\n",
            "admission:\n  blacklist_after_violations: 0\n",
            "admission:\n  blacklist_duration_secs: 0\n",
            "admission:\n  blacklist_duration_secs: 99999999999\n",
        ] {
            let result = DoormanConfig::from_yaml(yaml);
            assert!(
                matches!(result, Err(DoormanError::Config(_))),
                "accepted {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let result = DoormanConfig::from_yaml("server:\n  grpc_addr: not-an-address\n");
        assert!(matches!(result, Err(DoormanError::Config(_))));
    }

    #[test]
    fn test_yaml_round_trip_of_defaults() {
        let yaml = DoormanConfig::default().to_yaml().unwrap();
        assert_eq!(DoormanConfig::from_yaml(&yaml).unwrap(), DoormanConfig::default());
    }

    // The only test touching DOORMAN__* variables, so it cannot race others.
    #[test]
    fn test_load_file_with_environment_override() {
        let path = std::env::temp_dir().join(format!("doorman-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "server:\n  grpc_addr: 0.0.0.0:6000\nadmission:\n  max_requests_per_window: 5\n  time_window_secs: 30\n",
        )
        .unwrap();

        std::env::set_var("DOORMAN__ADMISSION__MAX_REQUESTS_PER_WINDOW", "7");
        let config = DoormanConfig::load(Some(&path));
        std::env::remove_var("DOORMAN__ADMISSION__MAX_REQUESTS_PER_WINDOW");
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.server.grpc_addr, "0.0.0.0:6000".parse().unwrap());
        assert_eq!(config.admission.time_window_secs, 30);
        assert_eq!(config.admission.max_requests_per_window, 7);
        assert_eq!(config.admission.blacklist_after_violations, 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = DoormanConfig::load(Some(Path::new("/nonexistent/doorman.yaml")));
        assert!(matches!(result, Err(DoormanError::Config(_))));
    }
}
