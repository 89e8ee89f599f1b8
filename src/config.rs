use crate::input::PinLevel;
use crate::record::DoorState;
use crate::time_delta::MAX_DESIRED_PARTS;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DoorsensorConfig {
    pub sensor: SensorConfig,
    pub log: LogConfig,
    pub notify: NotifyConfig,
    pub alert: AlertConfig,
    pub system: SystemConfig,
}

/// How cycles are triggered
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    /// Debounced edge interrupts from the input
    Interrupt,
    /// Fixed interval timer
    Poll,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    /// GPIO number in kernel numbering
    #[serde(default = "default_pin")]
    pub pin: u32,

    /// Pin level that means the door is open
    #[serde(default = "default_open_level")]
    pub open_level: PinLevel,

    #[serde(default = "default_mode")]
    pub mode: DriveMode,

    /// Quiet period after an edge during which further edges are ignored
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between cycles in poll mode
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Root of the sysfs GPIO interface
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    /// Path of the transition log
    #[serde(default = "default_log_path")]
    pub path: String,

    /// IANA timezone of the human readable timestamp column
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Maximum number of units in the elapsed time phrase
    #[serde(default = "default_duration_parts")]
    pub duration_parts: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    #[serde(default = "default_zwrite_path")]
    pub zwrite_path: String,

    /// Zephyr signature
    #[serde(default = "default_signature")]
    pub signature: String,

    /// Upper bound on a single notifier invocation
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,

    /// Class/instance pairs that receive a zephyr on every transition
    #[serde(default = "default_zephyrs")]
    pub zephyrs: Vec<ZephyrTarget>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ZephyrTarget {
    pub class: String,
    /// Instance name; the new state's label when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_alert_enabled")]
    pub enabled: bool,

    #[serde(default = "default_remctl_path")]
    pub remctl_path: String,

    /// remctl server
    #[serde(default)]
    pub host: String,

    /// remctl command and arguments
    #[serde(default = "default_alert_command")]
    pub command: Vec<String>,

    /// Door state whose arrival triggers the alert
    #[serde(default = "default_alert_state")]
    pub on_state: DoorState,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Capacity of the edge queue between the input and the monitor
    #[serde(default = "default_edge_queue_capacity")]
    pub edge_queue_capacity: usize,
}

impl DoorsensorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("doorsensor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sensor.pin", default_pin())?
            .set_default("sensor.open_level", "low")?
            .set_default("sensor.mode", "interrupt")?
            .set_default("sensor.debounce_ms", default_debounce_ms())?
            .set_default("sensor.poll_interval_ms", default_poll_interval_ms())?
            .set_default("sensor.sysfs_root", default_sysfs_root())?
            .set_default("log.path", default_log_path())?
            .set_default("log.timezone", default_timezone())?
            .set_default("log.duration_parts", default_duration_parts() as i64)?
            .set_default("notify.enabled", default_notify_enabled())?
            .set_default("notify.zwrite_path", default_zwrite_path())?
            .set_default("notify.signature", default_signature())?
            .set_default("notify.timeout_secs", default_notify_timeout())?
            .set_default("alert.enabled", default_alert_enabled())?
            .set_default("alert.remctl_path", default_remctl_path())?
            .set_default("alert.host", "")?
            .set_default("alert.command", default_alert_command())?
            .set_default("alert.on_state", "open")?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "system.edge_queue_capacity",
                default_edge_queue_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides such as DOORSENSOR_SENSOR__PIN=17
            .add_source(
                Environment::with_prefix("DOORSENSOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DoorsensorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sensor poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.log.path.trim().is_empty() {
            return Err(ConfigError::Message("Log path must not be empty".to_string()));
        }

        self.timezone()?;

        if self.log.duration_parts == 0 || self.log.duration_parts > MAX_DESIRED_PARTS {
            return Err(ConfigError::Message(format!(
                "Log duration_parts must be between 1 and {}",
                MAX_DESIRED_PARTS
            )));
        }

        if (self.notify.enabled || self.alert.enabled) && self.notify.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Notify timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.notify.enabled {
            if self.notify.zephyrs.iter().any(|t| t.class.trim().is_empty()) {
                return Err(ConfigError::Message(
                    "Zephyr targets need a non-empty class".to_string(),
                ));
            }
        }

        if self.alert.enabled {
            if self.alert.host.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Alert host must be set when alerts are enabled".to_string(),
                ));
            }
            if self.alert.command.is_empty() {
                return Err(ConfigError::Message(
                    "Alert command must not be empty".to_string(),
                ));
            }
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.edge_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Edge queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed timezone of the log's human readable column
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.log.timezone.parse::<Tz>().map_err(|e| {
            ConfigError::Message(format!("Invalid log timezone {:?}: {}", self.log.timezone, e))
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.sensor.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sensor.poll_interval_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.timeout_secs)
    }

    /// Render as TOML for `--print-config`
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for DoorsensorConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                pin: default_pin(),
                open_level: default_open_level(),
                mode: default_mode(),
                debounce_ms: default_debounce_ms(),
                poll_interval_ms: default_poll_interval_ms(),
                sysfs_root: default_sysfs_root(),
            },
            log: LogConfig {
                path: default_log_path(),
                timezone: default_timezone(),
                duration_parts: default_duration_parts(),
            },
            notify: NotifyConfig {
                enabled: default_notify_enabled(),
                zwrite_path: default_zwrite_path(),
                signature: default_signature(),
                timeout_secs: default_notify_timeout(),
                zephyrs: default_zephyrs(),
            },
            alert: AlertConfig {
                enabled: default_alert_enabled(),
                remctl_path: default_remctl_path(),
                host: String::new(),
                command: default_alert_command(),
                on_state: default_alert_state(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                edge_queue_capacity: default_edge_queue_capacity(),
            },
        }
    }
}

// Default value functions
fn default_pin() -> u32 {
    8
} // Physical board pin 24 on a Raspberry Pi header
fn default_open_level() -> PinLevel {
    PinLevel::Low
}
fn default_mode() -> DriveMode {
    DriveMode::Interrupt
}
fn default_debounce_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_sysfs_root() -> String {
    crate::input::DEFAULT_SYSFS_ROOT.to_string()
}

fn default_log_path() -> String {
    "/var/log/doorsensor/door.log".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_duration_parts() -> usize {
    crate::time_delta::DEFAULT_DESIRED_PARTS
}

fn default_notify_enabled() -> bool {
    true
}
fn default_zwrite_path() -> String {
    "/usr/bin/zwrite".to_string()
}
fn default_signature() -> String {
    "SIPB Door".to_string()
}
fn default_notify_timeout() -> u64 {
    10
}
fn default_zephyrs() -> Vec<ZephyrTarget> {
    vec![
        ZephyrTarget {
            class: "sipb-auto".to_string(),
            instance: Some("door".to_string()),
        },
        ZephyrTarget {
            class: "sipb-door".to_string(),
            instance: None,
        },
    ]
}

fn default_alert_enabled() -> bool {
    false
}
fn default_remctl_path() -> String {
    "/usr/bin/remctl".to_string()
}
fn default_alert_command() -> Vec<String> {
    vec!["alert".to_string()]
}
fn default_alert_state() -> DoorState {
    DoorState::Open
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_edge_queue_capacity() -> usize {
    16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DoorsensorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor.mode, DriveMode::Interrupt);
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(config.notify.zephyrs.len(), 2);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DoorsensorConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.sensor.pin, 8);
        assert_eq!(config.sensor.open_level, PinLevel::Low);
        assert_eq!(config.log.duration_parts, 2);
        assert_eq!(config.alert.on_state, DoorState::Open);
        assert_eq!(config.notify.zephyrs, default_zephyrs());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doorsensor.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[sensor]
pin = 17
open_level = "high"
mode = "poll"
poll_interval_ms = 250

[log]
path = "/tmp/door.log"
timezone = "UTC"
duration_parts = 3

[[notify.zephyrs]]
class = "door-test"
"#
        )
        .unwrap();

        let config = DoorsensorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.sensor.pin, 17);
        assert_eq!(config.sensor.open_level, PinLevel::High);
        assert_eq!(config.sensor.mode, DriveMode::Poll);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.log.duration_parts, 3);
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
        assert_eq!(
            config.notify.zephyrs,
            vec![ZephyrTarget {
                class: "door-test".to_string(),
                instance: None
            }]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DoorsensorConfig::default();

        config.log.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());
        config.log.timezone = "UTC".to_string();

        config.log.duration_parts = 0;
        assert!(config.validate().is_err());
        config.log.duration_parts = 2;

        config.sensor.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.sensor.poll_interval_ms = 1000;

        config.alert.enabled = true;
        assert!(config.validate().is_err());
        config.alert.host = "alerts.example.org".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_parts_upper_bound() {
        let mut config = DoorsensorConfig::default();

        config.log.duration_parts = MAX_DESIRED_PARTS;
        assert!(config.validate().is_ok());

        config.log.duration_parts = MAX_DESIRED_PARTS + 1;
        assert!(config.validate().is_err());

        config.log.duration_parts = i64::MAX as usize;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected_for_alert_only() {
        let mut config = DoorsensorConfig::default();
        config.notify.enabled = false;
        config.notify.timeout_secs = 0;
        assert!(config.validate().is_ok());

        config.alert.enabled = true;
        config.alert.host = "alerts.example.org".to_string();
        assert!(config.validate().is_err());

        config.notify.timeout_secs = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_render_as_toml() {
        let rendered = DoorsensorConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[sensor]"));
        assert!(rendered.contains("open_level = \"low\""));
        assert!(rendered.contains("class = \"sipb-auto\""));
    }
}
