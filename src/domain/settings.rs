use crate::domain::models::Unit;
use crate::infrastructure::bluetooth::protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// `RUST_LOG` takes precedence when set
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    /// Only honoured when stderr is a terminal
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_false")]
    pub show_target: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    /// Defaults to `logs/` beside the delivery state
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Older files are pruned on rollover
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            ansi_colors: default_true(),
            show_target: default_false(),
            file_logging_enabled: default_false(),
            log_dir: None,
            file_name_prefix: default_prefix(),
            rotation: LogRotation::default(),
            max_log_files: default_max_log_files(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_prefix() -> String {
    "scale_bridge".to_string()
}
fn default_max_log_files() -> usize {
    7
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMethod {
    /// Match the configured hardware address
    #[default]
    Address,
    /// First peer advertising the body composition service
    Service,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub method: DiscoveryMethod,
    #[serde(default = "default_scale_address")]
    pub scale_address: String, // lowercase "aa:bb:cc:dd:ee:ff"
    #[serde(default = "default_body_service_uuid")]
    pub body_composition_service_uuid: String,
    #[serde(default = "default_history_uuid")]
    pub history_char_uuid: String,
    #[serde(default = "default_current_time_uuid")]
    pub current_time_char_uuid: String,
    #[serde(default = "default_config_service_uuid")]
    pub configuration_service_uuid: String,
    #[serde(default = "default_scale_config_uuid")]
    pub scale_configuration_char_uuid: String,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            method: DiscoveryMethod::default(),
            scale_address: default_scale_address(),
            body_composition_service_uuid: default_body_service_uuid(),
            history_char_uuid: default_history_uuid(),
            current_time_char_uuid: default_current_time_uuid(),
            configuration_service_uuid: default_config_service_uuid(),
            scale_configuration_char_uuid: default_scale_config_uuid(),
        }
    }
}

fn default_scale_address() -> String {
    "aa:bb:cc:dd:ee:ff".to_string()
}
fn default_body_service_uuid() -> String {
    protocol::BODY_COMPOSITION_SERVICE_UUID.to_string()
}
fn default_history_uuid() -> String {
    protocol::BODY_COMPOSITION_HISTORY_CHAR_UUID.to_string()
}
fn default_current_time_uuid() -> String {
    protocol::CURRENT_TIME_CHAR_UUID.to_string()
}
fn default_config_service_uuid() -> String {
    protocol::CONFIGURATION_SERVICE_UUID.to_string()
}
fn default_scale_config_uuid() -> String {
    protocol::SCALE_CONFIGURATION_CHAR_UUID.to_string()
}

/// Durations, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    #[serde(default = "default_scan_window_ms")]
    pub scan_window_ms: u64,
    /// Pause before each reconnect in the acquisition loop
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_network_attempt_ms")]
    pub network_attempt_ms: u64,
    /// How long to listen for a reconfiguration request
    #[serde(default = "default_reconfigure_poll_ms")]
    pub reconfigure_poll_ms: u64,
    #[serde(default = "default_ack_window_ms")]
    pub ack_window_ms: u64,
    #[serde(default = "default_resend_interval_ms")]
    pub resend_interval_ms: u64,
}

impl TimingSettings {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
    pub fn network_attempt(&self) -> Duration {
        Duration::from_millis(self.network_attempt_ms)
    }
    pub fn reconfigure_poll(&self) -> Duration {
        Duration::from_millis(self.reconfigure_poll_ms)
    }
    pub fn ack_window(&self) -> Duration {
        Duration::from_millis(self.ack_window_ms)
    }
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_delay_ms: default_poll_delay_ms(),
            scan_window_ms: default_scan_window_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            network_attempt_ms: default_network_attempt_ms(),
            reconfigure_poll_ms: default_reconfigure_poll_ms(),
            ack_window_ms: default_ack_window_ms(),
            resend_interval_ms: default_resend_interval_ms(),
        }
    }
}

fn default_poll_delay_ms() -> u64 {
    150
}
fn default_scan_window_ms() -> u64 {
    10_000
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_network_attempt_ms() -> u64 {
    4_000
}
fn default_reconfigure_poll_ms() -> u64 {
    1_000
}
fn default_ack_window_ms() -> u64 {
    20_000
}
fn default_resend_interval_ms() -> u64 {
    3_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_server")]
    pub server: String, // IP address or hostname
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_settings_topic")]
    pub settings_topic: String,
    #[serde(default = "default_data_topic")]
    pub data_topic: String,
    #[serde(default = "default_ack_topic")]
    pub ack_topic: String,
    /// Literal payload on the settings topic requesting reconfiguration
    #[serde(default = "default_reconfigure_trigger")]
    pub reconfigure_trigger: String,
    /// Literal payload on the ack topic confirming receipt
    #[serde(default = "default_ack_signal")]
    pub ack_signal: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            client_id: default_client_id(),
            username: String::new(),
            password: String::new(),
            settings_topic: default_settings_topic(),
            data_topic: default_data_topic(),
            ack_topic: default_ack_topic(),
            reconfigure_trigger: default_reconfigure_trigger(),
            ack_signal: default_ack_signal(),
        }
    }
}

fn default_server() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8884
}
fn default_client_id() -> String {
    "scaleEsp".to_string()
}
fn default_settings_topic() -> String {
    "scaleSettings".to_string()
}
fn default_data_topic() -> String {
    "scale".to_string()
}
fn default_ack_topic() -> String {
    "scale_ack".to_string()
}
fn default_reconfigure_trigger() -> String {
    "1".to_string()
}
fn default_ack_signal() -> String {
    "X".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Unit written to the scale on reconfiguration
    #[serde(default)]
    pub scale_unit: Unit,

    #[serde(default)]
    pub timing: TimingSettings,

    #[serde(default = "default_acquisition_attempts")]
    pub acquisition_attempts: u32,

    #[serde(default)]
    pub broker: BrokerSettings,

    /// Where the last delivered fingerprint lives; platform data dir if unset
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings::default(),
            scale_unit: Unit::default(),
            timing: TimingSettings::default(),
            acquisition_attempts: default_acquisition_attempts(),
            broker: BrokerSettings::default(),
            state_path: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_acquisition_attempts() -> u32 {
    5
}

impl Settings {
    /// Reject settings the run loop cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.acquisition_attempts == 0 {
            anyhow::bail!("acquisition_attempts must be at least 1");
        }

        let t = &self.timing;
        if t.scan_window_ms == 0 || t.ack_window_ms == 0 || t.network_attempt_ms == 0 {
            anyhow::bail!("scan, ack and network windows must be non-zero");
        }
        if t.resend_interval_ms == 0 || t.resend_interval_ms >= t.ack_window_ms {
            anyhow::bail!(
                "resend_interval_ms ({}) must be non-zero and below ack_window_ms ({})",
                t.resend_interval_ms,
                t.ack_window_ms
            );
        }

        let d = &self.discovery;
        for (name, uuid) in [
            ("body_composition_service_uuid", &d.body_composition_service_uuid),
            ("history_char_uuid", &d.history_char_uuid),
            ("current_time_char_uuid", &d.current_time_char_uuid),
            ("configuration_service_uuid", &d.configuration_service_uuid),
            (
                "scale_configuration_char_uuid",
                &d.scale_configuration_char_uuid,
            ),
        ] {
            protocol::parse_uuid(uuid)
                .map_err(|e| anyhow::anyhow!("{}: '{}': {}", name, uuid, e))?;
        }

        Ok(())
    }

    /// Fingerprint file location
    pub fn state_file(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.state_path {
            return Ok(path.clone());
        }
        let mut path = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        path.push("ScaleBridge");
        path.push("last_delivered.json");
        Ok(path)
    }

    /// Log file directory: the configured one, else `logs/` beside the state file
    pub fn log_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.log_settings.log_dir {
            return Ok(dir.clone());
        }
        let state = self.state_file()?;
        let parent = state
            .parent()
            .ok_or_else(|| anyhow::anyhow!("State file {} has no parent", state.display()))?;
        Ok(parent.join("logs"))
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from `settings_path`, falling back to defaults
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ScaleBridge");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.settings_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &PathBuf {
        &self.settings_path
    }
}
