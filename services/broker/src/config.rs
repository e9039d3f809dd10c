//! Broker configuration loading.
//!
//! TOML is the sole config source. A missing file is not an error — every
//! field has a default (§12); a present-but-malformed file is fatal.

use serde::Deserialize;
use std::path::Path;

/// Default config path when `-C` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pilight-broker/broker.toml";

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub port: u16,
    pub standalone: bool,
    pub receive_repeats: u32,
    pub webserver_enable: bool,
    pub webserver_port: u16,
    pub webserver_root: String,
    pub webgui_template: String,
    pub webgui_websockets: bool,
    pub pid_file: String,
    pub log_file: Option<String>,
    pub log_level: String,
    pub ntp_sync: bool,
    pub stats_enable: bool,
    pub watchdog_enable: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            standalone: true,
            receive_repeats: 1,
            webserver_enable: true,
            webserver_port: 5001,
            webserver_root: "/usr/local/share/pilight-broker/web".to_owned(),
            webgui_template: "default".to_owned(),
            webgui_websockets: true,
            pid_file: "/var/run/pilight-broker.pid".to_owned(),
            log_file: None,
            log_level: "info".to_owned(),
            ntp_sync: true,
            stats_enable: true,
            watchdog_enable: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawBrokerConfig {
    port: Option<u16>,
    standalone: Option<bool>,
    receive_repeats: Option<u32>,
    webserver_enable: Option<bool>,
    webserver_port: Option<u16>,
    webserver_root: Option<String>,
    webgui_template: Option<String>,
    webgui_websockets: Option<bool>,
    pid_file: Option<String>,
    log_file: Option<String>,
    log_level: Option<String>,
    ntp_sync: Option<bool>,
    stats_enable: Option<bool>,
    watchdog_enable: Option<bool>,
}

impl RawBrokerConfig {
    fn into_config(self) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            port: self.port.unwrap_or(defaults.port),
            standalone: self.standalone.unwrap_or(defaults.standalone),
            receive_repeats: self.receive_repeats.unwrap_or(defaults.receive_repeats),
            webserver_enable: self.webserver_enable.unwrap_or(defaults.webserver_enable),
            webserver_port: self.webserver_port.unwrap_or(defaults.webserver_port),
            webserver_root: self.webserver_root.unwrap_or(defaults.webserver_root),
            webgui_template: self.webgui_template.unwrap_or(defaults.webgui_template),
            webgui_websockets: self.webgui_websockets.unwrap_or(defaults.webgui_websockets),
            pid_file: self.pid_file.unwrap_or(defaults.pid_file),
            log_file: self.log_file.or(defaults.log_file),
            log_level: self.log_level.unwrap_or(defaults.log_level),
            ntp_sync: self.ntp_sync.unwrap_or(defaults.ntp_sync),
            stats_enable: self.stats_enable.unwrap_or(defaults.stats_enable),
            watchdog_enable: self.watchdog_enable.unwrap_or(defaults.watchdog_enable),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load config from `path`. A missing file yields defaults; any other I/O
/// error or a TOML parse failure is fatal.
pub fn load_config_from_path(path: &Path) -> Result<BrokerConfig, ConfigError> {
    let toml_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BrokerConfig::default()),
        Err(e) => return Err(ConfigError::Io(format!("reading '{}': {e}", path.display()))),
    };
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<BrokerConfig, ConfigError> {
    let raw: RawBrokerConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(raw.into_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.port, 5000);
        assert!(cfg.standalone);
    }

    #[test]
    fn partial_input_only_overrides_given_fields() {
        let cfg = load_config_from_str("port = 6000\nstandalone = false\n").unwrap();
        assert_eq!(cfg.port, 6000);
        assert!(!cfg.standalone);
        assert_eq!(cfg.receive_repeats, 1);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load_config_from_str("port = [[[").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_yields_defaults_not_an_error() {
        let cfg = load_config_from_path(Path::new("/nonexistent/path/broker.toml")).unwrap();
        assert_eq!(cfg.port, BrokerConfig::default().port);
    }
}
