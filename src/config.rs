use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub identification: IdentificationConfig,
    #[serde(default)]
    pub mothership: MothershipConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentificationConfig {
    pub account_id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub machine_nickname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MothershipConfig {
    #[serde(default = "default_mothership_url")]
    pub url: String,
    #[serde(default = "default_register_uri")]
    pub register_uri: String,
    #[serde(default = "default_collector_uri")]
    pub collector_uri: String,
    #[serde(default = "default_status_uri")]
    pub status_uri: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub disk: DiskConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportingConfig {
    #[serde(default = "default_collect_interval_secs")]
    pub collect_interval_secs: u64,
    #[serde(default = "default_report_every_n_collections")]
    pub report_every_n_collections: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskConfig {
    #[serde(default = "default_include_partition_data")]
    pub include_partition_data: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub include_users: bool,
}

/// Local status endpoint. Disabled unless `listen` is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub listen: Option<String>,
}

impl Default for MothershipConfig {
    fn default() -> Self {
        Self {
            url: default_mothership_url(),
            register_uri: default_register_uri(),
            collector_uri: default_collector_uri(),
            status_uri: default_status_uri(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            collect_interval_secs: default_collect_interval_secs(),
            report_every_n_collections: default_report_every_n_collections(),
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            include_partition_data: default_include_partition_data(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse JSON in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identification(&self.identification)?;
        validate_mothership(&self.mothership)?;

        let reporting = &self.settings.reporting;
        if reporting.collect_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "settings.reporting.collect_interval_secs must be >= 1".to_string(),
            ));
        }
        if reporting.report_every_n_collections < 1 {
            return Err(ConfigError::Validation(
                "settings.reporting.report_every_n_collections must be >= 1".to_string(),
            ));
        }

        if let Some(listen) = &self.status.listen {
            if SocketAddr::from_str(listen).is_err() {
                return Err(ConfigError::Validation(format!(
                    "status.listen '{listen}' must be a host:port socket address"
                )));
            }
        }

        Ok(())
    }

    /// Full URL of the batch collector endpoint.
    pub fn collector_url(&self) -> String {
        format!("{}{}", self.mothership_base(), self.mothership.collector_uri)
    }

    pub fn status_url(&self) -> String {
        format!("{}{}", self.mothership_base(), self.mothership.status_uri)
    }

    /// Registration is versioned: `<url><register_uri>/<version>`.
    pub fn register_url(&self, version: &str) -> String {
        format!(
            "{}{}/{}",
            self.mothership_base(),
            self.mothership.register_uri,
            version
        )
    }

    fn mothership_base(&self) -> &str {
        self.mothership.url.trim_end_matches('/')
    }

    pub fn example_json() -> &'static str {
        include_str!("../config.json.example")
    }
}

fn validate_identification(id: &IdentificationConfig) -> Result<(), ConfigError> {
    let fields = [
        ("account_id", &id.account_id),
        ("organization_id", &id.organization_id),
        ("organization_name", &id.organization_name),
        ("machine_nickname", &id.machine_nickname),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "identification.{name} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_mothership(cfg: &MothershipConfig) -> Result<(), ConfigError> {
    let url = cfg.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation(
            "mothership.url must not be empty".to_string(),
        ));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "mothership.url '{url}' must start with http:// or https://"
        )));
    }

    let uris = [
        ("register_uri", &cfg.register_uri),
        ("collector_uri", &cfg.collector_uri),
        ("status_uri", &cfg.status_uri),
    ];
    for (name, value) in uris {
        if !value.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "mothership.{name} '{value}' must start with '/'"
            )));
        }
    }
    Ok(())
}

fn default_mothership_url() -> String {
    "http://mothership.serverstatusmonitoring.com".to_string()
}

fn default_register_uri() -> String {
    "/register".to_string()
}

fn default_collector_uri() -> String {
    "/collector".to_string()
}

fn default_status_uri() -> String {
    "/status".to_string()
}

const fn default_collect_interval_secs() -> u64 {
    1
}

const fn default_report_every_n_collections() -> u64 {
    2
}

const fn default_include_partition_data() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "identification": {
            "account_id": "A1",
            "organization_id": "O1",
            "organization_name": "Acme",
            "machine_nickname": "web-01"
        }
    }"#;

    fn valid_config() -> Config {
        serde_json::from_str(MINIMAL).unwrap()
    }

    #[test]
    fn minimal_config_takes_defaults() {
        let cfg = valid_config();
        cfg.validate().unwrap();
        assert_eq!(cfg.identification.account_id, "A1");
        assert_eq!(cfg.settings.reporting.collect_interval_secs, 1);
        assert_eq!(cfg.settings.reporting.report_every_n_collections, 2);
        assert!(cfg.settings.disk.include_partition_data);
        assert!(!cfg.settings.system.include_users);
        assert!(cfg.status.listen.is_none());
        assert_eq!(
            cfg.collector_url(),
            "http://mothership.serverstatusmonitoring.com/collector"
        );
    }

    #[test]
    fn register_url_carries_version() {
        let mut cfg = valid_config();
        cfg.mothership.url = "https://collector.example.com/".to_string();
        assert_eq!(
            cfg.register_url("1.0.1"),
            "https://collector.example.com/register/1.0.1"
        );
        assert_eq!(cfg.status_url(), "https://collector.example.com/status");
    }

    #[test]
    fn rejects_zero_collect_interval() {
        let mut cfg = valid_config();
        cfg.settings.reporting.collect_interval_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("collect_interval_secs"));
    }

    #[test]
    fn rejects_zero_report_every() {
        let mut cfg = valid_config();
        cfg.settings.reporting.report_every_n_collections = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("report_every_n_collections"));
    }

    #[test]
    fn rejects_empty_identity_field() {
        let mut cfg = valid_config();
        cfg.identification.machine_nickname = "  ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("identification.machine_nickname"));
    }

    #[test]
    fn rejects_bad_mothership_url_and_uri() {
        let mut cfg = valid_config();
        cfg.mothership.url = "mothership.local".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.mothership.collector_uri = "collector".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("collector_uri"));
    }

    #[test]
    fn rejects_bad_status_listen() {
        let mut cfg = valid_config();
        cfg.status.listen = Some("not-an-address".to_string());
        assert!(cfg.validate().is_err());

        cfg.status.listen = Some("127.0.0.1:9108".to_string());
        cfg.validate().unwrap();
    }

    #[test]
    fn load_from_file_reports_missing_and_malformed() {
        let missing = Config::load_from_file("/nonexistent/sse/config.json").unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let malformed = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_identification_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "settings": {{}} }}"#).unwrap();
        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn bundled_example_is_valid() {
        let cfg: Config = serde_json::from_str(Config::example_json()).unwrap();
        cfg.validate().unwrap();
    }
}
