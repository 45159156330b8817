use std::{env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ticker::DEFAULT_POLL_INTERVAL;

pub const ENV_PREFIX: &str = "SHARETP_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid base URL {0}")]
    InvalidBaseUrl(String, #[source] url::ParseError),
    #[error("Invalid value for {0}, expected a positive integer, found {1}")]
    InvalidNumber(&'static str, String),
    #[error("Invalid value for {0}, expected true or false, found {1}")]
    InvalidBool(&'static str, String),
}

/// Reads `SHARETP_<key>`, falling back to the bare `<key>`
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}"))
        .or_else(|_| env::var(key))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Location used when none is given, and base for relative ones
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Origin share links are published under, when it differs from the
    /// location's own
    #[serde(default)]
    pub public_url: Option<Url>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            base_url: default_base_url(),
            public_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            data_dir: default_data_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_site_name() -> String {
    "TOTP Generator".to_string()
}

fn default_base_url() -> Url {
    Url::parse("http://localhost/").expect("static base URL is valid")
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("sharetp"))
        .unwrap_or_else(|| PathBuf::from(".sharetp"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads the configuration from `SHARETP_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(get_env_with_prefix)
    }

    /// Loads the configuration through `lookup`, which receives unprefixed
    /// keys such as `BASE_URL`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::new();

        if let Some(site_name) = lookup("SITE_NAME").filter(|s| !s.is_empty()) {
            builder = builder.with_site_name(site_name);
        }
        if let Some(raw) = lookup("BASE_URL").filter(|s| !s.is_empty()) {
            let base_url =
                Url::parse(&raw).map_err(|e| ConfigError::InvalidBaseUrl(raw.clone(), e))?;
            builder = builder.with_base_url(base_url);
        }
        if let Some(raw) = lookup("PUBLIC_URL").filter(|s| !s.is_empty()) {
            let public_url =
                Url::parse(&raw).map_err(|e| ConfigError::InvalidBaseUrl(raw.clone(), e))?;
            builder = builder.with_public_url(public_url);
        }
        if let Some(raw) = lookup("POLL_INTERVAL_MS") {
            let poll_interval_ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidNumber("POLL_INTERVAL_MS", raw))?;
            builder = builder.with_poll_interval(Duration::from_millis(poll_interval_ms));
        }
        if let Some(data_dir) = lookup("DATA_DIR").filter(|s| !s.is_empty()) {
            builder = builder.with_data_dir(data_dir);
        }
        if let Some(level) = lookup("LOG_LEVEL").filter(|s| !s.is_empty()) {
            builder = builder.with_log_level(level);
        }
        if let Some(raw) = lookup("LOG_JSON") {
            let json = raw
                .trim()
                .parse::<bool>()
                .map_err(|_| ConfigError::InvalidBool("LOG_JSON", raw))?;
            builder = builder.with_json_logging(json);
        }

        Ok(builder.build())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Builder for [`Config`]
#[must_use = "builder does nothing until you call build()"]
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.config.site_name = site_name.into();
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = base_url;
        self
    }

    pub fn with_public_url(mut self, public_url: Url) -> Self {
        self.config.public_url = Some(public_url);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval_ms = poll_interval.as_millis() as u64;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = data_dir.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!("TOTP Generator", config.site_name);
        assert_eq!("http://localhost/", config.base_url.as_str());
        assert_eq!(None, config.public_url);
        assert_eq!(Duration::from_millis(250), config.poll_interval());
        assert_eq!("info", config.logging.level);
        assert!(!config.logging.json);
    }

    #[test]
    fn reads_every_key() {
        let config = Config::from_lookup(lookup(&[
            ("SITE_NAME", "Work codes"),
            ("BASE_URL", "https://totp.example/app/"),
            ("PUBLIC_URL", "https://share.example/"),
            ("POLL_INTERVAL_MS", "100"),
            ("DATA_DIR", "/tmp/sharetp"),
            ("LOG_LEVEL", "sharetp=debug"),
            ("LOG_JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(
            ConfigBuilder::new()
                .with_site_name("Work codes")
                .with_base_url(Url::parse("https://totp.example/app/").unwrap())
                .with_public_url(Url::parse("https://share.example/").unwrap())
                .with_poll_interval(Duration::from_millis(100))
                .with_data_dir("/tmp/sharetp")
                .with_log_level("sharetp=debug")
                .with_json_logging(true)
                .build(),
            config
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("BASE_URL", "not a url")])),
            Err(ConfigError::InvalidBaseUrl(_, _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("POLL_INTERVAL_MS", "0")])),
            Err(ConfigError::InvalidNumber(_, _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("LOG_JSON", "yes")])),
            Err(ConfigError::InvalidBool(_, _))
        ));
    }

    #[test]
    fn env_prefix_wins() {
        env::set_var("SHARETP_CONFIG_TEST_KEY", "prefixed");
        env::set_var("CONFIG_TEST_KEY", "bare");
        assert_eq!(
            Some("prefixed".to_string()),
            get_env_with_prefix("CONFIG_TEST_KEY")
        );

        env::remove_var("SHARETP_CONFIG_TEST_KEY");
        assert_eq!(Some("bare".to_string()), get_env_with_prefix("CONFIG_TEST_KEY"));

        env::remove_var("CONFIG_TEST_KEY");
    }
}
