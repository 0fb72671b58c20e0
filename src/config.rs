use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::mail::SmtpConfig;
use crate::remote::{RemoteConfig, DEFAULT_TIMEOUT};
use crate::settings::Bootstrap;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote store parameters as written in the config file.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct RemoteSection {
    /// Server URL (e.g., "https://sync.example.com")
    pub server_url: Option<String>,
    /// Tenant the API key belongs to
    pub tenant_id: Option<String>,
    /// API key for authentication
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for RemoteSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSection")
            .field("server_url", &self.server_url)
            .field("tenant_id", &self.tenant_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RemoteSection {
    /// Returns the connection parameters when all of them are present.
    pub fn to_remote_config(&self) -> Option<RemoteConfig> {
        let config = RemoteConfig::new(
            self.server_url.clone()?,
            self.tenant_id.clone()?,
            self.api_key.clone()?,
        );
        config.is_valid().then_some(config)
    }

    fn is_empty(&self) -> bool {
        self.server_url.is_none() && self.tenant_id.is_none() && self.api_key.is_none()
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Hotel display name used when no settings have been saved
    pub hotel_name: ConfigValue<String>,
    /// Remote store parameters
    pub remote: RemoteSection,
    /// Default contact address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Site verification key handed to the web front end
    #[serde(skip_serializing)]
    pub site_key: Option<String>,
    /// Outbound mail relay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    hotel_name: Option<String>,
    remote: Option<RemoteSection>,
    contact_email: Option<String>,
    site_key: Option<String>,
    smtp: Option<SmtpConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("staybook.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut hotel_name = ConfigValue::new("My Hotel".to_string(), ConfigSource::Default);
        let mut remote = RemoteSection::default();
        let mut contact_email = None;
        let mut site_key = None;
        let mut smtp: Option<SmtpConfig> = None;
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(name) = file_config.hotel_name {
                hotel_name = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(section) = file_config.remote {
                remote = section;
            }
            contact_email = file_config.contact_email;
            site_key = file_config.site_key;
            smtp = file_config.smtp;
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("STAYBOOK_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("STAYBOOK_HOTEL_NAME") {
            hotel_name = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("STAYBOOK_REMOTE_URL") {
            remote.server_url = Some(url);
        }
        if let Ok(tenant) = std::env::var("STAYBOOK_REMOTE_TENANT") {
            remote.tenant_id = Some(tenant);
        }
        if let Ok(key) = std::env::var("STAYBOOK_REMOTE_API_KEY") {
            remote.api_key = Some(key);
        }
        if let Some(secs) = std::env::var("STAYBOOK_REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            remote.timeout_secs = Some(secs);
        }
        if let Ok(email) = std::env::var("STAYBOOK_CONTACT_EMAIL") {
            contact_email = Some(email);
        }
        if let Ok(key) = std::env::var("STAYBOOK_SITE_KEY") {
            site_key = Some(key);
        }
        if let Ok(host) = std::env::var("STAYBOOK_SMTP_HOST") {
            let mut section = smtp.take().unwrap_or_default();
            section.smtp_host = host;
            smtp = Some(section);
        }
        if let Some(section) = smtp.as_mut() {
            section.apply_env();
        }

        Ok(Self {
            database_path,
            hotel_name,
            remote,
            contact_email,
            site_key,
            smtp,
            config_file,
        })
    }

    /// Request timeout for remote store calls.
    pub fn remote_timeout(&self) -> Duration {
        self.remote
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Returns true if any remote parameter was supplied, even an incomplete set.
    pub fn has_remote_params(&self) -> bool {
        !self.remote.is_empty()
    }

    /// Values consulted when computing default settings.
    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap {
            hotel_name: self.hotel_name.value.clone(),
            remote: self.remote.to_remote_config(),
            remote_params_supplied: self.has_remote_params(),
            contact_email: self.contact_email.clone(),
            site_key: self.site_key.clone(),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/staybook/
    /// - macOS: ~/Library/Application Support/staybook/
    /// - Windows: %APPDATA%/staybook/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("staybook")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/staybook/
    /// - macOS: ~/Library/Application Support/staybook/
    /// - Windows: %APPDATA%/staybook/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("staybook")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
