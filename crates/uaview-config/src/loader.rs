// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` and `${VAR:default}` placeholders in the raw text
//! 2. Parse YAML, TOML or JSON, chosen by file extension
//! 3. Apply `UAVIEW_*` environment overrides
//! 4. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UAVIEW_APPLICATION_NAME=line3-viewer
//! UAVIEW_POLL_INTERVAL=250ms
//! UAVIEW_CONNECT_TIMEOUT=5s
//! UAVIEW_DISCOVERY_TIMEOUT=2s
//! UAVIEW_PKI_DIR=/var/lib/uaview/pki
//! UAVIEW_TRUST_SERVER_CERTS=true
//! UAVIEW_LOG_LEVEL=debug
//! UAVIEW_LOG_FORMAT=json
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::AppConfig;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default prefix of override variables.
pub const DEFAULT_ENV_PREFIX: &str = "UAVIEW";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`AppConfig`] from files or strings.
///
/// # Examples
///
/// ```no_run
/// use uaview_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("uaview.yaml").unwrap();
/// println!("poll every {:?}", config.client.poll_interval);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `UAVIEW` prefix and placeholder resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and environment overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = self.read_file(path)?;
        let config = self
            .parse_content(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;

        let config = self.finish(config)?;
        debug!(
            application = %config.client.application_name,
            poll_interval = %humantime::format_duration(config.client.poll_interval),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let config = self.parse_content(content, format)?;
        self.finish(config)
    }

    fn finish(&self, mut config: AppConfig) -> ConfigResult<AppConfig> {
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        match format {
            ConfigFormat::Yaml => parse_yaml(&content),
            ConfigFormat::Toml => {
                toml::from_str(&content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::serialization(e.to_string())),
        }
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        let client = &mut config.client;

        if let Some(value) = self.var("APPLICATION_NAME") {
            client.application_name = value;
        }
        if let Some(value) = self.var("APPLICATION_URI") {
            client.application_uri = Some(value);
        }
        if let Some(value) = self.var("PKI_DIR") {
            client.pki_dir = Some(value);
        }
        if let Some(value) = self.var("TRUST_SERVER_CERTS") {
            client.trust_server_certs = parse_bool(&value);
        }
        if let Some(value) = self.duration_var("POLL_INTERVAL")? {
            client.poll_interval = value;
        }
        if let Some(value) = self.duration_var("CONNECT_TIMEOUT")? {
            client.connect_timeout = value;
        }
        if let Some(value) = self.duration_var("DISCOVERY_TIMEOUT")? {
            client.discovery_timeout = value;
        }
        if let Some(value) = self.duration_var("REQUEST_TIMEOUT")? {
            client.request_timeout = value;
        }

        if let Some(value) = self.var("LOG_LEVEL") {
            config.logging.level = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(self.name("LOG_LEVEL"), "unknown level"))?;
        }
        if let Some(value) = self.var("LOG_FORMAT") {
            config.logging.format = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(self.name("LOG_FORMAT"), "unknown format"))?;
        }

        Ok(())
    }

    fn name(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key)
    }

    fn var(&self, key: &str) -> Option<String> {
        env::var(self.name(key)).ok()
    }

    fn duration_var(&self, key: &str) -> ConfigResult<Option<Duration>> {
        self.var(key)
            .map(|value| {
                humantime::parse_duration(&value).map_err(|e| {
                    ConfigError::invalid_env_var(self.name(key), format!("expected a duration: {e}"))
                })
            })
            .transpose()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
///
/// Unknown variables without a default are left in place.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LogFormat, LogLevel};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
client:
  application_name: Line 3 Viewer
  poll_interval: 250ms
  discovery_timeout: 2s
  subscription:
    publishing_interval: 1s
logging:
  level: debug
  format: json
"#;

    fn loader(prefix: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(prefix)
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = loader("UAVIEW_TEST_YAML").load(file.path()).unwrap();
        assert_eq!(config.client.application_name, "Line 3 Viewer");
        assert_eq!(config.client.poll_interval, Duration::from_millis(250));
        assert_eq!(config.client.discovery_timeout, Duration::from_secs(2));
        assert_eq!(
            config.client.subscription.publishing_interval,
            Duration::from_secs(1)
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml_and_json() {
        let toml = "[client]\napplication_name = \"toml\"\npoll_interval = \"1s\"\n";
        let config = loader("UAVIEW_TEST_TOML")
            .load_from_str(toml, ConfigFormat::Toml)
            .unwrap();
        assert_eq!(config.client.application_name, "toml");
        assert_eq!(config.client.poll_interval, Duration::from_secs(1));

        let json = r#"{"client": {"application_name": "json"}, "logging": {"level": "warn"}}"#;
        let config = loader("UAVIEW_TEST_JSON")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.client.application_name, "json");
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_env_placeholder_resolution() {
        env::set_var("UAVIEW_TEST_PLACEHOLDER_NAME", "from-env");
        let resolved = resolve_env_placeholders(
            "a: ${UAVIEW_TEST_PLACEHOLDER_NAME}\nb: ${UAVIEW_TEST_PLACEHOLDER_MISSING:fallback}\nc: ${UAVIEW_TEST_PLACEHOLDER_MISSING}",
        );
        assert_eq!(
            resolved,
            "a: from-env\nb: fallback\nc: ${UAVIEW_TEST_PLACEHOLDER_MISSING}"
        );
        assert_eq!(resolve_env_placeholders("open ${NAME"), "open ${NAME");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("UAVIEW_TEST_OVR_POLL_INTERVAL", "100ms");
        env::set_var("UAVIEW_TEST_OVR_LOG_LEVEL", "error");
        env::set_var("UAVIEW_TEST_OVR_TRUST_SERVER_CERTS", "yes");

        let config = loader("UAVIEW_TEST_OVR")
            .load_from_str("{}", ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.client.poll_interval, Duration::from_millis(100));
        assert_eq!(config.logging.level, LogLevel::Error);
        assert!(config.client.trust_server_certs);
    }

    #[test]
    fn test_invalid_env_override() {
        env::set_var("UAVIEW_TEST_BAD_CONNECT_TIMEOUT", "soon");
        let err = loader("UAVIEW_TEST_BAD")
            .load_from_str("{}", ConfigFormat::Json)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn test_validation_failure() {
        let err = loader("UAVIEW_TEST_VALIDATE")
            .load_from_str(r#"{"client": {"poll_interval": "0s"}}"#, ConfigFormat::Json)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let err = load_config("/nonexistent/uaview.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = ConfigLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
