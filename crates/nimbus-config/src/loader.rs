// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for NIMBUS.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and detect its format from the extension
//! 2. Resolve `${VAR}` placeholders in the raw content
//! 3. Parse into [`NimbusConfig`]
//! 4. Apply `NIMBUS_*` environment variable overrides
//! 5. Resolve relative paths against the file's directory
//! 6. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! NIMBUS_GATEWAY_ID=gw-7731
//! NIMBUS_MQTT_HOST=mqtt.example.com
//! NIMBUS_LOG_LEVEL=debug
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::NimbusConfig;

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for NIMBUS.
///
/// Supports YAML, TOML and JSON files, environment variable overrides and
/// `${VAR}` placeholder substitution.
///
/// # Examples
///
/// ```no_run
/// use nimbus_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("nimbus.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "NIMBUS".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the file extension: `.yaml`/`.yml`,
    /// `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<NimbusConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;

        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(&content)
        } else {
            content
        };

        let mut config = parse_with_path(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.resolve_paths {
            self.resolve_relative_paths(&mut config, &base_path);
        }

        config.validate()?;

        info!(gateway = %config.gateway.id, "Configuration loaded successfully");
        debug!(
            state_dir = %config.paths.state_dir.display(),
            broker = %config.cloud.mqtt.host,
            "Resolved configuration paths"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> ConfigResult<NimbusConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config = parse_str(&content, format)?;

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

    /// Resolves `${VAR}` and `${VAR:default}` placeholders in raw content.
    ///
    /// Unset variables without a default resolve to the empty string, so a
    /// missing secret shows up as a validation error rather than a parse
    /// error.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (name, default) = match var_content.find(':') {
                Some(idx) => (&var_content[..idx], Some(&var_content[idx + 1..])),
                None => (var_content.as_str(), None),
            };

            match env::var(name) {
                Ok(value) => result.push_str(&value),
                Err(_) => result.push_str(default.unwrap_or("")),
            }
        }

        result
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut NimbusConfig) -> ConfigResult<()> {
        if let Ok(value) = env::var(format!("{}_GATEWAY_ID", self.env_prefix)) {
            config.gateway.id = value;
        }
        if let Ok(value) = env::var(format!("{}_GATEWAY_NAME", self.env_prefix)) {
            config.gateway.name = value;
        }

        if let Ok(value) = env::var(format!("{}_MQTT_HOST", self.env_prefix)) {
            config.cloud.mqtt.host = value;
        }
        if let Ok(value) = env::var(format!("{}_MQTT_PORT", self.env_prefix)) {
            config.cloud.mqtt.port = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(
                    format!("{}_MQTT_PORT", self.env_prefix),
                    "expected valid port number",
                )
            })?;
        }

        if let Ok(value) = env::var(format!("{}_RELAY_INTERVAL_SECS", self.env_prefix)) {
            let secs: u64 = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(
                    format!("{}_RELAY_INTERVAL_SECS", self.env_prefix),
                    "expected valid number of seconds",
                )
            })?;
            config.relay.interval = std::time::Duration::from_secs(secs);
        }

        if let Ok(value) = env::var(format!("{}_LOG_LEVEL", self.env_prefix)) {
            config.logging.level = value;
        }

        if let Ok(value) = env::var(format!("{}_STATE_DIR", self.env_prefix)) {
            config.paths.state_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var(format!("{}_CREDENTIALS_FILE", self.env_prefix)) {
            config.paths.credentials_file = PathBuf::from(value);
        }

        Ok(())
    }

    /// Resolves relative paths in the configuration.
    fn resolve_relative_paths(&self, config: &mut NimbusConfig, base_path: &Path) {
        if config.paths.state_dir.is_relative() {
            config.paths.state_dir = base_path.join(&config.paths.state_dir);
        }
        if config.paths.credentials_file.is_relative() {
            config.paths.credentials_file = base_path.join(&config.paths.credentials_file);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_with_path(content: &str, format: ConfigFormat, path: &Path) -> ConfigResult<NimbusConfig> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
            match e.location() {
                Some(location) => ConfigError::parse_at_line(path, e.to_string(), location.line()),
                None => ConfigError::parse(path, e.to_string()),
            }
        }),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::parse(path, e.to_string()))
        }
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| ConfigError::parse_at_line(path, e.to_string(), e.line())),
    }
}

fn parse_str(content: &str, format: ConfigFormat) -> ConfigResult<NimbusConfig> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn loader() -> ConfigLoader {
        // Unique prefix per process keeps ambient NIMBUS_* variables out.
        ConfigLoader::new().with_env_prefix("NIMBUS_LOADER_TEST_NONE")
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "nimbus.yaml",
            "gateway:\n  id: gw-7731\nrelay:\n  interval: 10\n",
        );

        let config = loader().load(&path).unwrap();
        assert_eq!(config.gateway.id, "gw-7731");
        assert_eq!(config.relay.interval, std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "nimbus.toml",
            "[gateway]\nid = \"gw-7731\"\n\n[relay]\npolicy = \"max\"\n",
        );

        let config = loader().load(&path).unwrap();
        assert_eq!(config.gateway.id, "gw-7731");
        assert_eq!(config.relay.policy, "max");
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "nimbus.json", r#"{"gateway": {"id": "gw-7731"}}"#);

        let config = loader().load(&path).unwrap();
        assert_eq!(config.gateway.id, "gw-7731");
    }

    #[test]
    fn test_missing_file_reports_not_found() {
        let error = loader().load("/nonexistent/nimbus.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "nimbus.ini", "[gateway]\nid=x\n");

        let error = loader().load(&path).unwrap_err();
        assert!(matches!(error, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_malformed_yaml_reports_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "nimbus.yaml", "gateway: [unclosed\n");

        let error = loader().load(&path).unwrap_err();
        assert_eq!(error.error_type(), "parse");
    }

    #[test]
    fn test_env_placeholder_resolution() {
        env::set_var("NIMBUS_TEST_PLACEHOLDER_ID", "gw-from-env");
        let yaml = "gateway:\n  id: ${NIMBUS_TEST_PLACEHOLDER_ID}\n";

        let config = loader().load_from_str(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.gateway.id, "gw-from-env");
        env::remove_var("NIMBUS_TEST_PLACEHOLDER_ID");
    }

    #[test]
    fn test_env_placeholder_default_value() {
        let yaml = "gateway:\n  id: ${NIMBUS_TEST_UNSET_VARIABLE:gw-default}\n";

        let config = loader().load_from_str(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.gateway.id, "gw-default");
    }

    #[test]
    fn test_env_override_gateway_id() {
        env::set_var("NIMBUS_OVERRIDE_TEST_GATEWAY_ID", "gw-overridden");
        let yaml = "gateway:\n  id: gw-original\n";

        let config = ConfigLoader::new()
            .with_env_prefix("NIMBUS_OVERRIDE_TEST")
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.gateway.id, "gw-overridden");
        env::remove_var("NIMBUS_OVERRIDE_TEST_GATEWAY_ID");
    }

    #[test]
    fn test_invalid_env_override_rejected() {
        env::set_var("NIMBUS_BADPORT_TEST_MQTT_PORT", "banana");
        let yaml = "gateway:\n  id: gw-7731\n";

        let error = ConfigLoader::new()
            .with_env_prefix("NIMBUS_BADPORT_TEST")
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidEnvVar { .. }));
        env::remove_var("NIMBUS_BADPORT_TEST_MQTT_PORT");
    }

    #[test]
    fn test_relative_state_dir_resolved_against_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "nimbus.yaml",
            "gateway:\n  id: gw-7731\npaths:\n  state_dir: state\n",
        );

        let config = loader().load(&path).unwrap();
        assert_eq!(config.paths.state_dir, dir.path().join("state"));
    }

    #[test]
    fn test_validation_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "nimbus.yaml", "gateway:\n  id: \"\"\n");

        let error = loader().load(&path).unwrap_err();
        assert!(matches!(error, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("a.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(ConfigFormat::Yaml.extension(), "yaml");
        assert!(ConfigFormat::from_path(Path::new("a")).is_err());
    }
}
