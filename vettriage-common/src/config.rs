//! Configuration loading and config file discovery
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config dir>/vettriage/config.toml`)
//! 4. System config file (`/etc/vettriage/config.toml`, Linux only)
//! 5. Compiled defaults (fallback, no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VETTRIAGE_CONFIG";

/// Service configuration as stored in TOML
///
/// Every field has a compiled default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Port the HTTP server listens on
    pub port: u16,
    /// Upper bound for a single model prediction, in milliseconds
    pub predict_timeout_ms: u64,
    /// Maximum accepted request body size, in bytes
    pub max_upload_bytes: usize,
    pub logging: LoggingConfig,
    pub predictors: PredictorsConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5002,
            predict_timeout_ms: 30_000,
            max_upload_bytes: 10 * 1024 * 1024,
            logging: LoggingConfig::default(),
            predictors: PredictorsConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset (e.g. "info", "vettriage_ai=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Endpoints of the three model services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorsConfig {
    pub text: PredictorEndpoint,
    pub audio: PredictorEndpoint,
    pub image: PredictorEndpoint,
}

impl Default for PredictorsConfig {
    fn default() -> Self {
        Self {
            text: PredictorEndpoint::new(
                "http://127.0.0.1:5003/predict-text",
                Some("http://127.0.0.1:5003/health-text"),
            ),
            audio: PredictorEndpoint::new(
                "http://127.0.0.1:5001/predict-audio",
                Some("http://127.0.0.1:5001/health-audio"),
            ),
            image: PredictorEndpoint::new(
                "http://127.0.0.1:5000/predict",
                Some("http://127.0.0.1:5000/health"),
            ),
        }
    }
}

/// One model service endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorEndpoint {
    /// Prediction URL
    pub url: String,
    /// Readiness URL checked once at startup (skipped when absent)
    #[serde(default)]
    pub health_url: Option<String>,
    /// Serialize calls to this model (for model services that are not reentrant)
    #[serde(default)]
    pub serialize: bool,
}

impl PredictorEndpoint {
    pub fn new(url: impl Into<String>, health_url: Option<&str>) -> Self {
        Self {
            url: url.into(),
            health_url: health_url.map(str::to_string),
            serialize: false,
        }
    }
}

impl TomlConfig {
    /// Reject values that would leave the service unusable
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::Config("bind_addr must not be empty".to_string()));
        }
        if self.predict_timeout_ms == 0 {
            return Err(Error::Config(
                "predict_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        for (name, endpoint) in [
            ("text", &self.predictors.text),
            ("audio", &self.predictors.audio),
            ("image", &self.predictors.image),
        ] {
            if endpoint.url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "predictors.{}.url must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no explicit path is given and no config file exists in
/// the standard locations.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: Standard locations
    default_config_locations()
        .into_iter()
        .find(|path| path.exists())
}

/// Standard config file locations for the platform, most specific first
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("vettriage").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc/vettriage/config.toml"));
    }
    locations
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No config file was named or found
    Defaults,
    /// A config file was named but does not exist
    Missing(PathBuf),
    /// Configuration was read from this file
    File(PathBuf),
}

/// Load configuration from a TOML file
///
/// A missing file is not fatal: compiled defaults are used and the returned
/// [`ConfigSource`] says so, leaving the caller to log it once logging is up.
/// A file that exists but cannot be parsed or fails validation is an error.
pub fn load_toml_config(path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = path else {
        return Ok((TomlConfig::default(), ConfigSource::Defaults));
    };

    if !path.exists() {
        return Ok((
            TomlConfig::default(),
            ConfigSource::Missing(path.to_path_buf()),
        ));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;

    Ok((config, ConfigSource::File(path.to_path_buf())))
}

/// Write configuration to a TOML file
///
/// Writes to a sibling temp file and renames it into place, so readers never
/// observe a partially written file. Missing parent directories are created.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
