//! Configuration loading.
//!
//! Settings come from three layers, highest first: command-line flags, an
//! optional TOML file, built-in defaults. The file lives at
//! `<config_dir>/rewrite-tutor/config.toml` unless `--config` points elsewhere:
//!
//! ```toml
//! base_url = "http://127.0.0.1:5001"
//! policy = "candidates"        # or "single"
//! temperature = 0.7
//! request_timeout = "60s"
//! log_level = "info"
//! ```

use crate::model::{SimplifyPolicy, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of the TOML file; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub policy: Option<SimplifyPolicy>,
    pub temperature: Option<f64>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub log_level: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub policy: Option<SimplifyPolicy>,
    pub temperature: Option<f64>,
    pub request_timeout: Option<Duration>,
    pub log_level: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub policy: SimplifyPolicy,
    pub temperature: f64,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            policy: SimplifyPolicy::default(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rewrite-tutor").join("config.toml"))
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit path (which must exist), or the default path if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_path(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

impl AppConfig {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let cfg = AppConfig {
            base_url: cli.base_url.or(file.base_url).unwrap_or(defaults.base_url),
            policy: cli.policy.or(file.policy).unwrap_or(defaults.policy),
            temperature: cli
                .temperature
                .or(file.temperature)
                .unwrap_or(defaults.temperature),
            request_timeout: cli
                .request_timeout
                .or(file.request_timeout)
                .unwrap_or(defaults.request_timeout),
            log_level: cli.log_level.or(file.log_level).unwrap_or(defaults.log_level),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn file_values_fill_in_defaults() {
        let f = write_config(
            r#"
            base_url = "http://tutor.local:8080"
            policy = "single"
            request_timeout = "15s"
            "#,
        );
        let file = FileConfig::load(Some(f.path())).unwrap();
        let cfg = AppConfig::resolve(file, Overrides::default()).unwrap();
        assert_eq!(cfg.base_url, "http://tutor.local:8080");
        assert_eq!(cfg.policy, SimplifyPolicy::SingleResult);
        assert_eq!(cfg.request_timeout, Duration::from_secs(15));
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(cfg.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig {
            temperature: Some(0.2),
            policy: Some(SimplifyPolicy::SingleResult),
            ..Default::default()
        };
        let cli = Overrides {
            temperature: Some(0.9),
            ..Default::default()
        };
        let cfg = AppConfig::resolve(file, cli).unwrap();
        assert_eq!(cfg.temperature, 0.9);
        assert_eq!(cfg.policy, SimplifyPolicy::SingleResult);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let f = write_config("colour = \"blue\"\n");
        let err = FileConfig::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn out_of_range_temperature_is_invalid() {
        let cli = Overrides {
            temperature: Some(1.3),
            ..Default::default()
        };
        let err = AppConfig::resolve(FileConfig::default(), cli).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn non_http_base_url_is_invalid() {
        let cli = Overrides {
            base_url: Some("localhost:5001".into()),
            ..Default::default()
        };
        assert!(AppConfig::resolve(FileConfig::default(), cli).is_err());
    }
}
