//! Host configuration.
//!
//! # Responsibility
//! - Load the host's logging and registry defaults from JSON.
//! - Reject values that would only fail later at runtime.
//!
//! # Invariants
//! - A `HostConfig` returned by `from_json_str`/`from_path` is validated.
//! - Missing fields fall back to `HostConfig::default()`.

use crate::extension::contribution::DEFAULT_CONTRIBUTION_ORDER;
use crate::extension::slot_registry::SlotRegistry;
use crate::logging::{default_log_level, init_logging, normalize_level, normalize_log_dir};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Inclusive bound for `default_order` magnitude.
pub const MAX_DEFAULT_ORDER: i32 = 1000;

/// Host-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    /// Order applied to registrations that omit one.
    pub default_order: i32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_order: DEFAULT_CONTRIBUTION_ORDER,
        }
    }
}

impl HostConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: HostConfig =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::InvalidLogLevel)?;
        if let Some(dir) = &self.log_dir {
            normalize_log_dir(&dir.to_string_lossy()).map_err(ConfigError::InvalidLogDir)?;
        }
        if !(-MAX_DEFAULT_ORDER..=MAX_DEFAULT_ORDER).contains(&self.default_order) {
            return Err(ConfigError::InvalidDefaultOrder(self.default_order));
        }
        Ok(())
    }

    /// Builds an empty registry using this config's default order.
    pub fn registry<C: ?Sized>(&self) -> SlotRegistry<C> {
        SlotRegistry::with_default_order(self.default_order)
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns whether logging is active after the call.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(&self.log_level, &dir.to_string_lossy()).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}

/// Config load/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read { path: PathBuf, message: String },
    Parse(String),
    InvalidLogLevel(String),
    InvalidLogDir(String),
    InvalidDefaultOrder(i32),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "failed to read config `{}`: {message}", path.display())
            }
            Self::Parse(message) => write!(f, "config is not valid JSON: {message}"),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::InvalidLogDir(message) => write!(f, "{message}"),
            Self::InvalidDefaultOrder(value) => write!(
                f,
                "default_order {value} is out of range -{MAX_DEFAULT_ORDER}..={MAX_DEFAULT_ORDER}"
            ),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, HostConfig};
    use crate::extension::contribution::DEFAULT_CONTRIBUTION_ORDER;
    use std::io::Write;

    #[test]
    fn empty_object_uses_defaults() {
        let config = HostConfig::from_json_str("{}").expect("empty config");
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.default_order, DEFAULT_CONTRIBUTION_ORDER);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn parses_all_fields() {
        let config = HostConfig::from_json_str(
            r#"{"log_level":"warn","log_dir":"/var/log/slotboard","default_order":50}"#,
        )
        .expect("full config");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.default_order, 50);
        assert_eq!(
            config.log_dir.as_deref(),
            Some(std::path::Path::new("/var/log/slotboard"))
        );
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            HostConfig::from_json_str(r#"{"verbose":true}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            HostConfig::from_json_str(r#"{"log_level":"loud"}"#),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(matches!(
            HostConfig::from_json_str(r#"{"log_dir":"relative/logs"}"#),
            Err(ConfigError::InvalidLogDir(_))
        ));
        assert_eq!(
            HostConfig::from_json_str(r#"{"default_order":5000}"#),
            Err(ConfigError::InvalidDefaultOrder(5000))
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"default_order": -3}}"#).expect("write config");

        let config = HostConfig::from_path(file.path()).expect("config from file");
        assert_eq!(config.default_order, -3);

        let registry = config.registry::<str>();
        assert_eq!(registry.default_order(), -3);
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = HostConfig::from_path(&dir.path().join("absent.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn logging_is_skipped_without_directory() {
        let config = HostConfig::default();
        assert_eq!(config.init_logging(), Ok(false));
    }
}
