//! INI configuration file.
//!
//! ```ini
//! [install]
//! root = .stone
//! max_concurrent_transfers = 10
//! connect_timeout_secs = 10
//! response_timeout_secs = 10
//! stall_timeout_secs = 30
//! chunk_size = 16384
//! spool_limit_mb = 64
//! reentry = reset
//!
//! [logging]
//! level = info
//! file = .stone/install.log
//! ```
//!
//! Every key is optional. Values override [`InstallerConfig`] defaults and are
//! themselves overridden by command-line flags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::manager::{InstallerConfig, ReentryPolicy};

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE_NAME: &str = "stonectl.ini";

/// Errors while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for [{section}] {key}: {value}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// `[install]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallSection {
    pub root: Option<PathBuf>,
    pub max_concurrent_transfers: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub response_timeout_secs: Option<u64>,
    pub stall_timeout_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub spool_limit_mb: Option<usize>,
    pub reentry: Option<ReentryPolicy>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingSection {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub install: InstallSection,
    pub logging: LoggingSection,
}

/// Default config file location.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Load the default config file; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text)
    }

    /// Parse config file contents.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = ConfigFile::default();

        if let Some(section) = ini.section(Some("install")) {
            let install = &mut config.install;
            install.root = section.get("root").map(PathBuf::from);
            install.max_concurrent_transfers =
                parse_value(section, "install", "max_concurrent_transfers")?;
            install.connect_timeout_secs = parse_value(section, "install", "connect_timeout_secs")?;
            install.response_timeout_secs =
                parse_value(section, "install", "response_timeout_secs")?;
            install.stall_timeout_secs = parse_value(section, "install", "stall_timeout_secs")?;
            install.chunk_size = parse_value(section, "install", "chunk_size")?;
            install.spool_limit_mb = parse_value(section, "install", "spool_limit_mb")?;
            install.reentry = match section.get("reentry") {
                Some(value) => Some(ReentryPolicy::from_config_str(value).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        section: "install",
                        key: "reentry",
                        value: value.to_string(),
                    }
                })?),
                None => None,
            };
        }

        if let Some(section) = ini.section(Some("logging")) {
            config.logging.level = section.get("level").map(str::to_string);
            config.logging.file = section.get("file").map(PathBuf::from);
        }

        Ok(config)
    }

    /// Apply file values on top of `base`.
    pub fn apply(&self, base: InstallerConfig) -> InstallerConfig {
        let install = &self.install;
        let mut config = base;

        if let Some(root) = &install.root {
            config.root = root.clone();
        }
        if let Some(max) = install.max_concurrent_transfers {
            config = config.with_max_concurrent_transfers(max);
        }
        if let Some(secs) = install.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = install.response_timeout_secs {
            config = config.with_response_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = install.stall_timeout_secs {
            config = config.with_stall_timeout(Duration::from_secs(secs));
        }
        if let Some(size) = install.chunk_size {
            config = config.with_chunk_size(size);
        }
        if let Some(mb) = install.spool_limit_mb {
            config = config.with_spool_limit(mb * 1024 * 1024);
        }
        if let Some(policy) = install.reentry {
            config = config.with_reentry(policy);
        }
        config
    }
}

fn parse_value<T: FromStr>(
    section: &Properties,
    name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: name,
                key,
                value: value.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_file() {
        let config = ConfigFile::parse(
            "[install]\n\
             root = /srv/stone\n\
             max_concurrent_transfers = 3\n\
             connect_timeout_secs = 4\n\
             response_timeout_secs = 5\n\
             stall_timeout_secs = 6\n\
             chunk_size = 8192\n\
             spool_limit_mb = 2\n\
             reentry = reject\n\
             \n\
             [logging]\n\
             level = debug\n\
             file = install.log\n",
        )
        .unwrap();

        assert_eq!(config.install.root, Some(PathBuf::from("/srv/stone")));
        assert_eq!(config.install.max_concurrent_transfers, Some(3));
        assert_eq!(config.install.reentry, Some(ReentryPolicy::Reject));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.file, Some(PathBuf::from("install.log")));

        let applied = config.apply(InstallerConfig::default());
        assert_eq!(applied.root, PathBuf::from("/srv/stone"));
        assert_eq!(applied.concurrency(), 3);
        assert_eq!(applied.connect_timeout, Duration::from_secs(4));
        assert_eq!(applied.response_timeout, Duration::from_secs(5));
        assert_eq!(applied.stall_timeout, Duration::from_secs(6));
        assert_eq!(applied.chunk_size, 8192);
        assert_eq!(applied.spool_limit, 2 * 1024 * 1024);
        assert_eq!(applied.reentry, ReentryPolicy::Reject);
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());

        let applied = config.apply(InstallerConfig::default());
        assert_eq!(applied.root, PathBuf::from(".stone"));
        assert_eq!(applied.concurrency(), 10);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = ConfigFile::parse("[install]\nmax_concurrent_transfers = many\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "max_concurrent_transfers",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_reentry_rejected() {
        let err = ConfigFile::parse("[install]\nreentry = append\n").unwrap_err();
        assert!(err.to_string().contains("reentry"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stonectl.ini");
        fs::write(&path, "[install]\nroot = custom\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.install.root, Some(PathBuf::from("custom")));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = ConfigFile::load_from(Path::new("/nonexistent/stonectl.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
