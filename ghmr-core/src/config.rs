//! TOML configuration for ghmr.
//!
//! Read from `$XDG_CONFIG_HOME/ghmr/config.toml` (falling back to
//! `~/.config/ghmr/config.toml`). Every key is optional:
//!
//! ```toml
//! [storage]
//! backend = "sqlite"        # "sqlite" | "json" | "memory"
//! path = "/custom/reviews.db"
//! write_mode = "serialized" # "serialized" | "detached"
//!
//! [log]
//! level = "info"
//! json = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::write_queue::WriteMode;

/// Which [`ViewedStore`](crate::persistence::ViewedStore) adapter to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file (sqlite) or reviews directory (json). Defaults under the
    /// data directory.
    pub path: Option<PathBuf>,
    pub write_mode: WriteMode,
}

impl StorageConfig {
    /// Location of the store, resolving the default under `data_dir`.
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Json) => data_dir.join("reviews"),
            (None, _) => data_dir.join("reviews.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub log: LogConfig,
}

impl Config {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when `raw` is not valid for this schema;
    /// `path` is only used for the error message.
    pub fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, returning defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

fn xdg_dir(var: &str, home_fallback: &[&str]) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME").ok().map(|home| {
                home_fallback
                    .iter()
                    .fold(PathBuf::from(home), |acc, part| acc.join(part))
            })
        })
        .unwrap_or_else(|| PathBuf::from(home_fallback.last().copied().unwrap_or(".")))
}

/// Returns the path to the ghmr config file.
///
/// Prefers `$XDG_CONFIG_HOME/ghmr/config.toml`; falls back to
/// `~/.config/ghmr/config.toml` when the env var is absent.
pub fn config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"]).join("ghmr").join("config.toml")
}

/// Returns the directory holding persisted review state.
///
/// Prefers `$XDG_DATA_HOME/ghmr`; falls back to `~/.local/share/ghmr`.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"]).join("ghmr")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml("", Path::new("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.write_mode, WriteMode::Serialized);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn parses_storage_and_log_sections() {
        let raw = r#"
            [storage]
            backend = "json"
            write_mode = "detached"

            [log]
            level = "ghmr_core=debug"
            json = true
        "#;
        let config = Config::from_toml(raw, Path::new("config.toml")).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.storage.write_mode, WriteMode::Detached);
        assert!(config.log.json);
        assert_eq!(
            config.storage.resolved_path(Path::new("/data")),
            PathBuf::from("/data/reviews")
        );
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let err = Config::from_toml("[storage]\nbackend = \"redis\"\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.resolved_path(Path::new("/d")), PathBuf::from("/d/reviews.db"));
    }
}
