//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file; everything has a compiled default so a
//! missing or partial file never prevents startup.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LEXA_ROOT_FOLDER";

/// Environment variable overriding the ingest batch size
pub const BATCH_SIZE_ENV: &str = "LEXA_BATCH_SIZE";

/// Database file name inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "lexa.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; defaults to `<root_folder>/lexa.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ingestion tuning
    #[serde(default)]
    pub ingest: IngestSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Ingestion tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSettings {
    /// Items committed per transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Lemma frequency rank at or below which a lemma counts as common
    #[serde(default = "default_common_lemma_rank")]
    pub common_lemma_rank: usize,

    /// Maximum number of per-item errors kept on an ingestion record
    #[serde(default = "default_max_error_log")]
    pub max_error_log: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            common_lemma_rank: default_common_lemma_rank(),
            max_error_log: default_max_error_log(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_common_lemma_rank() -> usize {
    1000
}

fn default_max_error_log() -> usize {
    100
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load the platform config file, falling back to defaults when absent or invalid
    pub fn load_or_default() -> Self {
        match locate_config_file() {
            Ok(path) => match Self::load(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(BATCH_SIZE_ENV) {
            match value.parse::<usize>() {
                Ok(size) if size > 0 => self.ingest.batch_size = size,
                _ => warn!("{} must be a positive integer, got '{}'", BATCH_SIZE_ENV, value),
            }
        }
    }
}

/// Root folder resolution following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = &toml_config.root_folder {
        return root.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database path: explicit CLI path, then TOML `database_path`, then `<root>/lexa.db`
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    toml_config: &TomlConfig,
    root_folder: &Path,
) -> PathBuf {
    cli_arg
        .map(Path::to_path_buf)
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or_else(|| root_folder.join(DEFAULT_DATABASE_FILE))
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("lexa").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/lexa/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lexa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lexa"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("lexa"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lexa"))
    } else {
        // ~/.local/share/lexa (or /var/lib/lexa for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("lexa"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lexa"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/data/lexa"

            [ingest]
            batch_size = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/data/lexa")));
        assert_eq!(config.ingest.batch_size, 250);
        assert_eq!(config.ingest.common_lemma_rank, 1000);
        assert_eq!(config.ingest.max_error_log, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_database_path_defaults_into_root() {
        let config = TomlConfig::default();
        let path = resolve_database_path(None, &config, Path::new("/srv/lexa"));
        assert_eq!(path, PathBuf::from("/srv/lexa/lexa.db"));
    }

    #[test]
    fn test_cli_database_path_wins() {
        let config = TomlConfig {
            database_path: Some(PathBuf::from("/from/toml.db")),
            ..Default::default()
        };
        let path = resolve_database_path(Some(Path::new("/cli.db")), &config, Path::new("/r"));
        assert_eq!(path, PathBuf::from("/cli.db"));
    }
}
