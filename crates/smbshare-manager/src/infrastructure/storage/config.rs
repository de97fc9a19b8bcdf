//! TOML-based settings for the share manager itself.
//!
//! These settings say *where* things live and *how* to drive the service;
//! they are not the share configuration.  The settings file is looked up in
//! this order:
//!
//! 1. An explicit path (`--config` or `SMBSHARE_CONFIG`).
//! 2. `$XDG_CONFIG_HOME/smbshare/config.toml` (or `~/.config/...`) if it exists.
//! 3. `/etc/smbshare/config.toml`.
//!
//! A missing file is not an error: every field has a default, so a fresh
//! machine works without any settings at all.
//!
//! # Example
//!
//! ```toml
//! [storage]
//! conf_path = "/etc/samba/smb.conf"
//! backup_dir = "/etc/samba/backups"
//! max_backups = 20
//! file_mode = "0644"
//!
//! [service]
//! units = ["smbd", "nmbd"]
//! use_sudo = false
//! restart_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so a settings file only needs the
//! keys the administrator wants to change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// System-wide settings path used when no user file exists.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/smbshare/config.toml";

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level manager settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ManagerConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location of the share configuration and its backups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// The live share configuration file.
    #[serde(default = "default_conf_path")]
    pub conf_path: PathBuf,
    /// Directory receiving a backup before every write.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    /// Number of backups kept; older ones are pruned.  `0` keeps all.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Octal permission bits applied to the live file on every write.
    #[serde(default = "default_file_mode")]
    pub file_mode: String,
}

/// How the file-sharing service is controlled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// systemd units restarted after each change, in order.
    #[serde(default = "default_units")]
    pub units: Vec<String>,
    /// Prefix every `systemctl` call with `sudo`.
    #[serde(default)]
    pub use_sudo: bool,
    /// Program used to control the units.
    #[serde(default = "default_systemctl_path")]
    pub systemctl_path: String,
    /// Upper bound on a restart, in seconds.
    #[serde(default = "default_restart_timeout_secs")]
    pub restart_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_conf_path() -> PathBuf {
    PathBuf::from("/etc/samba/smb.conf")
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("/etc/samba/backups")
}
fn default_max_backups() -> usize {
    20
}
fn default_file_mode() -> String {
    "0644".to_string()
}
fn default_units() -> Vec<String> {
    vec!["smbd".to_string(), "nmbd".to_string()]
}
fn default_systemctl_path() -> String {
    "systemctl".to_string()
}
fn default_restart_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conf_path: default_conf_path(),
            backup_dir: default_backup_dir(),
            max_backups: default_max_backups(),
            file_mode: default_file_mode(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            units: default_units(),
            use_sudo: false,
            systemctl_path: default_systemctl_path(),
            restart_timeout_secs: default_restart_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl StorageConfig {
    /// Parses [`StorageConfig::file_mode`] as octal permission bits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the string is not octal or
    /// sets bits outside `0o7777`.
    pub fn file_mode_bits(&self) -> Result<u32, ConfigError> {
        let digits = self.file_mode.trim().trim_start_matches("0o");
        match u32::from_str_radix(digits, 8) {
            Ok(bits) if bits <= 0o7777 => Ok(bits),
            _ => Err(ConfigError::InvalidValue {
                field: "storage.file_mode",
                value: self.file_mode.clone(),
            }),
        }
    }
}

impl ServiceConfig {
    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the per-user directory for the settings file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Picks the settings file to use (see the module docs for the order).
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(dir) = config_dir() {
        let user_file = dir.join("config.toml");
        if user_file.is_file() {
            return user_file;
        }
    }
    PathBuf::from(SYSTEM_CONFIG_PATH)
}

/// Loads settings from `path`, returning `ManagerConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ManagerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ManagerConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ManagerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `$XDG_CONFIG_HOME/smbshare`, falling back to `~/.config/smbshare`.
fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("smbshare"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_points_at_system_samba_paths() {
        // Arrange / Act
        let cfg = ManagerConfig::default();

        // Assert
        assert_eq!(cfg.storage.conf_path, PathBuf::from("/etc/samba/smb.conf"));
        assert_eq!(cfg.storage.backup_dir, PathBuf::from("/etc/samba/backups"));
        assert_eq!(cfg.storage.max_backups, 20);
    }

    #[test]
    fn test_default_service_restarts_smbd_then_nmbd_without_sudo() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.units, vec!["smbd", "nmbd"]);
        assert!(!cfg.use_sudo);
        assert_eq!(cfg.restart_timeout(), Duration::from_secs(30));
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: ManagerConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, ManagerConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[storage]
max_backups = 5

[service]
use_sudo = true
"#;

        // Act
        let cfg: ManagerConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.storage.max_backups, 5);
        assert_eq!(cfg.storage.file_mode, "0644");
        assert!(cfg.service.use_sudo);
        assert_eq!(cfg.service.systemctl_path, "systemctl");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_file_mode_bits_parses_octal() {
        let mut storage = StorageConfig::default();
        assert_eq!(storage.file_mode_bits().unwrap(), 0o644);

        storage.file_mode = "0o600".to_string();
        assert_eq!(storage.file_mode_bits().unwrap(), 0o600);
    }

    #[test]
    fn test_file_mode_bits_rejects_non_octal() {
        let storage = StorageConfig {
            file_mode: "rw-r--r--".to_string(),
            ..StorageConfig::default()
        };

        let err = storage.file_mode_bits().unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "storage.file_mode",
                ..
            }
        ));
    }

    // ── Load / save ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let dir = TempDir::new().unwrap();

        let cfg = load_config(&dir.path().join("missing.toml")).unwrap();

        assert_eq!(cfg, ManagerConfig::default());
    }

    #[test]
    fn test_load_config_reports_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_and_load_config_round_trip() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = ManagerConfig::default();
        cfg.storage.conf_path = PathBuf::from("/srv/samba/smb.conf");
        cfg.service.units = vec!["samba".to_string()];
        cfg.logging.level = "debug".to_string();

        // Act
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_resolve_config_path_prefers_explicit_path() {
        let explicit = PathBuf::from("/tmp/custom.toml");
        assert_eq!(resolve_config_path(Some(&explicit)), explicit);
    }
}
