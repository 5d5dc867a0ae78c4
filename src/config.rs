/// Configuration management for cloudcfg
///
/// cloudcfg stores configuration in ~/.cloudcfg/config.toml

use crate::mountlist::{StaleBackupPolicy, UpdateOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory holding the handlers, the mountlist and the credential files
pub const DEFAULT_CLOUD_DIR: &str = "Devs:Cloud";

/// Mountlist file name inside the cloud directory
pub const DEFAULT_MOUNTLIST: &str = "cloud.mountlist";

/// cloudcfg configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the cloud handler files live
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Mountlist update behaviour
    #[serde(default)]
    pub mountlist: MountlistConfig,

    /// Diagnostic logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Cloud directory
    #[serde(default = "default_dir")]
    pub dir: Option<String>,

    /// Mountlist file name within the cloud directory
    #[serde(default = "default_mountlist")]
    pub mountlist: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            mountlist: default_mountlist(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountlistConfig {
    /// What to do with a backup left by an interrupted run: "clear" or "abort"
    #[serde(default = "default_stale_backup")]
    pub stale_backup: Option<StaleBackupPolicy>,

    /// Check free space before staging the rewritten mountlist
    #[serde(default = "default_check_disk_space")]
    pub check_disk_space: Option<bool>,
}

impl Default for MountlistConfig {
    fn default() -> Self {
        Self {
            stale_backup: default_stale_backup(),
            check_disk_space: default_check_disk_space(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write debug logs to ~/.cloudcfg/cloudcfg.log
    #[serde(default = "default_debug")]
    pub debug: Option<bool>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: default_debug(),
        }
    }
}

// Default functions for serde
fn default_dir() -> Option<String> { Some(DEFAULT_CLOUD_DIR.to_string()) }
fn default_mountlist() -> Option<String> { Some(DEFAULT_MOUNTLIST.to_string()) }
fn default_stale_backup() -> Option<StaleBackupPolicy> { Some(StaleBackupPolicy::Clear) }
fn default_check_disk_space() -> Option<bool> { Some(true) }
fn default_debug() -> Option<bool> { Some(false) }

impl Config {
    pub fn cloud_dir(&self) -> PathBuf {
        PathBuf::from(self.cloud.dir.as_deref().unwrap_or(DEFAULT_CLOUD_DIR))
    }

    pub fn mountlist_name(&self) -> &str {
        self.cloud.mountlist.as_deref().unwrap_or(DEFAULT_MOUNTLIST)
    }

    pub fn mountlist_path(&self) -> PathBuf {
        self.cloud_dir().join(self.mountlist_name())
    }

    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            stale_backup: self.mountlist.stale_backup.unwrap_or_default(),
            check_disk_space: self.mountlist.check_disk_space.unwrap_or(true),
        }
    }

    pub fn debug_logging(&self) -> bool {
        self.logging.debug.unwrap_or(false)
    }
}

/// Directory for cloudcfg's own files (~/.cloudcfg)
pub fn app_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home_dir.join(".cloudcfg"))
}

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    let config_dir = app_dir()?;
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    Ok(config_dir.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# cloudcfg Configuration File
#
# Values set here can be overridden by command-line flags.

[cloud]
# Directory holding the handlers, the mountlist and the credential files
dir = "Devs:Cloud"

# Mountlist file name inside the cloud directory
mountlist = "cloud.mountlist"

[mountlist]
# What to do when a backup from an interrupted update is found:
# "clear" - log a warning, delete it and carry on (the live mountlist is intact)
# "abort" - refuse to update until the backup has been inspected and removed
stale_backup = "clear"

# Refuse to update when the volume cannot hold a second copy of the mountlist
check_disk_space = true

[logging]
# Write debug logs to ~/.cloudcfg/cloudcfg.log
debug = false
"#
}

/// Write the default commented configuration file to `path`
pub fn save_default_config_to(path: &Path) -> Result<()> {
    fs::write(path, get_default_config_content())
        .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

    Ok(())
}

/// Load configuration from the default location, creating it if needed
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file_path()?)
}

/// Load configuration from `path`
///
/// If the file doesn't exist, creates it with defaults and returns them.
/// If the file is malformed, recreates it with defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        save_default_config_to(path)?;
    }

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = match toml::from_str(&config_str) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed config, restoring defaults");
            save_default_config_to(path)?;
            return Ok(Config::default());
        }
    };

    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(dir) = &config.cloud.dir {
        if dir.trim().is_empty() {
            anyhow::bail!("Invalid dir: must not be empty");
        }
    }

    if let Some(name) = &config.cloud.mountlist {
        if name.trim().is_empty() {
            anyhow::bail!("Invalid mountlist: must not be empty");
        }
        if name.contains('/') || name.contains('\\') || name.contains(':') {
            anyhow::bail!(
                "Invalid mountlist: {} (must be a file name inside the cloud directory)",
                name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cloud.dir, Some("Devs:Cloud".to_string()));
        assert_eq!(config.cloud.mountlist, Some("cloud.mountlist".to_string()));
        assert_eq!(config.mountlist.stale_backup, Some(StaleBackupPolicy::Clear));
        assert_eq!(config.mountlist.check_disk_space, Some(true));
        assert!(!config.debug_logging());
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(get_default_config_content()).unwrap();
        assert_eq!(config.cloud_dir(), PathBuf::from("Devs:Cloud"));
        assert_eq!(config.update_options(), UpdateOptions::default());
    }

    #[test]
    fn test_mountlist_path() {
        let mut config = Config::default();
        config.cloud.dir = Some("/amiga/Devs/Cloud".to_string());
        assert_eq!(
            config.mountlist_path(),
            PathBuf::from("/amiga/Devs/Cloud/cloud.mountlist")
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[mountlist]\nstale_backup = \"abort\"\n").unwrap();
        assert_eq!(config.update_options().stale_backup, StaleBackupPolicy::Abort);
        assert!(config.update_options().check_disk_space);
        assert_eq!(config.cloud.mountlist, Some("cloud.mountlist".to_string()));
    }

    #[test]
    fn test_load_config_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.cloud_dir(), PathBuf::from("Devs:Cloud"));
    }

    #[test]
    fn test_load_config_recreates_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[mountlist\nstale_backup = 3").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.update_options(), UpdateOptions::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), get_default_config_content());
    }

    #[test]
    fn test_validate_config_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_config_rejects_mountlist_path() {
        let mut config = Config::default();
        config.cloud.mountlist = Some("sub/cloud.mountlist".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[cloud]"));
        assert!(toml_str.contains("[mountlist]"));
        assert!(toml_str.contains("stale_backup = \"clear\""));
    }
}
