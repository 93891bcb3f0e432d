//! Locating and managing the config file

use crate::{store, Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = "config.toml";

/// Entry point used by the CLI and embedders
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory, e.g. `~/.config/mediasync/` on Linux
    /// or `~/Library/Application Support/mediasync/` on macOS
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "mediasync").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_directory(dirs.config_dir().to_path_buf()))
    }

    pub fn with_directory(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join(FILE_NAME);
        Self {
            config_dir,
            config_path,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> ConfigResult<Config> {
        store::read(&self.config_path)
    }

    /// Like `load`, but an unreadable file yields the defaults
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_else(|e| {
            log::warn!("{}; using default timings", e);
            Config::default()
        })
    }

    /// `load` followed by the process's `MEDIASYNC_*` variables
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        config.apply_env(|key| std::env::var(key).ok());
        for problem in config.problems() {
            log::warn!("After environment overrides: {}", problem);
        }
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        store::write(&self.config_path, config)
    }

    /// Loads, edits and saves in one step
    pub fn update<F>(&self, edit: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        edit(&mut config);
        self.save(&config)
    }

    /// Writes the defaults unless a file already exists; returns whether it wrote
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save(&Config::default())?;
        Ok(true)
    }

    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Reads the file and describes every broken rule
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        Ok(self
            .load()?
            .problems()
            .iter()
            .map(ToString::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_directory(dir.path().to_path_buf());
        (dir, manager)
    }

    #[test]
    fn test_paths() {
        let (dir, manager) = manager();
        assert_eq!(manager.config_dir(), dir.path());
        assert_eq!(manager.config_path(), dir.path().join("config.toml"));
    }

    #[test]
    fn test_initialize_only_once() {
        let (_dir, manager) = manager();
        assert!(manager.initialize().unwrap());
        assert!(!manager.initialize().unwrap());
    }

    #[test]
    fn test_update_persists_edit() {
        let (_dir, manager) = manager();
        manager
            .update(|config| config.logging.level = LogLevel::Trace)
            .unwrap();
        assert_eq!(manager.load().unwrap().logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_update_refuses_breaking_a_rule() {
        let (_dir, manager) = manager();
        manager.initialize().unwrap();

        let result = manager.update(|config| config.sync.heartbeat_interval_ms = 0);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (_dir, manager) = manager();
        manager
            .update(|config| config.sync.tolerance_widening_ms = 99)
            .unwrap();
        manager.reset().unwrap();
        assert_eq!(manager.load().unwrap(), Config::default());
    }

    #[test]
    fn test_load_or_default_survives_corruption() {
        let (_dir, manager) = manager();
        std::fs::write(manager.config_path(), "[sync\nbroken").unwrap();
        assert!(manager.load().is_err());
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_env_overrides_from_process() {
        let (_dir, manager) = manager();
        std::env::set_var("MEDIASYNC_SYNC_HEARTBEAT_INTERVAL_MS", "2500");
        let config = manager.load_with_env_overrides().unwrap();
        std::env::remove_var("MEDIASYNC_SYNC_HEARTBEAT_INTERVAL_MS");

        assert_eq!(config.sync.heartbeat_interval_ms, 2_500);
    }
}
