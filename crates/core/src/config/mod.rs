use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

use crate::paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved fixed paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long `verifyAuthentication` waits for the platform prompt
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Upper bound of the growable worker pool that runs command handlers
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStrategyKind {
    /// Probe whether rename works between the two roots
    #[default]
    Auto,
    /// Always rename
    Rename,
    /// Always copy then delete
    Copy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub strategy: MoveStrategyKind,

    /// Extra candidate data roots offered by `getExtendDirs`
    /// (external volumes on Android)
    #[serde(default)]
    pub extend_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_confirmation_timeout() -> u64 {
    300
}
fn default_max_blocking_threads() -> usize {
    512
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
            max_blocking_threads: default_max_blocking_threads(),
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

impl BridgeConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Config {
    /// Load (or create default) config rooted under `files_dir`.
    ///
    /// A config file that fails to parse is logged and replaced by defaults
    /// in memory; the file on disk is left untouched for the user to fix.
    pub fn load_from_dir(files_dir: &str) -> Result<Self> {
        let paths = Paths::from_root(files_dir);
        paths.ensure_dirs()?;
        let path = paths.config_file();

        if !path.exists() {
            let config = Config {
                paths,
                ..Config::default()
            };
            config.save_with_template()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&path)?;
        let mut config: Config = match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Config::default()
            }
        };
        config.paths = paths;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;

        Ok(())
    }

    /// Save config with a helpful template (for first-time setup)
    pub fn save_with_template(&self) -> Result<()> {
        let path = self.paths.config_file();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(())
    }
}

/// Default config template with helpful comments (used for first-time setup)
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# pic2acg core configuration
# Auto-created on first run. Edit as needed.

[bridge]
# Seconds verifyAuthentication waits for the platform prompt
confirmation_timeout_secs = 300
# Upper bound of the worker pool running command handlers
max_blocking_threads = 512

[storage]
# How migrate moves files: auto | rename | copy
strategy = "auto"
# Extra candidate data roots offered by getExtendDirs
extend_dirs = []

[logging]
level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_writes_template() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_str().unwrap();

        let config = Config::load_from_dir(dir).unwrap();
        assert!(temp.path().join("config.toml").exists());
        assert_eq!(config.bridge.confirmation_timeout_secs, 300);
        assert_eq!(config.storage.strategy, MoveStrategyKind::Auto);

        // The template itself must parse back to the defaults
        let reloaded = Config::load_from_dir(dir).unwrap();
        assert_eq!(reloaded.bridge.max_blocking_threads, 512);
        assert_eq!(reloaded.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            "[storage]\nstrategy = \"copy\"\nextend_dirs = [\"/mnt/sdcard/app\"]\n",
        )
        .unwrap();

        let config = Config::load_from_dir(temp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.storage.strategy, MoveStrategyKind::Copy);
        assert_eq!(config.storage.extend_dirs, vec!["/mnt/sdcard/app"]);
        assert_eq!(config.bridge.confirmation_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "[bridge\nnot toml").unwrap();

        let config = Config::load_from_dir(temp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.bridge.confirmation_timeout_secs, 300);
        assert_eq!(config.paths.files_dir, temp.path());
    }

    #[test]
    fn test_save_round_trips_changes() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_str().unwrap();

        let mut config = Config::load_from_dir(dir).unwrap();
        config.bridge.confirmation_timeout_secs = 30;
        config.save().unwrap();

        let reloaded = Config::load_from_dir(dir).unwrap();
        assert_eq!(reloaded.bridge.confirmation_timeout_secs, 30);
    }
}
