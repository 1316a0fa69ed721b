use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_STATE_ROOT_DIR: &str = ".smartreply";
pub const SETTINGS_FILE_NAME: &str = "config.yaml";

pub const MIN_REPLY_COUNT: u8 = 1;
pub const MAX_REPLY_COUNT: u8 = 5;

const DEFAULT_PACING_DELAY_MS: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("failed to create state path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve home directory for state root")]
    HomeDirectoryUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn app_log_path(&self) -> PathBuf {
        self.root.join("logs/smartreply.log")
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.root.join("logs")]
    }
}

pub fn default_state_root_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(DEFAULT_STATE_ROOT_DIR))
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), ConfigError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    #[serde(default)]
    pub default_webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            pacing_delay_ms: default_pacing_delay_ms(),
            default_webhook_url: None,
        }
    }
}

fn default_model() -> String {
    crate::gemini::DEFAULT_MODEL.to_string()
}

fn default_pacing_delay_ms() -> u64 {
    DEFAULT_PACING_DELAY_MS
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Settings("model must not be empty".to_string()));
        }
        Ok(())
    }
}

pub fn load_settings(paths: &StatePaths) -> Result<Settings, ConfigError> {
    let path = paths.settings_file();
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings: Settings = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_use_flash_model_and_half_second_pacing() {
        let settings = Settings::default();
        assert_eq!(settings.model, "gemini-2.5-flash");
        assert_eq!(settings.pacing_delay_ms, 500);
        assert!(settings.default_webhook_url.is_none());
    }

    #[test]
    fn blank_model_is_rejected() {
        let settings = Settings {
            model: "  ".to_string(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Settings(_))));
    }

    #[test]
    fn state_paths_expose_log_and_settings_locations() {
        let paths = StatePaths::new("/tmp/state");
        assert_eq!(
            paths.settings_file(),
            PathBuf::from("/tmp/state/config.yaml")
        );
        assert_eq!(
            paths.app_log_path(),
            PathBuf::from("/tmp/state/logs/smartreply.log")
        );
    }
}
