use crate::models::Settings;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;
use thiserror::Error;

/// Where the configuration lives when nothing else is specified.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pideck/config.yaml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "PIDECK_CONFIG";

/// Prefix for per-key overrides, e.g. `PIDECK__VLC__VOLUME=70`.
pub const ENV_PREFIX: &str = "PIDECK";

/// Errors that abort startup while loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {source}")]
    Load {
        path: Utf8PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Invalid configuration value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to write configuration to {path}: {reason}")]
    Write { path: Utf8PathBuf, reason: String },
}

/// Configuration manager for the YAML settings file.
///
/// Sources are layered with the `config` crate, later ones winning:
/// - Built-in defaults (`#[serde(default)]` on every [`Settings`] section)
/// - The YAML file, if it exists
/// - Environment variables `PIDECK__<SECTION>__<KEY>`
///
/// The result is validated once; after startup the settings are read-only.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a ConfigManager for the given file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the YAML file (it does not need to exist)
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Resolve the configuration path from `PIDECK_CONFIG`, falling back to
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    /// Use a different prefix for environment overrides.
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load and validate the settings.
    ///
    /// # Returns
    /// The merged [`Settings`], or defaults (plus env overrides) if the file doesn't exist
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        if self.config_path.exists() {
            builder = builder.add_source(
                File::new(self.config_path.as_str(), FileFormat::Yaml).required(true),
            );
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|source| ConfigError::Load {
                path: self.config_path.clone(),
                source,
            })?;

        settings.validate()?;

        tracing::info!("Loaded settings from {}", self.config_path);
        Ok(settings)
    }

    /// Save the settings as YAML, creating the parent directory if needed.
    ///
    /// # Arguments
    /// * `settings` - The Settings to save
    pub fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::Write {
            path: self.config_path.clone(),
            reason,
        };

        let yaml_string = serde_yaml_ng::to_string(settings)
            .map_err(|e| write_error(format!("Failed to serialize settings to YAML: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
            }
        }

        fs::write(&self.config_path, yaml_string).map_err(|e| write_error(e.to_string()))?;

        tracing::info!("Saved settings to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager =
            ConfigManager::new(dir.join("config.yaml")).with_env_prefix("PIDECK_UNIT_TEST");
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let settings = manager.load_settings().unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_settings() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut settings = Settings::default();
        settings.vlc.volume = 80;
        settings.screen.rotation = 90;
        manager.save_settings(&settings).unwrap();

        let loaded = manager.load_settings().unwrap();
        assert_eq!(loaded.vlc.volume, 80);
        assert_eq!(loaded.screen.rotation, 90);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "vlc:\n  autoplay: true\n").unwrap();

        let settings = manager.load_settings().unwrap();
        assert!(settings.vlc.autoplay);
        assert_eq!(settings.vlc.volume, 50);
        assert_eq!(settings.screen.width, 240);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "screen:\n  width: wide\n").unwrap();

        let err = manager.load_settings().unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
