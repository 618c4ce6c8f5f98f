//! Configuration file for the dclink CLI.

use dclink_core::ProfileSettings;
use dclink_core::settings::DEFAULT_NICK;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// dclink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Published profile
    #[serde(default = "default_profile")]
    pub profile: ProfileSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_profile() -> ProfileSettings {
    let mut profile = ProfileSettings::default();
    profile.set_nick(DEFAULT_NICK);
    profile
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            logging: LoggingConfig::default(),
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

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("dclink/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            tracing::debug!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be published or the log level
    /// is unknown.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.profile.validate()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}
