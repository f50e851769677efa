// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::engine::PostAction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub presets: PresetsConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Encoder executable, looked up on PATH when not absolute
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Extra arguments placed before every query (shell-style quoting)
    #[serde(default)]
    pub extra_args: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// Preset file; defaults to presets.dat in the config directory
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Start from the saved query instead of the "Normal" preset
    #[serde(default)]
    pub use_user_defaults: bool,

    /// Query saved with `hbctl defaults save`
    #[serde(default)]
    pub user_query: String,

    /// What to do once an encode finishes
    #[serde(default)]
    pub after_encode: PostAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_executable() -> String {
    "HandBrakeCLI".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            extra_args: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Directory holding config.toml and the default preset file
    pub fn config_dir() -> Result<PathBuf> {
        let base = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
        } else {
            dirs::config_dir().context("Could not determine config directory")?
        };
        Ok(base.join("hbctl"))
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Preset file in effect for this config
    pub fn presets_path(&self) -> Result<PathBuf> {
        match &self.presets.file {
            Some(file) => Ok(file.clone()),
            None => Ok(Self::config_dir()?.join("presets.dat")),
        }
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from `path`, or create a default there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            Ok(config)
        } else {
            let config = Config::default();

            // Not being able to write the default is not fatal
            if let Err(e) = config.save_to(path) {
                warn!("Could not create default config file: {:#}", e);
                warn!("Using built-in defaults. Run 'hbctl init-config' to create a config file.");
            }

            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Create a default config file at `path` if it doesn't exist.
    /// Returns whether a file was written.
    pub fn ensure_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Config::default().save_to(path)?;
        Ok(true)
    }
}
