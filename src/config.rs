//! # Configuration Module
//!
//! Runtime settings for the volume enforcer, stored as JSON in the
//! platform-standard configuration directory:
//!
//! - Linux: `~/.config/manelemax/config.json`
//! - macOS: `~/Library/Application Support/manelemax/config.json`
//! - Windows: `%APPDATA%\manelemax\config.json`
//!
//! Every field is optional; missing fields fall back to the built-in defaults.
//! The keyword list itself is not configurable.
//!
//! ```json
//! { "max_volume": 1.0, "normal_volume": 0.25, "max_words": 4 }
//! ```

use crate::controller::{MAX_VOLUME, NORMAL_VOLUME};
use crate::keywords::DEFAULT_MAX_WORDS;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate configuration file path.
///
/// The file itself is not created.
///
/// # Errors
///
/// Fails if the system configuration directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Please ensure your platform supports standard config directories."
        )
    })?;

    Ok(config_dir.join("manelemax").join("config.json"))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Volume for tracks matching a keyword
    pub max_volume: f32,
    /// Volume for every other playing track
    pub normal_volume: f32,
    /// Longest keyword phrase tried, in words (0 = no limit)
    pub max_words: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_volume: MAX_VOLUME,
            normal_volume: NORMAL_VOLUME,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// With an explicit `path` the file must exist. Without one the default
    /// location is used, and a missing file there means defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An explicit `path` does not exist or cannot be read
    /// - The file is not valid JSON for [`Config`]
    /// - A volume is out of range (see [`Config::validate`])
    /// - The platform config directory cannot be determined
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => {
                let default_path = get_config_path()?;
                if default_path.exists() {
                    Self::from_path(&default_path)
                } else {
                    debug!(
                        "No config at {}, using defaults",
                        default_path.display()
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reads and validates a JSON config file.
    ///
    /// Missing fields take their default values, so `{}` is a valid file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, does not parse, or does not pass
    /// [`Config::validate`]. The error names the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        debug!("Loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Checks the volume levels.
    ///
    /// Both volumes must be finite scalars in `[0, 1]`. `max_words` is not
    /// checked, every value is meaningful.
    ///
    /// # Errors
    ///
    /// The first out-of-range volume, by field name.
    ///
    /// # Examples
    ///
    /// ```
    /// use manelemax::config::Config;
    ///
    /// assert!(Config::default().validate().is_ok());
    ///
    /// let loud = Config { max_volume: 7.0, ..Config::default() };
    /// assert!(loud.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_volume", self.max_volume),
            ("normal_volume", self.normal_volume),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                bail!("{name} must be between 0.0 and 1.0, got {value}");
            }
        }
        Ok(())
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// The output is a valid config file and loads back to the same values.
    ///
    /// # Errors
    ///
    /// Only if serialization itself fails, which plain numeric fields never
    /// cause in practice.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }
}
