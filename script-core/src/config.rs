//! Runtime configuration.
//!
//! Every component receives its directories from here instead of reading
//! process-wide constants, so tests can point a whole pipeline at a
//! temporary directory.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        var: &'static str,
        value: String,
    },
}

/// Configuration for a living-script workspace.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Root holding `scenes/` and `characters/`.
    pub scripts_dir: PathBuf,

    /// Root holding `versions/`.
    pub data_dir: PathBuf,

    /// Model id passed to the client (client default when `None`).
    pub model: Option<String>,

    /// Maximum tokens for one generation.
    pub max_tokens: usize,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Extra instructions appended to every prompt.
    pub custom_instructions: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            data_dir: PathBuf::from("data"),
            model: None,
            max_tokens: 1024,
            temperature: Some(0.7),
            custom_instructions: None,
        }
    }
}

impl ScriptConfig {
    /// Configuration rooted at `root`, using `root/scripts` and `root/data`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            scripts_dir: root.join("scripts"),
            data_dir: root.join("data"),
            ..Self::default()
        }
    }

    /// Build from `LIVING_SCRIPT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("LIVING_SCRIPT_SCRIPTS_DIR") {
            config.scripts_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("LIVING_SCRIPT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var("LIVING_SCRIPT_MODEL") {
            if !model.trim().is_empty() {
                config.model = Some(model);
            }
        }
        if let Ok(value) = std::env::var("LIVING_SCRIPT_MAX_TOKENS") {
            config.max_tokens = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "LIVING_SCRIPT_MAX_TOKENS",
                value,
            })?;
        }
        if let Ok(value) = std::env::var("LIVING_SCRIPT_TEMPERATURE") {
            let temperature: f32 =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    var: "LIVING_SCRIPT_TEMPERATURE",
                    value: value.clone(),
                })?;
            config.temperature = Some(temperature);
        }

        Ok(config)
    }

    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn scenes_dir(&self) -> PathBuf {
        self.scripts_dir.join("scenes")
    }

    pub fn characters_dir(&self) -> PathBuf {
        self.scripts_dir.join("characters")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }
}
