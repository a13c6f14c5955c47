//! Configuration for the pipeline generator
//!
//! [`GeneratorConfig`] controls the parts of generated units that are not
//! derived from the pipeline graph: indentation, the name of the run
//! function, and the module metadata defaults (categories, contributors,
//! help and acknowledgement text).
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory:
//! - **Linux**: `~/.config/dev.pipeline-creator/generator.toml`
//! - **macOS**: `~/Library/Application Support/dev.pipeline-creator/generator.toml`
//! - **Windows**: `%APPDATA%\dev.pipeline-creator\generator.toml`
//!
//! Missing keys fall back to their defaults, so a partial file is valid.
//!
//! # Example
//!
//! ```ignore
//! use pipeline_creator::config::GeneratorConfig;
//!
//! let mut config = GeneratorConfig::load_or_default(GeneratorConfig::default_path()?);
//! config.indent_width = 2;
//! config.save("generator.toml")?;
//! ```

use crate::error::{CreatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.pipeline-creator";

/// Config filename
pub const CONFIG_FILE: &str = "generator.toml";

/// Default extension of generated pipeline units
pub const UNIT_EXTENSION: &str = "rhai";

/// Name of the generated run function
pub const DEFAULT_RUN_FUNCTION: &str = "run";

/// The generator's own name, always listed as a dependency of generated units
pub const DEFAULT_GENERATOR_NAME: &str = "PipelineCreator";

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

fn default_indent_width() -> usize {
    4
}

fn default_run_function_name() -> String {
    DEFAULT_RUN_FUNCTION.to_string()
}

fn default_file_extension() -> String {
    UNIT_EXTENSION.to_string()
}

fn default_generator_name() -> String {
    DEFAULT_GENERATOR_NAME.to_string()
}

fn default_categories() -> Vec<String> {
    vec!["PipelineModules".to_string()]
}

fn default_contributors() -> Vec<String> {
    vec![DEFAULT_GENERATOR_NAME.to_string()]
}

fn default_help_text() -> String {
    "This module was created by the pipeline creator.".to_string()
}

fn default_acknowledgement_text() -> String {
    "This module was generated automatically from a pipeline graph.".to_string()
}

fn default_icon_subdirectory() -> PathBuf {
    PathBuf::from("Resources").join("Icons")
}

/// Settings applied to every generated unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Spaces per indentation level
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,

    #[serde(default = "default_run_function_name")]
    pub run_function_name: String,

    /// Extension of written units, without the dot
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    #[serde(default = "default_generator_name")]
    pub generator_name: String,

    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    #[serde(default = "default_contributors")]
    pub contributors: Vec<String>,

    #[serde(default = "default_help_text")]
    pub help_text: String,

    #[serde(default = "default_acknowledgement_text")]
    pub acknowledgement_text: String,

    /// Where icons are copied, relative to the output directory
    #[serde(default = "default_icon_subdirectory")]
    pub icon_subdirectory: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            indent_width: default_indent_width(),
            run_function_name: default_run_function_name(),
            file_extension: default_file_extension(),
            generator_name: default_generator_name(),
            categories: default_categories(),
            contributors: default_contributors(),
            help_text: default_help_text(),
            acknowledgement_text: default_acknowledgement_text(),
            icon_subdirectory: default_icon_subdirectory(),
        }
    }
}

impl GeneratorConfig {
    /// One level of indentation
    pub fn tab(&self) -> String {
        " ".repeat(self.indent_width)
    }

    /// The default config file location
    pub fn default_path() -> Result<PathBuf> {
        default_config_path()
            .ok_or_else(|| CreatorError::Config("Could not determine config directory".to_string()))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CreatorError::Config(format!("Failed to read config {:?}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| CreatorError::Config(format!("Failed to parse config {:?}: {}", path, e)))
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load generator config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CreatorError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CreatorError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CreatorError::Config(format!("Failed to write config {:?}: {}", path, e)))
    }
}
