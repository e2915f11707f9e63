//! Configuration file loading.
//!
//! Search order:
//! 1. Explicit path if provided
//! 2. `flowsvg.toml` in the working directory
//! 3. Built-in defaults
//!
//! Files ending in `.yaml`/`.yml` are read as YAML, everything else as TOML.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FlowsvgError;
use crate::mermaid::RenderOptions;
use crate::mermaid::layout::DEFAULT_CANVAS_WIDTH;

pub const LOCAL_CONFIG: &str = "flowsvg.toml";

const WRAPPER_CLASS: &str = "mermaid-converted";
const WRAPPER_STYLE: &str = "margin: 20px 0; padding: 15px; background: #f8f9fa; border-radius: 8px; border: 1px solid #dee2e6;";
const CAPTION: &str = "Diagram";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Class of the `<div>` wrapped around each converted diagram.
    #[serde(default = "default_wrapper_class")]
    pub wrapper_class: String,
    #[serde(default = "default_wrapper_style")]
    pub wrapper_style: String,
    /// Small heading above each diagram; empty disables it.
    #[serde(default = "default_caption")]
    pub caption: String,
    /// Drop the view-time diagram scripts once every block is static.
    #[serde(default = "default_remove_scripts")]
    pub remove_scripts: bool,
}

fn default_canvas_width() -> f32 {
    DEFAULT_CANVAS_WIDTH
}
fn default_wrapper_class() -> String {
    WRAPPER_CLASS.to_string()
}
fn default_wrapper_style() -> String {
    WRAPPER_STYLE.to_string()
}
fn default_caption() -> String {
    CAPTION.to_string()
}
fn default_remove_scripts() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_width: default_canvas_width(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            wrapper_class: default_wrapper_class(),
            wrapper_style: default_wrapper_style(),
            caption: default_caption(),
            remove_scripts: default_remove_scripts(),
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            canvas_width: self.canvas_width,
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        // An empty YAML document means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let width = self.render.canvas_width;
        if !width.is_finite() || width <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "render.canvas_width must be a positive number, got {width}"
            )));
        }
        if self
            .host
            .wrapper_class
            .chars()
            .any(|c| c == '"' || c == '<' || c == '>')
        {
            return Err(ConfigError::Validation(
                "host.wrapper_class may not contain quotes or angle brackets".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Find and load configuration.
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed or fails validation
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, FlowsvgError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new(LOCAL_CONFIG);
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    debug!("No configuration file found, using default configuration");
    Ok(AppConfig::default())
}

fn load_config_file(path: &Path) -> Result<AppConfig, FlowsvgError> {
    if !path.is_file() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let parsed = if is_yaml {
        AppConfig::from_yaml(&content)
    } else {
        AppConfig::from_toml(&content)
    };
    let config = parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    Ok(config.validate()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowsvg-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.render.canvas_width, 800.0);
        assert_eq!(config.host.wrapper_class, "mermaid-converted");
        assert!(config.host.remove_scripts);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml("[host]\nremove_scripts = false\n").unwrap();
        assert!(!config.host.remove_scripts);
        assert_eq!(config.host.caption, "Diagram");
        assert_eq!(config.render.canvas_width, 800.0);
    }

    #[test]
    fn yaml_is_accepted() {
        let config = AppConfig::from_yaml("render:\n  canvas_width: 1024\n").unwrap();
        assert_eq!(config.render.canvas_width, 1024.0);
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn load_prefers_explicit_path() {
        let path = temp_file("explicit.toml", "[render]\ncanvas_width = 640\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.render.options().canvas_width, 640.0);
    }

    #[test]
    fn load_reads_yaml_by_extension() {
        let path = temp_file("explicit.yml", "host:\n  caption: ''\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.host.caption, "");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(
            err,
            FlowsvgError::Config(ConfigError::MissingFile(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = temp_file("negative.toml", "[render]\ncanvas_width = -3.0\n");
        assert!(matches!(
            load_config(Some(&path)).unwrap_err(),
            FlowsvgError::Config(ConfigError::Validation(_))
        ));

        let path = temp_file("broken.toml", "[render\n");
        assert!(matches!(
            load_config(Some(&path)).unwrap_err(),
            FlowsvgError::Config(ConfigError::Parse { .. })
        ));
    }
}
