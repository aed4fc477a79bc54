//! Configuration management for ctb.
//!
//! Parses `ctb.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ```toml
//! [parser]
//! heading_attributes = true
//! tables = true
//! definition_lists = true
//! linkify = true
//!
//! [html]
//! smart_punctuation = true
//! heading_ids = true
//! external_links = true
//!
//! [markdown]
//! verbose_padding = false
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the padding debug counter.
    pub verbose_padding: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "ctb.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Parser extensions shared by both output modes.
    pub parser: ParserConfig,
    /// HTML output.
    pub html: HtmlConfig,
    /// Markdown output.
    pub markdown: MarkdownConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Parser extensions.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParserConfig {
    /// `{#id .class}` blocks after heading text.
    pub heading_attributes: bool,
    /// GFM pipe tables.
    pub tables: bool,
    /// Definition lists.
    pub definition_lists: bool,
    /// Autolink bare `http(s)://` URLs.
    pub linkify: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            heading_attributes: true,
            tables: true,
            definition_lists: true,
            linkify: true,
        }
    }
}

/// HTML output configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
    /// Curly quotes and dashes.
    pub smart_punctuation: bool,
    /// Generate heading anchors.
    pub heading_ids: bool,
    /// Open external links in a new tab without a referrer.
    pub external_links: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            smart_punctuation: true,
            heading_ids: true,
            external_links: true,
        }
    }
}

/// Markdown output configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Prefix padding with a running counter (debugging aid).
    pub verbose_padding: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `ctb.toml` in current directory and parents
    /// and falls back to defaults when none is found.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let discovered = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Some(path.to_path_buf())
            }
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| Self::discover_from(&cwd)),
        };

        let mut config = match discovered {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(verbose_padding) = settings.verbose_padding {
            self.markdown.verbose_padding = verbose_padding;
        }
    }

    /// Search for config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }
}
