use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::DEFAULT_MAX_PAGES;
use crate::error::{AppError, AppResult};
use crate::highlight::{DEFAULT_LINE_TOLERANCE, OffsetHighlighter};

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub highlight: HighlightConfig,
    pub cache: CacheConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HighlightConfig {
    pub line_tolerance: f64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            line_tolerance: DEFAULT_LINE_TOLERANCE,
        }
    }
}

impl HighlightConfig {
    pub fn highlighter(&self) -> OffsetHighlighter {
        OffsetHighlighter::new(self.line_tolerance)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub max_pages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub scale: f64,
    pub fill: String,
    pub opacity: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            fill: "#ffff00".to_string(),
            opacity: 0.3,
        }
    }
}

impl Config {
    pub fn load() -> AppResult<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        if !path.is_file() {
            return Err(AppError::invalid_argument(format!(
                "config path is not a regular file: {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read config: {}", path.display()))
        })?;
        let parsed = toml::from_str::<Self>(&raw).map_err(|source| {
            AppError::invalid_argument(format!(
                "failed to parse config {}: {source}",
                path.display()
            ))
        })?;
        Ok(parsed.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if !self.highlight.line_tolerance.is_finite() || self.highlight.line_tolerance < 0.0 {
            self.highlight.line_tolerance = DEFAULT_LINE_TOLERANCE;
        }
        self.cache.max_pages = self.cache.max_pages.max(1);
        if !self.overlay.scale.is_finite() || self.overlay.scale <= 0.0 {
            self.overlay.scale = OverlayConfig::default().scale;
        }
        if !self.overlay.opacity.is_finite() {
            self.overlay.opacity = OverlayConfig::default().opacity;
        }
        self.overlay.opacity = self.overlay.opacity.clamp(0.0, 1.0);
        if self.overlay.fill.trim().is_empty() {
            self.overlay.fill = OverlayConfig::default().fill;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("PCO_CONFIG_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("pco").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".config")
                .join("pco")
                .join("config.toml"),
        );
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("pco").join("config.toml"));
    }
    None
}
