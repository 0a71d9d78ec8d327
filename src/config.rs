//! Site configuration module.
//!
//! Handles loading, validating, and merging `folio.toml`. Stock defaults are
//! overridden by the values in the user's file; every key is optional.
//!
//! ## Config File Location
//!
//! `folio.toml` lives in the site root next to the document and the image
//! directories. `--config` points at a different file.
//!
//! ```text
//! site/
//! ├── folio.toml
//! ├── albums.json
//! ├── albums/       # source images, one directory per album
//! ├── thumbnails/   # generated
//! └── full/         # generated
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [analysis]
//! enabled = false
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config filename in the site root.
pub const CONFIG_FILENAME: &str = "folio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `folio.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Document filename, relative to the site root.
    pub document: String,
    pub paths: PathsConfig,
    pub images: ImagesConfig,
    pub analysis: AnalysisConfig,
    pub processing: ProcessingConfig,
    pub sync: SyncConfig,
    pub layout: LayoutSettings,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            document: "albums.json".to_string(),
            paths: PathsConfig::default(),
            images: ImagesConfig::default(),
            analysis: AnalysisConfig::default(),
            processing: ProcessingConfig::default(),
            sync: SyncConfig::default(),
            layout: LayoutSettings::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document.trim().is_empty() {
            return Err(ConfigError::Validation("document must not be empty".into()));
        }
        let dirs = [&self.paths.albums, &self.paths.thumbnails, &self.paths.full];
        if dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "paths.albums, paths.thumbnails and paths.full must not be empty".into(),
            ));
        }
        if self.paths.albums == self.paths.thumbnails || self.paths.albums == self.paths.full {
            return Err(ConfigError::Validation(
                "generated image directories must differ from paths.albums".into(),
            ));
        }
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.thumbnail_width == 0 || self.images.full_width == 0 {
            return Err(ConfigError::Validation(
                "images.thumbnail_width and images.full_width must be non-zero".into(),
            ));
        }
        if self.analysis.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "analysis.timeout_secs must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sync.similarity_threshold) {
            return Err(ConfigError::Validation(
                "sync.similarity_threshold must be between 0 and 1".into(),
            ));
        }
        let layout = &self.layout;
        if layout.column_target_width <= 0.0 || layout.gutter < 0.0 {
            return Err(ConfigError::Validation(
                "layout.column_target_width must be positive and layout.gutter non-negative"
                    .into(),
            ));
        }
        if layout.min_item_height > layout.max_item_height {
            return Err(ConfigError::Validation(
                "layout.min_item_height must not exceed layout.max_item_height".into(),
            ));
        }
        Ok(())
    }
}

/// Directory names, relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Source images: `<albums>/<album-key>/<file>`.
    pub albums: String,
    /// Generated thumbnails: `<thumbnails>/<album-key>/<photo-id>.<ext>`.
    pub thumbnails: String,
    /// Generated full-size images: `<full>/<album-key>/<photo-id>.<ext>`.
    pub full: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            albums: "albums".to_string(),
            thumbnails: "thumbnails".to_string(),
            full: "full".to_string(),
        }
    }
}

/// Derived image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Maximum thumbnail width in pixels. Smaller sources are not upscaled.
    pub thumbnail_width: u32,
    /// Maximum full-size width in pixels.
    pub full_width: u32,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    /// Output encoding for both variants.
    pub format: OutputFormat,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: 600,
            full_width: 2000,
            quality: 85,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Scene analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Run alt-text and tag generation during import.
    pub enabled: bool,
    /// Base URL of an Ollama-compatible server.
    pub endpoint: String,
    /// Vision model name.
    pub model: String,
    /// Upper bound on a single analysis request.
    pub timeout_secs: u64,
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of photos processed at once.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: Some(4),
        }
    }
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.min(cores))
        .unwrap_or(cores)
        .max(1)
}

/// Rename detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Word overlap an old key and a new directory name must exceed to be
    /// treated as a rename.
    pub similarity_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

/// Masonry grid settings, in CSS pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSettings {
    pub column_target_width: f64,
    pub gutter: f64,
    /// Landscape items span two columns at or above this viewport width.
    pub desktop_breakpoint: f64,
    pub min_item_height: f64,
    pub max_item_height: f64,
    /// Height used until an item's natural size is known.
    pub default_item_height: f64,
    pub resize_debounce_ms: u64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            column_target_width: 300.0,
            gutter: 16.0,
            desktop_breakpoint: 769.0,
            min_item_height: 150.0,
            max_item_height: 600.0,
            default_item_height: 250.0,
            resize_debounce_ms: 250,
        }
    }
}

/// Absolute locations of everything the pipeline touches.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePaths {
    pub root: PathBuf,
    pub document: PathBuf,
    pub albums: PathBuf,
    pub thumbnails: PathBuf,
    pub full: PathBuf,
    /// Directory names as they appear in document paths.
    pub thumbnails_rel: String,
    pub full_rel: String,
}

impl SitePaths {
    pub fn new(root: &Path, config: &SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            document: root.join(&config.document),
            albums: root.join(&config.paths.albums),
            thumbnails: root.join(&config.paths.thumbnails),
            full: root.join(&config.paths.full),
            thumbnails_rel: config.paths.thumbnails.trim_matches('/').to_string(),
            full_rel: config.paths.full.trim_matches('/').to_string(),
        }
    }

    /// Source directory of one album.
    pub fn album_dir(&self, key: &str) -> PathBuf {
        self.albums.join(key)
    }

    /// Resolve a document-relative path against the site root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// Whether a resolved path lies inside a generated image directory.
    /// Cleanup only deletes files for which this holds.
    pub fn is_derived(&self, path: &Path) -> bool {
        let inside = |dir: &Path| {
            path.strip_prefix(dir)
                .is_ok_and(|rest| !rest.as_os_str().is_empty())
        };
        let in_source = path.starts_with(&self.albums);
        !in_source && (inside(&self.thumbnails) || inside(&self.full))
            && !path.components().any(|c| c == std::path::Component::ParentDir)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `folio.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# folio configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Photo document served to the browser, relative to the site root.
document = "albums.json"

# ---------------------------------------------------------------------------
# Directories (relative to the site root)
# ---------------------------------------------------------------------------
[paths]
# Source images, one directory per album. Never modified.
albums = "albums"
# Generated variants: <dir>/<album-key>/<photo-id>.<ext>
thumbnails = "thumbnails"
full = "full"

# ---------------------------------------------------------------------------
# Generated images
# ---------------------------------------------------------------------------
[images]
# Maximum widths in pixels. Smaller sources are never upscaled.
thumbnail_width = 600
full_width = 2000
# Lossy encoding quality (1 = worst, 100 = best).
quality = 85
# "jpeg", "png" or "webp" (webp output is lossless).
format = "jpeg"

# ---------------------------------------------------------------------------
# Scene analysis (alt text and tags)
# ---------------------------------------------------------------------------
[analysis]
# Disable here or per run with `folio import --no-ai`.
enabled = true
# Ollama-compatible server and vision model.
endpoint = "http://localhost:11434"
model = "llava"
# A request taking longer than this falls back to default alt text.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Photos processed at once during import (clamped to the CPU count).
max_processes = 4

# ---------------------------------------------------------------------------
# Rename detection
# ---------------------------------------------------------------------------
[sync]
# Share of significant words an old album key and a new directory name must
# exceed before sync treats the directory as a rename.
similarity_threshold = 0.5

# ---------------------------------------------------------------------------
# Masonry layout (CSS pixels)
# ---------------------------------------------------------------------------
[layout]
column_target_width = 300.0
gutter = 16.0
# Landscape photos span two columns at or above this viewport width.
desktop_breakpoint = 769.0
min_item_height = 150.0
max_item_height = 600.0
# Height used until a photo's natural size is known.
default_item_height = 250.0
resize_debounce_ms = 250
"##
}
