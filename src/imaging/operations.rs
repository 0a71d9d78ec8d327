//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_within_width;
use super::params::{OutputFormat, Quality, ResizeParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Settings for one derived variant (thumbnail or full-size).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantConfig {
    pub max_width: u32,
    pub quality: Quality,
    pub format: OutputFormat,
}

/// A written variant: its filename inside the output directory and its pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVariant {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Plan a variant without executing it.
pub fn plan_variant(
    source: &Path,
    output_dir: &Path,
    photo_id: &str,
    original_dims: (u32, u32),
    config: &VariantConfig,
) -> ResizeParams {
    let (width, height) = fit_within_width(original_dims, config.max_width);
    ResizeParams {
        source: source.to_path_buf(),
        output: output_dir.join(format!("{}.{}", photo_id, config.format.extension())),
        width,
        height,
        quality: config.quality,
        format: config.format,
    }
}

/// Create one derived variant at `<output_dir>/<photo_id>.<ext>`.
pub fn create_variant(
    backend: &impl ImageBackend,
    source: &Path,
    output_dir: &Path,
    photo_id: &str,
    original_dims: (u32, u32),
    config: &VariantConfig,
) -> Result<GeneratedVariant> {
    std::fs::create_dir_all(output_dir)?;
    let params = plan_variant(source, output_dir, photo_id, original_dims, config);
    backend.resize(&params)?;

    Ok(GeneratedVariant {
        filename: format!("{}.{}", photo_id, config.format.extension()),
        width: params.width,
        height: params.height,
    })
}
