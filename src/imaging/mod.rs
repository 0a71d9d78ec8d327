//! Image processing for derived variants, in pure Rust with no system tools.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Capture metadata** | `kamadak-exif` (date, camera, lens, exposure, GPS) |
//! | **Resize** | Lanczos3 via `image::DynamicImage::resize` |
//! | **Encode** | JPEG (quality), PNG, WebP (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod exif_reader;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, CaptureMetadata, ImageBackend};
pub use calculations::fit_within_width;
pub use operations::{GeneratedVariant, VariantConfig, create_variant};
pub use params::{OutputFormat, Quality, ResizeParams};
pub use rust_backend::RustBackend;
