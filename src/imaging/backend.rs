//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations import needs:
//! identify, read_metadata, and resize. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests use the
//! recording [`MockBackend`](tests::MockBackend).

use super::params::ResizeParams;
use crate::types::{Dimensions, Gps};
use chrono::NaiveDateTime;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Capture metadata read from a source file.
///
/// Every field is optional: photos from scanners, screenshots and stripped
/// exports carry little or nothing, and import always has a fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub captured_at: Option<NaiveDateTime>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
    pub gps: Option<Gps>,
}

impl CaptureMetadata {
    /// True when no technical field (camera through ISO) is present.
    pub fn has_no_technical_fields(&self) -> bool {
        self.camera.is_none()
            && self.lens.is_none()
            && self.focal_length.is_none()
            && self.aperture.is_none()
            && self.shutter_speed.is_none()
            && self.iso.is_none()
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read embedded capture metadata. Missing metadata is not an error.
    fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, BackendError>;

    /// Resize the source and encode it to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use crate::imaging::params::OutputFormat;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations and writes placeholder outputs.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon.
    #[derive(Default)]
    pub struct MockBackend {
        /// Per-filename dimensions; unknown files get `default_dimensions`.
        pub dimensions: Mutex<HashMap<String, Dimensions>>,
        pub default_dimensions: Option<Dimensions>,
        pub metadata: Mutex<HashMap<String, CaptureMetadata>>,
        /// Filenames whose resize fails.
        pub failing: Mutex<Vec<String>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        ReadMetadata(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            quality: u32,
            format: OutputFormat,
        },
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                default_dimensions: Some(Dimensions {
                    width: 3000,
                    height: 2000,
                }),
                ..Default::default()
            }
        }

        pub fn with_dimensions(self, filename: &str, width: u32, height: u32) -> Self {
            self.dimensions
                .lock()
                .unwrap()
                .insert(filename.to_string(), Dimensions { width, height });
            self
        }

        pub fn with_metadata(self, filename: &str, metadata: CaptureMetadata) -> Self {
            self.metadata
                .lock()
                .unwrap()
                .insert(filename.to_string(), metadata);
            self
        }

        pub fn failing_on(self, filename: &str) -> Self {
            self.failing.lock().unwrap().push(filename.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.dimensions
                .lock()
                .unwrap()
                .get(&file_name(path))
                .copied()
                .or(self.default_dimensions)
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ReadMetadata(path.to_string_lossy().to_string()));

            Ok(self
                .metadata
                .lock()
                .unwrap()
                .get(&file_name(path))
                .cloned()
                .unwrap_or_default())
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                quality: params.quality.value(),
                format: params.format,
            });
            if self.failing.lock().unwrap().contains(&file_name(&params.source)) {
                return Err(BackendError::ProcessingFailed("mock failure".to_string()));
            }
            if let Some(parent) = params.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&params.output, b"mock")?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::new().with_dimensions("image.jpg", 800, 600);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_resize_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out/a.jpg");

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 600,
                height: 400,
                quality: Quality::new(80),
                format: OutputFormat::Jpeg,
            })
            .unwrap();

        assert!(output.exists());
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                width: 600,
                height: 400,
                quality: 80,
                ..
            }
        ));
    }

    #[test]
    fn mock_failure_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().failing_on("bad.jpg");
        let result = backend.resize(&ResizeParams {
            source: "/albums/x/bad.jpg".into(),
            output: tmp.path().join("bad.jpg"),
            width: 10,
            height: 10,
            quality: Quality::default(),
            format: OutputFormat::Png,
        });
        assert!(result.is_err());
        assert!(!tmp.path().join("bad.jpg").exists());
    }

    #[test]
    fn empty_metadata_has_no_technical_fields() {
        assert!(CaptureMetadata::default().has_no_technical_fields());
        let meta = CaptureMetadata {
            iso: Some(200),
            ..Default::default()
        };
        assert!(!meta.has_no_technical_fields());
    }
}
