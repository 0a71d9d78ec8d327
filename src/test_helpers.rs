//! Shared test utilities.
//!
//! Record builders for documents, plus [`TestSite`], a throwaway site root
//! with the standard `albums/`, `thumbnails/` and `full/` layout.
//!
//! # Usage
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new();
//! site.add_source("travel", "dawn.jpg");
//!
//! let mut doc = Document::new();
//! doc.insert("travel", album_with("Travel", vec![
//!     imported_photo("travel", "travel-dawn-1", "dawn.jpg"),
//! ]));
//! site.add_derived_for(&doc);
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{SiteConfig, SitePaths};
use crate::document::Document;
use crate::types::{Album, Photo, PhotoMetadata};

// =========================================================================
// Record builders
// =========================================================================

/// Bare photo with an id and date, nothing else.
pub fn photo(id: &str, date: &str) -> Photo {
    Photo {
        id: id.to_string(),
        title: id.to_string(),
        date: date.to_string(),
        ..Default::default()
    }
}

/// Photo as import would leave it: derived paths under `album` and a
/// recorded original filename.
pub fn imported_photo(album: &str, id: &str, original: &str) -> Photo {
    Photo {
        thumbnail: format!("thumbnails/{album}/{id}.jpg"),
        full: format!("full/{album}/{id}.jpg"),
        metadata: Some(PhotoMetadata {
            original_filename: Some(original.to_string()),
            ..Default::default()
        }),
        ..photo(id, "2024-01-01")
    }
}

pub fn album_with(title: &str, images: Vec<Photo>) -> Album {
    Album {
        title: title.to_string(),
        cover: images
            .first()
            .map(|p| p.thumbnail.clone())
            .unwrap_or_default(),
        images,
        ..Default::default()
    }
}

pub fn photo_ids(album: &Album) -> Vec<&str> {
    album.images.iter().map(|p| p.id.as_str()).collect()
}

// =========================================================================
// Site fixture
// =========================================================================

/// Temporary site root with default config.
pub struct TestSite {
    pub dir: TempDir,
    pub config: SiteConfig,
    pub paths: SitePaths,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::default();
        let paths = SitePaths::new(dir.path(), &config);
        std::fs::create_dir_all(&paths.albums).unwrap();
        Self { dir, config, paths }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create an (empty) album source directory.
    pub fn add_album_dir(&self, album: &str) -> PathBuf {
        let dir = self.paths.album_dir(album);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write a placeholder source file. Contents only matter to real backends.
    pub fn add_source(&self, album: &str, filename: &str) -> PathBuf {
        let path = self.add_album_dir(album).join(filename);
        std::fs::write(&path, b"source").unwrap();
        path
    }

    /// Write a file at a document-relative path.
    pub fn add_file(&self, relative: &str) -> PathBuf {
        let path = self.paths.resolve(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"derived").unwrap();
        path
    }

    /// Write the thumbnail and full file of every photo in `doc`.
    pub fn add_derived_for(&self, doc: &Document) {
        for (_, album) in doc.iter() {
            for photo in &album.images {
                self.add_file(&photo.thumbnail);
                self.add_file(&photo.full);
            }
        }
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.paths.resolve(relative).exists()
    }
}
