//! The `albums.json` document: loading, persisting, and photo ordering.
//!
//! The document is the only persisted state. Every pipeline command loads it
//! once, transforms it in memory, and hands it back to [`save`] at the end of
//! a successful run, so nothing is written during a dry run or after a fatal
//! error.
//!
//! A missing document is an empty one. A malformed document is fatal: the
//! pipeline refuses to run rather than rewrite a file it could not read.

use crate::types::{Album, Photo};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed document {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Album key → album, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    albums: Vec<(String, Album)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Album> {
        self.position(key).map(|i| &self.albums[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Album> {
        self.position(key).map(|i| &mut self.albums[i].1)
    }

    /// Insert or replace an album. New keys go to the end.
    pub fn insert(&mut self, key: impl Into<String>, album: Album) {
        let key = key.into();
        match self.position(&key) {
            Some(i) => self.albums[i].1 = album,
            None => self.albums.push((key, album)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Album> {
        self.position(key).map(|i| self.albums.remove(i).1)
    }

    /// Re-key an album in place. Returns false if `from` is absent or `to`
    /// is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.contains(to) {
            return false;
        }
        match self.position(from) {
            Some(i) => {
                self.albums[i].0 = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.albums.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Album)> {
        self.albums.iter().map(|(k, a)| (k.as_str(), a))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Album)> {
        self.albums.iter_mut().map(|(k, a)| (k.as_str(), a))
    }

    /// All photos of non-private albums, each album in its display order.
    pub fn public_photos(&self) -> Vec<&Photo> {
        self.albums
            .iter()
            .filter(|(_, album)| !album.is_private())
            .flat_map(|(_, album)| album.images.iter())
            .collect()
    }

    /// Whether any album already holds a photo with this id.
    pub fn has_photo_id(&self, id: &str) -> bool {
        self.albums
            .iter()
            .any(|(_, album)| album.images.iter().any(|p| p.id == id))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.albums.iter().position(|(k, _)| k == key)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.albums.len()))?;
        for (key, album) in &self.albums {
            map.serialize_entry(key, album)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = Document;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of album keys to albums")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Document, A::Error> {
                let mut doc = Document::new();
                while let Some((key, album)) = access.next_entry::<String, Album>()? {
                    doc.insert(key, album);
                }
                Ok(doc)
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// Load the document, treating a missing file as an empty document.
pub fn load(path: &Path) -> Result<Document, DocumentError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(source) => {
            return Err(DocumentError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(Document::new());
    }
    serde_json::from_str(&content).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the document the way it is stored: 4-space indented JSON.
pub fn to_json(doc: &Document) -> Result<String, DocumentError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Persist the whole document, replacing the previous file atomically.
///
/// The JSON is written to a sibling temp file first and renamed over the
/// target, so a failed write never leaves a truncated document behind.
pub fn save(doc: &Document, path: &Path) -> Result<(), DocumentError> {
    let json = to_json(doc)?;
    let write_err = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "albums.json".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
    file.write_all(json.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(write_err)
}

/// Display ordering between two photos.
///
/// Photos with an explicit `order` come first, ascending. Photos without one
/// follow, newest `date` first. Dates are ISO `YYYY-MM-DD` so they compare
/// as strings.
pub fn compare_photos(a: &Photo, b: &Photo) -> Ordering {
    match (a.order, b.order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.date.cmp(&a.date),
    }
}

/// Sort an album's photos into display order. Stable for equal keys.
pub fn sort_images(images: &mut [Photo]) {
    images.sort_by(compare_photos);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{album_with, photo};
    use tempfile::TempDir;

    fn ids(images: &[Photo]) -> Vec<&str> {
        images.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn order_outranks_date() {
        let mut x = photo("x", "2021-01-01");
        x.order = Some(1);
        let mut y = photo("y", "2020-01-01");
        y.order = Some(2);
        let z = photo("z", "2019-01-01");

        let mut images = vec![z, y, x];
        sort_images(&mut images);
        assert_eq!(ids(&images), vec!["x", "y", "z"]);
    }

    #[test]
    fn unordered_photos_sort_newest_first() {
        let mut images = vec![
            photo("old", "2019-03-01"),
            photo("new", "2024-07-12"),
            photo("mid", "2022-11-30"),
        ];
        sort_images(&mut images);
        assert_eq!(ids(&images), vec!["new", "mid", "old"]);
    }

    #[test]
    fn ordered_photo_precedes_newer_unordered_one() {
        let mut ordered = photo("ordered", "2001-01-01");
        ordered.order = Some(5);
        let mut images = vec![photo("recent", "2025-01-01"), ordered];
        sort_images(&mut images);
        assert_eq!(ids(&images), vec!["ordered", "recent"]);
    }

    #[test]
    fn equal_dates_keep_insertion_order() {
        let mut images = vec![photo("first", "2023-01-01"), photo("second", "2023-01-01")];
        sort_images(&mut images);
        assert_eq!(ids(&images), vec!["first", "second"]);
    }

    #[test]
    fn missing_document_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let doc = load(&tmp.path().join("albums.json")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.json");
        fs::write(&path, "{ \"travel\": [").unwrap();
        assert!(matches!(load(&path), Err(DocumentError::Parse { .. })));
    }

    #[test]
    fn save_uses_four_space_indent_and_keeps_key_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("albums.json");

        let mut doc = Document::new();
        doc.insert("zebra", album_with("Zebra", vec![]));
        doc.insert("alpha", album_with("Alpha", vec![]));
        save(&doc, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"zebra\": {\n        \"title\": \"Zebra\""));
        assert!(text.find("zebra").unwrap() < text.find("alpha").unwrap());

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["zebra", "alpha"]);
        assert!(!tmp.path().join(".albums.json.tmp").exists());
    }

    #[test]
    fn rename_keeps_position_and_refuses_collisions() {
        let mut doc = Document::new();
        doc.insert("a", album_with("A", vec![]));
        doc.insert("b", album_with("B", vec![]));
        doc.insert("c", album_with("C", vec![]));

        assert!(doc.rename("b", "beta"));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "beta", "c"]);
        assert!(!doc.rename("a", "c"));
        assert!(!doc.rename("missing", "d"));
    }

    #[test]
    fn public_photos_skip_private_albums() {
        let mut doc = Document::new();
        doc.insert("open", album_with("Open", vec![photo("o1", "2020-01-01")]));
        let mut hidden = album_with("Hidden", vec![photo("h1", "2020-01-01")]);
        hidden.is_private = Some(true);
        doc.insert("hidden", hidden);

        let public: Vec<&str> = doc.public_photos().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(public, vec!["o1"]);
        assert!(doc.get("hidden").is_some());
    }
}
