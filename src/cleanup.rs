//! Cleanup: drop document entries whose source is gone.
//!
//! - An album whose source directory no longer exists is removed along with
//!   its derived files.
//! - A photo whose `metadata.originalFilename` is missing from its album
//!   directory is removed along with its derived files.
//! - A photo without `originalFilename` cannot be checked and is always
//!   kept.
//!
//! Only files inside the configured `thumbnails/` and `full/` directories
//! are ever deleted; source images are never touched. With `keep_files`
//! the document is cleaned and every file is left in place.
//!
//! Source directories holding images but absent from the document are
//! reported as import candidates.

use crate::config::SitePaths;
use crate::document::Document;
use crate::import::{discover_albums, list_source_images};
use crate::types::Photo;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Album '{0}' is not in the document")]
    UnknownAlbum(String),
    #[error("Albums directory not found: {0} (refusing to treat every album as orphaned)")]
    AlbumsDirMissing(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Restrict the pass to these album keys; empty means all.
    pub albums: Vec<String>,
    /// Clean the document but leave derived files on disk.
    pub keep_files: bool,
}

/// An album whose source directory is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanAlbum {
    pub key: String,
    pub photo_count: usize,
    /// Existing derived files that will be deleted.
    pub derived: Vec<PathBuf>,
}

/// A photo whose source file is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanPhoto {
    pub album: String,
    pub id: String,
    pub original_filename: String,
    pub derived: Vec<PathBuf>,
}

/// A source directory with images and no document entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub key: String,
    pub image_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupPlan {
    pub orphan_albums: Vec<OrphanAlbum>,
    pub orphan_photos: Vec<OrphanPhoto>,
    /// Photos kept because they have no `originalFilename`.
    pub unverifiable: usize,
    pub import_candidates: Vec<ImportCandidate>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.orphan_albums.is_empty() && self.orphan_photos.is_empty()
    }

    pub fn derived_file_count(&self) -> usize {
        self.orphan_albums
            .iter()
            .map(|a| a.derived.len())
            .chain(self.orphan_photos.iter().map(|p| p.derived.len()))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub albums_removed: usize,
    pub photos_removed: usize,
    pub files_deleted: usize,
    pub files_failed: usize,
    pub dirs_removed: usize,
}

/// Derived files of one photo that exist on disk.
///
/// The document's `thumbnail`/`full` paths are used first. Files in
/// `thumbnails/<album>/` and `full/<album>/` named after the photo id are
/// included too, so variants written under an older output format are not
/// left behind. Anything outside the derived directories is ignored.
fn derived_files(paths: &SitePaths, album: &str, photo: &Photo) -> Vec<PathBuf> {
    let mut found: BTreeSet<PathBuf> = BTreeSet::new();
    for relative in [&photo.thumbnail, &photo.full] {
        if relative.is_empty() {
            continue;
        }
        let path = paths.resolve(relative);
        if paths.is_derived(&path) && path.is_file() {
            found.insert(path);
        }
    }
    for base in [&paths.thumbnails, &paths.full] {
        let Ok(entries) = std::fs::read_dir(base.join(album)) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let stem_matches = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy() == photo.id);
            if stem_matches && path.is_file() && paths.is_derived(&path) {
                found.insert(path);
            }
        }
    }
    found.into_iter().collect()
}

/// Compute what cleanup would remove. Reads the filesystem, changes nothing.
pub fn plan_cleanup(
    doc: &Document,
    paths: &SitePaths,
    options: &CleanupOptions,
) -> Result<CleanupPlan, CleanupError> {
    if !paths.albums.is_dir() {
        return Err(CleanupError::AlbumsDirMissing(paths.albums.clone()));
    }
    for key in &options.albums {
        if !doc.contains(key) {
            return Err(CleanupError::UnknownAlbum(key.clone()));
        }
    }
    let selected = |key: &str| options.albums.is_empty() || options.albums.iter().any(|a| a == key);

    let mut plan = CleanupPlan::default();
    for (key, album) in doc.iter().filter(|(key, _)| selected(*key)) {
        let source_dir = paths.album_dir(key);
        if !source_dir.is_dir() {
            plan.orphan_albums.push(OrphanAlbum {
                key: key.to_string(),
                photo_count: album.images.len(),
                derived: album
                    .images
                    .iter()
                    .flat_map(|p| derived_files(paths, key, p))
                    .collect(),
            });
            continue;
        }

        let present: HashSet<String> = list_dir_files(&source_dir)?;
        for photo in &album.images {
            let Some(original) = photo.original_filename() else {
                plan.unverifiable += 1;
                continue;
            };
            if !present.contains(original) {
                plan.orphan_photos.push(OrphanPhoto {
                    album: key.to_string(),
                    id: photo.id.clone(),
                    original_filename: original.to_string(),
                    derived: derived_files(paths, key, photo),
                });
            }
        }
    }

    for key in discover_albums(&paths.albums)? {
        if doc.contains(&key) {
            continue;
        }
        let images = list_source_images(&paths.album_dir(&key))?;
        if !images.is_empty() {
            plan.import_candidates.push(ImportCandidate {
                key,
                image_count: images.len(),
            });
        }
    }

    Ok(plan)
}

/// Every file name in a source directory, images or not. Cleanup only asks
/// whether the recorded file still exists.
fn list_dir_files(dir: &Path) -> Result<HashSet<String>, std::io::Error> {
    let mut names = HashSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Apply the plan: edit the document and, unless `keep_files`, delete the
/// listed derived files and prune emptied derived directories.
///
/// File deletion failures are logged and counted; they never abort the run.
pub fn apply_cleanup(
    doc: &mut Document,
    plan: &CleanupPlan,
    paths: &SitePaths,
    options: &CleanupOptions,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for orphan in &plan.orphan_albums {
        if doc.remove(&orphan.key).is_some() {
            report.albums_removed += 1;
        }
    }

    let mut touched: BTreeSet<&str> = BTreeSet::new();
    for orphan in &plan.orphan_photos {
        let Some(album) = doc.get_mut(&orphan.album) else {
            continue;
        };
        let before = album.images.len();
        album.images.retain(|p| p.id != orphan.id);
        if album.images.len() < before {
            report.photos_removed += 1;
            touched.insert(orphan.album.as_str());
        }
    }

    for key in &touched {
        if let Some(album) = doc.get_mut(key) {
            let cover_alive = album.images.iter().any(|p| p.thumbnail == album.cover);
            if !cover_alive {
                album.cover = album
                    .images
                    .first()
                    .map(|p| p.thumbnail.clone())
                    .unwrap_or_default();
            }
        }
    }

    if options.keep_files {
        return report;
    }

    let files = plan
        .orphan_albums
        .iter()
        .flat_map(|a| a.derived.iter())
        .chain(plan.orphan_photos.iter().flat_map(|p| p.derived.iter()));
    for file in files {
        if !paths.is_derived(file) {
            warn!(path = %file.display(), "refusing to delete file outside derived directories");
            continue;
        }
        match std::fs::remove_file(file) {
            Ok(()) => {
                debug!(path = %file.display(), "deleted");
                report.files_deleted += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %file.display(), error = %e, "could not delete derived file");
                report.files_failed += 1;
            }
        }
    }

    let album_keys = plan
        .orphan_albums
        .iter()
        .map(|a| a.key.as_str())
        .chain(plan.orphan_photos.iter().map(|p| p.album.as_str()))
        .collect::<BTreeSet<_>>();
    for key in album_keys {
        for base in [&paths.thumbnails, &paths.full] {
            report.dirs_removed += prune_empty_dirs(&base.join(key));
        }
    }

    report
}

/// Remove `dir` and its subdirectories when they hold no files. Returns how
/// many directories were removed.
fn prune_empty_dirs(dir: &Path) -> usize {
    if !dir.is_dir() {
        return 0;
    }
    let mut removed = 0;
    for entry in walkdir::WalkDir::new(dir)
        .contents_first(true)
        .into_iter()
        .flatten()
    {
        // remove_dir only succeeds on empty directories
        if entry.file_type().is_dir() && std::fs::remove_dir(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestSite, album_with, imported_photo, photo, photo_ids};

    fn site_with_travel() -> (TestSite, Document) {
        let site = TestSite::new();
        let mut doc = Document::new();
        doc.insert(
            "travel",
            album_with(
                "Travel",
                vec![
                    imported_photo("travel", "travel-kept-1", "kept.jpg"),
                    imported_photo("travel", "travel-gone-1", "gone.jpg"),
                ],
            ),
        );
        site.add_derived_for(&doc);
        site.add_source("travel", "kept.jpg");
        (site, doc)
    }

    #[test]
    fn orphaned_photo_and_its_files_are_removed() {
        let (site, mut doc) = site_with_travel();
        let options = CleanupOptions::default();

        let plan = plan_cleanup(&doc, &site.paths, &options).unwrap();
        assert_eq!(plan.orphan_photos.len(), 1);
        assert_eq!(plan.orphan_photos[0].id, "travel-gone-1");
        assert_eq!(plan.derived_file_count(), 2);

        let report = apply_cleanup(&mut doc, &plan, &site.paths, &options);
        assert_eq!(report.photos_removed, 1);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(photo_ids(doc.get("travel").unwrap()), vec!["travel-kept-1"]);
        assert!(!site.exists("thumbnails/travel/travel-gone-1.jpg"));
        assert!(!site.exists("full/travel/travel-gone-1.jpg"));
        assert!(site.exists("thumbnails/travel/travel-kept-1.jpg"));
        assert!(site.exists("albums/travel/kept.jpg"));
    }

    #[test]
    fn photo_without_original_filename_is_never_removed() {
        let site = TestSite::new();
        site.add_album_dir("travel");
        let mut doc = Document::new();
        let mut legacy = photo("legacy-1", "2020-01-01");
        legacy.thumbnail = "thumbnails/travel/legacy-1.jpg".into();
        doc.insert("travel", album_with("Travel", vec![legacy]));
        site.add_file("thumbnails/travel/legacy-1.jpg");

        let plan = plan_cleanup(&doc, &site.paths, &CleanupOptions::default()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.unverifiable, 1);

        apply_cleanup(&mut doc, &plan, &site.paths, &CleanupOptions::default());
        assert_eq!(doc.get("travel").unwrap().images.len(), 1);
        assert!(site.exists("thumbnails/travel/legacy-1.jpg"));
    }

    #[test]
    fn orphaned_album_is_dropped_and_dirs_pruned() {
        let site = TestSite::new();
        let mut doc = Document::new();
        doc.insert(
            "gone",
            album_with("Gone", vec![imported_photo("gone", "gone-a-1", "a.jpg")]),
        );
        site.add_derived_for(&doc);

        let options = CleanupOptions::default();
        let plan = plan_cleanup(&doc, &site.paths, &options).unwrap();
        assert_eq!(plan.orphan_albums.len(), 1);
        assert_eq!(plan.orphan_albums[0].photo_count, 1);

        let report = apply_cleanup(&mut doc, &plan, &site.paths, &options);
        assert_eq!(report.albums_removed, 1);
        assert_eq!(report.dirs_removed, 2);
        assert!(doc.is_empty());
        assert!(!site.paths.thumbnails.join("gone").exists());
        assert!(site.paths.thumbnails.exists());
    }

    #[test]
    fn keep_files_leaves_disk_alone() {
        let (site, mut doc) = site_with_travel();
        let options = CleanupOptions {
            keep_files: true,
            ..Default::default()
        };
        let plan = plan_cleanup(&doc, &site.paths, &options).unwrap();
        let report = apply_cleanup(&mut doc, &plan, &site.paths, &options);

        assert_eq!(report.photos_removed, 1);
        assert_eq!(report.files_deleted, 0);
        assert!(site.exists("thumbnails/travel/travel-gone-1.jpg"));
    }

    #[test]
    fn album_filter_restricts_the_pass() {
        let (site, mut doc) = site_with_travel();
        doc.insert(
            "gone",
            album_with("Gone", vec![imported_photo("gone", "gone-a-1", "a.jpg")]),
        );
        let options = CleanupOptions {
            albums: vec!["gone".into()],
            ..Default::default()
        };
        let plan = plan_cleanup(&doc, &site.paths, &options).unwrap();
        assert_eq!(plan.orphan_albums.len(), 1);
        assert!(plan.orphan_photos.is_empty());

        let unknown = CleanupOptions {
            albums: vec!["nope".into()],
            ..Default::default()
        };
        assert!(matches!(
            plan_cleanup(&doc, &site.paths, &unknown),
            Err(CleanupError::UnknownAlbum(_))
        ));
    }

    #[test]
    fn derived_paths_outside_derived_dirs_are_ignored() {
        let site = TestSite::new();
        site.add_album_dir("travel");
        let source = site.add_source("travel", "x.jpg");
        let mut rogue = imported_photo("travel", "travel-y-1", "y.jpg");
        rogue.thumbnail = "albums/travel/x.jpg".into();
        rogue.full = "../outside.jpg".into();
        let mut doc = Document::new();
        doc.insert("travel", album_with("Travel", vec![rogue]));

        let plan = plan_cleanup(&doc, &site.paths, &CleanupOptions::default()).unwrap();
        assert_eq!(plan.orphan_photos.len(), 1);
        assert!(plan.orphan_photos[0].derived.is_empty());

        apply_cleanup(&mut doc, &plan, &site.paths, &CleanupOptions::default());
        assert!(source.exists());
    }

    #[test]
    fn variants_named_after_the_id_are_found() {
        let (site, doc) = site_with_travel();
        site.add_file("thumbnails/travel/travel-gone-1.webp");
        let plan = plan_cleanup(&doc, &site.paths, &CleanupOptions::default()).unwrap();
        assert_eq!(plan.orphan_photos[0].derived.len(), 3);
    }

    #[test]
    fn import_candidates_are_reported() {
        let (site, doc) = site_with_travel();
        site.add_source("new-album", "one.jpg");
        site.add_album_dir("empty");
        let plan = plan_cleanup(&doc, &site.paths, &CleanupOptions::default()).unwrap();
        assert_eq!(
            plan.import_candidates,
            vec![ImportCandidate {
                key: "new-album".into(),
                image_count: 1
            }]
        );
    }

    #[test]
    fn cover_follows_removed_photo() {
        let (site, mut doc) = site_with_travel();
        doc.get_mut("travel").unwrap().cover = "thumbnails/travel/travel-gone-1.jpg".into();
        let plan = plan_cleanup(&doc, &site.paths, &CleanupOptions::default()).unwrap();
        apply_cleanup(&mut doc, &plan, &site.paths, &CleanupOptions::default());
        assert_eq!(
            doc.get("travel").unwrap().cover,
            "thumbnails/travel/travel-kept-1.jpg"
        );
    }

    #[test]
    fn missing_albums_dir_is_refused() {
        let site = TestSite::new();
        std::fs::remove_dir(&site.paths.albums).unwrap();
        let mut doc = Document::new();
        doc.insert("travel", album_with("Travel", vec![]));
        assert!(matches!(
            plan_cleanup(&doc, &site.paths, &CleanupOptions::default()),
            Err(CleanupError::AlbumsDirMissing(_))
        ));
    }
}
