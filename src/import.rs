//! Import: bring new source images into the document.
//!
//! For every album directory under `albums/` (or one named album), each
//! source image that the document does not represent yet becomes a photo:
//!
//! 1. derived variants are written to `thumbnails/<album>/<id>.<ext>` and
//!    `full/<album>/<id>.<ext>`
//! 2. capture metadata is read (date, camera, exposure, GPS)
//! 3. the scene analyzer supplies alt text, description and tags, with
//!    the fixed fallback when it is disabled or fails
//! 4. the record is appended to the album
//!
//! Photos that already exist are never rewritten. If one of them lacks
//! `technical`, `metadata` or `accessibility`, the missing part is filled in
//! and everything already present is left alone. Alt text that is only the
//! fallback counts as missing, so a `--no-ai` import is completed by a later
//! run with analysis enabled.
//!
//! ## Matching existing photos
//!
//! A source file is already represented when a photo records it as
//! `metadata.originalFilename`. Photos imported before that field existed
//! are matched by id instead: ids start with `<album-slug>-<normalized-stem>-`
//! (see [`naming::photo_key`]). Re-running import on an unchanged directory
//! therefore adds nothing.
//!
//! ## Parallelism and interruption
//!
//! Per-photo work runs on a rayon pool of `processing.max_processes`
//! threads. Ids are assigned up front so concurrent photos never collide,
//! and a photo's record reaches the document only after both variants are
//! written. Setting the interrupt flag stops new per-photo work; photos
//! already finished are kept.
//!
//! An album whose directory cannot be listed, or whose derived directories
//! cannot be created, is reported and skipped. Other albums still import,
//! so the caller always gets a document worth saving.

use crate::analysis::{Analysis, FALLBACK_ALT_TEXT, SceneAnalyzer, analyze_or_fallback};
use crate::config::{SiteConfig, SitePaths, effective_threads};
use crate::document::{Document, sort_images};
use crate::imaging::rust_backend::is_supported_image;
use crate::imaging::{
    BackendError, CaptureMetadata, ImageBackend, OutputFormat, Quality, VariantConfig,
    create_variant,
};
use crate::naming;
use crate::types::{Accessibility, Album, Dimensions, Photo, PhotoMetadata, Technical};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Album directory not found: {0}")]
    AlbumNotFound(PathBuf),
    #[error("Albums directory not found: {0}")]
    AlbumsDirMissing(PathBuf),
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What to import and when the run started.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Only this album directory; all albums when `None`.
    pub album: Option<String>,
    /// Run start. Supplies the id suffix and the fallback `date`.
    pub run_at: DateTime<Utc>,
    /// Set from the Ctrl-C handler; checked before each photo.
    pub interrupt: Arc<AtomicBool>,
}

impl ImportOptions {
    pub fn new(album: Option<String>) -> Self {
        Self {
            album,
            run_at: Utc::now(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// New photos added.
    pub processed: usize,
    /// Existing photos that gained missing fields.
    pub updated: usize,
    /// Source files already represented and complete.
    pub skipped: usize,
    /// Photos, or whole albums, that failed and were left out.
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub stats: ImportStats,
    /// Album keys that were created during this run.
    pub created_albums: Vec<String>,
    pub interrupted: bool,
}

/// Progress events for the printer thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    AlbumStarted {
        key: String,
        title: String,
        new_photos: usize,
        existing: usize,
    },
    PhotoImported {
        /// 1-based position among this album's new files.
        index: usize,
        title: String,
        filename: String,
        id: String,
    },
    PhotoEnhanced {
        id: String,
        fields: Vec<&'static str>,
    },
    PhotoFailed {
        filename: String,
        error: String,
    },
    /// The album could not be read or prepared; nothing in it was imported.
    AlbumFailed {
        key: String,
        error: String,
    },
    Interrupted,
}

/// Everything an import run reads from.
pub struct Importer<'a, B: ImageBackend> {
    pub paths: &'a SitePaths,
    pub config: &'a SiteConfig,
    pub backend: &'a B,
    pub analyzer: &'a dyn SceneAnalyzer,
}

/// A new source file with its pre-assigned id.
struct NewJob {
    index: usize,
    filename: String,
    id: String,
}

/// An existing photo with fields to fill.
struct EnhanceJob {
    position: usize,
    filename: String,
    thumbnail: String,
    needs: Needs,
}

#[derive(Debug, Clone, Copy, Default)]
struct Needs {
    technical: bool,
    metadata: bool,
    original_filename: bool,
    accessibility: bool,
    tags: bool,
}

impl Needs {
    fn of(photo: &Photo) -> Self {
        let accessibility = lacks_alt_text(photo);
        Self {
            technical: photo.technical.is_none(),
            metadata: photo.metadata.is_none(),
            original_filename: photo.original_filename().is_none(),
            accessibility,
            tags: photo.tags.is_empty() && accessibility,
        }
    }

    fn any(&self) -> bool {
        self.technical || self.metadata || self.original_filename || self.accessibility
    }
}

/// Fields gathered for an existing photo. `None` means "leave as is".
#[derive(Debug, Default)]
struct Enhancement {
    technical: Option<Technical>,
    metadata: Option<PhotoMetadata>,
    accessibility: Option<Accessibility>,
    tags: Vec<String>,
}

enum Outcome<T> {
    Done(T),
    Failed { filename: String, error: String },
    Cancelled,
}

impl<'a, B: ImageBackend> Importer<'a, B> {
    /// Import into `doc`. The caller persists the document afterwards.
    pub fn run(
        &self,
        doc: &mut Document,
        options: &ImportOptions,
        events: Option<Sender<ImportEvent>>,
    ) -> Result<ImportReport, ImportError> {
        let albums = self.albums_to_import(options.album.as_deref())?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(effective_threads(&self.config.processing))
            .build()?;

        let mut report = ImportReport::default();
        for key in albums {
            if options.interrupt.load(Ordering::Relaxed) {
                report.interrupted = true;
                break;
            }
            let result = self.import_album(doc, &key, options, &pool, events.as_ref(), &mut report);
            if let Err(e) = result {
                warn!(album = %key, error = %e, "skipping album");
                report.stats.errors += 1;
                if let Some(tx) = &events {
                    tx.send(ImportEvent::AlbumFailed {
                        key: key.clone(),
                        error: e.to_string(),
                    })
                    .ok();
                }
            }
        }

        if report.interrupted
            && let Some(tx) = &events
        {
            tx.send(ImportEvent::Interrupted).ok();
        }
        info!(
            processed = report.stats.processed,
            updated = report.stats.updated,
            skipped = report.stats.skipped,
            errors = report.stats.errors,
            "import finished"
        );
        Ok(report)
    }

    fn albums_to_import(&self, only: Option<&str>) -> Result<Vec<String>, ImportError> {
        match only {
            Some(key) => {
                let dir = self.paths.album_dir(key);
                if !dir.is_dir() {
                    return Err(ImportError::AlbumNotFound(dir));
                }
                Ok(vec![key.to_string()])
            }
            None => {
                if !self.paths.albums.is_dir() {
                    return Err(ImportError::AlbumsDirMissing(self.paths.albums.clone()));
                }
                Ok(discover_albums(&self.paths.albums)?)
            }
        }
    }

    fn import_album(
        &self,
        doc: &mut Document,
        key: &str,
        options: &ImportOptions,
        pool: &rayon::ThreadPool,
        events: Option<&Sender<ImportEvent>>,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let files = list_source_images(&self.paths.album_dir(key))?;

        let (new_files, enhance_jobs, skipped) = match doc.get(key) {
            Some(album) => plan_album(key, album, &files),
            None => plan_album(key, &Album::default(), &files),
        };
        if !new_files.is_empty() {
            std::fs::create_dir_all(self.paths.thumbnails.join(key))?;
            std::fs::create_dir_all(self.paths.full.join(key))?;
        }

        if !doc.contains(key) {
            doc.insert(key, new_album(key));
            report.created_albums.push(key.to_string());
            debug!(album = key, "created album entry");
        }
        report.stats.skipped += skipped;

        let suffix = options.run_at.timestamp();
        let mut assigned: HashSet<String> = HashSet::new();
        let new_jobs: Vec<NewJob> = new_files
            .into_iter()
            .enumerate()
            .map(|(i, filename)| {
                let id = naming::photo_id(key, &filename, suffix, |candidate| {
                    doc.has_photo_id(candidate) || assigned.contains(candidate)
                });
                assigned.insert(id.clone());
                NewJob {
                    index: i + 1,
                    filename,
                    id,
                }
            })
            .collect();

        if let Some(tx) = events {
            let title = doc.get(key).map(|a| a.title.clone()).unwrap_or_default();
            tx.send(ImportEvent::AlbumStarted {
                key: key.to_string(),
                title,
                new_photos: new_jobs.len(),
                existing: files.len() - new_jobs.len(),
            })
            .ok();
        }

        let interrupt = &options.interrupt;
        let (new_results, enhance_results) = pool.install(|| {
            let new_results: Vec<Outcome<Photo>> = new_jobs
                .par_iter()
                .map(|job| {
                    if interrupt.load(Ordering::Relaxed) {
                        return Outcome::Cancelled;
                    }
                    match self.build_photo(key, job, options.run_at) {
                        Ok(photo) => {
                            if let Some(tx) = events {
                                tx.send(ImportEvent::PhotoImported {
                                    index: job.index,
                                    title: photo.title.clone(),
                                    filename: job.filename.clone(),
                                    id: photo.id.clone(),
                                })
                                .ok();
                            }
                            Outcome::Done(photo)
                        }
                        Err(e) => Outcome::Failed {
                            filename: job.filename.clone(),
                            error: e.to_string(),
                        },
                    }
                })
                .collect();

            let enhance_results: Vec<(usize, Outcome<Enhancement>)> = enhance_jobs
                .par_iter()
                .map(|job| {
                    if interrupt.load(Ordering::Relaxed) {
                        return (job.position, Outcome::Cancelled);
                    }
                    let outcome = match self.enhance(key, job, options.run_at) {
                        Ok(enhancement) => Outcome::Done(enhancement),
                        Err(e) => Outcome::Failed {
                            filename: job.filename.clone(),
                            error: e.to_string(),
                        },
                    };
                    (job.position, outcome)
                })
                .collect();

            (new_results, enhance_results)
        });

        let Some(album) = doc.get_mut(key) else {
            return Ok(());
        };

        for outcome in new_results {
            match outcome {
                Outcome::Done(photo) => {
                    album.images.push(photo);
                    report.stats.processed += 1;
                }
                Outcome::Failed { filename, error } => {
                    record_failure(key, filename, error, events, report);
                }
                Outcome::Cancelled => report.interrupted = true,
            }
        }

        for (position, outcome) in enhance_results {
            match outcome {
                Outcome::Done(enhancement) => {
                    let Some(photo) = album.images.get_mut(position) else {
                        continue;
                    };
                    let fields = apply_enhancement(photo, enhancement);
                    if fields.is_empty() {
                        report.stats.skipped += 1;
                    } else {
                        report.stats.updated += 1;
                        if let Some(tx) = events {
                            tx.send(ImportEvent::PhotoEnhanced {
                                id: photo.id.clone(),
                                fields,
                            })
                            .ok();
                        }
                    }
                }
                Outcome::Failed { filename, error } => {
                    record_failure(key, filename, error, events, report);
                }
                Outcome::Cancelled => report.interrupted = true,
            }
        }

        sort_images(&mut album.images);
        if album.cover.is_empty()
            && let Some(first) = album.images.first()
        {
            album.cover = first.thumbnail.clone();
        }
        Ok(())
    }

    fn variant_configs(&self) -> (VariantConfig, VariantConfig) {
        let images = &self.config.images;
        let quality = Quality::new(images.quality);
        let format: OutputFormat = images.format;
        (
            VariantConfig {
                max_width: images.thumbnail_width,
                quality,
                format,
            },
            VariantConfig {
                max_width: images.full_width,
                quality,
                format,
            },
        )
    }

    /// Produce a complete record for one new file. Both variants exist on
    /// disk when this returns `Ok`.
    fn build_photo(
        &self,
        key: &str,
        job: &NewJob,
        run_at: DateTime<Utc>,
    ) -> Result<Photo, ImportError> {
        let source = self.paths.album_dir(key).join(&job.filename);
        let dims = self.backend.identify(&source)?;
        let capture = self.capture_metadata(&source);
        let (thumb_config, full_config) = self.variant_configs();

        let thumb = create_variant(
            self.backend,
            &source,
            &self.paths.thumbnails.join(key),
            &job.id,
            (dims.width, dims.height),
            &thumb_config,
        )?;
        let full = create_variant(
            self.backend,
            &source,
            &self.paths.full.join(key),
            &job.id,
            (dims.width, dims.height),
            &full_config,
        )?;

        let thumb_path = self.paths.thumbnails.join(key).join(&thumb.filename);
        let analysis = analyze_or_fallback(self.analyzer, &thumb_path);

        let date = capture
            .captured_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| run_at.format("%Y-%m-%d").to_string());

        Ok(Photo {
            id: job.id.clone(),
            title: naming::title_from_filename(&job.filename),
            thumbnail: format!("{}/{}/{}", self.paths.thumbnails_rel, key, thumb.filename),
            full: format!("{}/{}/{}", self.paths.full_rel, key, full.filename),
            date,
            order: None,
            accessibility: Some(accessibility_from(&analysis)),
            technical: Some(technical_from(&capture, dims)),
            tags: analysis.tags,
            metadata: Some(PhotoMetadata {
                original_filename: Some(job.filename.clone()),
                processed_at: Some(run_at.to_rfc3339()),
                gps: capture.gps,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Gather the fields an existing photo is missing.
    fn enhance(
        &self,
        key: &str,
        job: &EnhanceJob,
        run_at: DateTime<Utc>,
    ) -> Result<Enhancement, ImportError> {
        let source = self.paths.album_dir(key).join(&job.filename);
        let needs = job.needs;
        let mut enhancement = Enhancement::default();

        let capture = if needs.technical || needs.metadata {
            Some(self.capture_metadata(&source))
        } else {
            None
        };

        if needs.technical
            && let Some(capture) = &capture
        {
            let dims = self.backend.identify(&source)?;
            enhancement.technical = Some(technical_from(capture, dims));
        }

        if needs.metadata || needs.original_filename {
            enhancement.metadata = Some(PhotoMetadata {
                original_filename: Some(job.filename.clone()),
                processed_at: needs.metadata.then(|| run_at.to_rfc3339()),
                gps: capture.as_ref().and_then(|c| c.gps),
                ..Default::default()
            });
        }

        if needs.accessibility {
            let thumb = self.paths.resolve(&job.thumbnail);
            let target = if !job.thumbnail.is_empty() && thumb.is_file() {
                thumb
            } else {
                source.clone()
            };
            let analysis = analyze_or_fallback(self.analyzer, &target);
            // A fallback says nothing new about an existing photo.
            if !analysis.is_fallback() {
                if needs.tags {
                    enhancement.tags = analysis.tags.clone();
                }
                enhancement.accessibility = Some(accessibility_from(&analysis));
            }
        }

        Ok(enhancement)
    }

    fn capture_metadata(&self, source: &Path) -> CaptureMetadata {
        self.backend.read_metadata(source).unwrap_or_else(|e| {
            warn!(path = %source.display(), error = %e, "could not read capture metadata");
            CaptureMetadata::default()
        })
    }
}

fn record_failure(
    key: &str,
    filename: String,
    error: String,
    events: Option<&Sender<ImportEvent>>,
    report: &mut ImportReport,
) {
    warn!(album = key, file = %filename, %error, "skipping photo");
    report.stats.errors += 1;
    if let Some(tx) = events {
        tx.send(ImportEvent::PhotoFailed { filename, error }).ok();
    }
}

/// Entry for an album directory the document has not seen before.
pub fn new_album(key: &str) -> Album {
    let title = naming::title_from_key(key);
    Album {
        description: format!("Photos from {title}"),
        title,
        ..Default::default()
    }
}

/// Split an album's source files into new files, enhancement jobs and a
/// skipped count.
fn plan_album(key: &str, album: &Album, files: &[String]) -> (Vec<String>, Vec<EnhanceJob>, usize) {
    let mut new_files = Vec::new();
    let mut enhance = Vec::new();
    let mut skipped = 0;
    let mut claimed: HashSet<usize> = HashSet::new();

    for filename in files {
        match find_existing(key, album, filename, &claimed) {
            Some(position) => {
                claimed.insert(position);
                let photo = &album.images[position];
                let needs = Needs::of(photo);
                if needs.any() {
                    enhance.push(EnhanceJob {
                        position,
                        filename: filename.clone(),
                        thumbnail: photo.thumbnail.clone(),
                        needs,
                    });
                } else {
                    skipped += 1;
                }
            }
            None => new_files.push(filename.clone()),
        }
    }
    (new_files, enhance, skipped)
}

/// Position of the photo representing `filename`, if any.
///
/// `originalFilename` is authoritative. Only photos without one are matched
/// by id, and each photo is claimed by at most one file.
fn find_existing(
    key: &str,
    album: &Album,
    filename: &str,
    claimed: &HashSet<usize>,
) -> Option<usize> {
    if let Some(pos) = album
        .images
        .iter()
        .position(|p| p.original_filename() == Some(filename))
    {
        return Some(pos);
    }
    let photo_key = naming::photo_key(key, filename);
    album.images.iter().enumerate().position(|(i, p)| {
        !claimed.contains(&i)
            && p.original_filename().is_none()
            && naming::id_matches_key(&p.id, &photo_key)
    })
}

/// No alt text, or only the fallback with nothing else the analyzer would
/// have supplied. Such photos are analyzed again on the next run.
fn lacks_alt_text(photo: &Photo) -> bool {
    match &photo.accessibility {
        None => true,
        Some(a) => {
            let alt = a.alt_text.trim();
            alt.is_empty()
                || (alt == FALLBACK_ALT_TEXT
                    && a.description.as_deref().is_none_or(str::is_empty)
                    && photo.tags.is_empty())
        }
    }
}

/// Fill the photo's missing fields. Returns the names of the fields set.
fn apply_enhancement(photo: &mut Photo, enhancement: Enhancement) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if photo.technical.is_none()
        && let Some(technical) = enhancement.technical
    {
        photo.technical = Some(technical);
        fields.push("technical");
    }

    if let Some(found) = enhancement.metadata {
        match &mut photo.metadata {
            None => {
                photo.metadata = Some(found);
                fields.push("metadata");
            }
            Some(existing) => {
                if existing.original_filename.as_deref().is_none_or(str::is_empty)
                    && found.original_filename.is_some()
                {
                    existing.original_filename = found.original_filename;
                    fields.push("originalFilename");
                }
                if existing.gps.is_none() && found.gps.is_some() {
                    existing.gps = found.gps;
                    fields.push("gps");
                }
            }
        }
    }

    if lacks_alt_text(photo) && let Some(found) = enhancement.accessibility {
        match &mut photo.accessibility {
            None => photo.accessibility = Some(found),
            Some(existing) => {
                existing.alt_text = found.alt_text;
                if existing.description.as_deref().is_none_or(str::is_empty) {
                    existing.description = found.description;
                }
            }
        }
        fields.push("accessibility");
    }

    if photo.tags.is_empty() && !enhancement.tags.is_empty() {
        photo.tags = enhancement.tags;
        fields.push("tags");
    }

    fields
}

fn accessibility_from(analysis: &Analysis) -> Accessibility {
    Accessibility {
        alt_text: analysis.alt_text.clone(),
        description: analysis.description.clone(),
        ..Default::default()
    }
}

fn technical_from(capture: &CaptureMetadata, dims: Dimensions) -> Technical {
    Technical {
        camera: capture.camera.clone(),
        lens: capture.lens.clone(),
        focal_length: capture.focal_length.clone(),
        aperture: capture.aperture.clone(),
        shutter_speed: capture.shutter_speed.clone(),
        iso: capture.iso,
        dimensions: Some(dims),
        ..Default::default()
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Album directory names under `albums_dir`, sorted.
pub fn discover_albums(albums_dir: &Path) -> Result<Vec<String>, std::io::Error> {
    let mut keys = Vec::new();
    for entry in walkdir::WalkDir::new(albums_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_hidden(&name) {
            keys.push(name);
        }
    }
    keys.sort();
    Ok(keys)
}

/// Supported image filenames directly inside `dir`, sorted. A missing
/// directory has no images.
pub fn list_source_images(dir: &Path) -> Result<Vec<String>, std::io::Error> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_hidden(&name) && is_supported_image(entry.path()) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}
