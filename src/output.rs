//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Entities lead with their semantic identity (positional index and title,
//! or album key) and show filesystem paths as indented context lines. A plan
//! printed before confirmation reads as an inventory of what will change.
//!
//! # Output Format
//!
//! ## Import
//!
//! ```text
//! Travel (3 new, 12 existing)
//!     001 Harbor At Dusk
//!         Source: harbor.jpg
//!         Id: travel-harbor-1718000000
//!     002 (broken.jpg)
//!         Failed: decode error
//!
//! Imported 2 photos, updated 0, skipped 12, 1 error
//! ```
//!
//! ## Sync
//!
//! ```text
//! Renames
//!     summer-trip → summer-trip-2024 (only unmatched pair)
//! Ambiguous
//!     old-city: city-north, city-south (50% word overlap)
//!         Resolve with --rename old-city=NEW
//! ```
//!
//! ## Cleanup
//!
//! ```text
//! Albums to remove
//!     001 old-album (4 photos)
//!         thumbnails/old-album/old-album-a-1.jpg
//! Photos to remove
//!     001 travel/travel-b-2 (b.jpg)
//!
//! 1 album, 1 photo, 3 files
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cleanup::{CleanupPlan, CleanupReport};
use crate::import::{ImportEvent, ImportReport};
use crate::layout::{Layout, Placement};
use crate::sync::{SyncPlan, SyncReport};
use crate::types::Photo;
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional count.
///
/// ```text
/// 001 travel (5 photos)
/// 001 travel
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({})", format_index(index), title, plural(n, "photo")),
        None => format!("{} {}", format_index(index), title),
    }
}

/// Format an image line: titled images show title, untitled show filename in parens.
///
/// ```text
/// 001 The Sunset        // titled
/// 001 (IMG_0042.jpg)    // untitled, the filename is the identity
/// ```
fn image_line(index: usize, title: Option<&str>, filename: &str) -> String {
    match title {
        Some(t) if !t.is_empty() => format!("{} {}", format_index(index), t),
        _ => format!("{} ({})", format_index(index), filename),
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Show a path relative to the site root when it lies inside it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Import
// ============================================================================

/// Format a single import progress event as display lines.
pub fn format_import_event(event: &ImportEvent) -> Vec<String> {
    match event {
        ImportEvent::AlbumStarted {
            title,
            new_photos,
            existing,
            ..
        } => vec![format!(
            "{} ({} new, {} existing)",
            title, new_photos, existing
        )],
        ImportEvent::PhotoImported {
            index,
            title,
            filename,
            id,
        } => vec![
            format!("{}{}", indent(1), image_line(*index, Some(title.as_str()), filename)),
            format!("{}Source: {}", indent(2), filename),
            format!("{}Id: {}", indent(2), id),
        ],
        ImportEvent::PhotoEnhanced { id, fields } => vec![format!(
            "{}{}: added {}",
            indent(1),
            id,
            fields.join(", ")
        )],
        ImportEvent::PhotoFailed { filename, error } => vec![
            format!("{}({})", indent(1), filename),
            format!("{}Failed: {}", indent(2), error),
        ],
        ImportEvent::AlbumFailed { key, error } => vec![
            key.clone(),
            format!("{}Skipped album: {}", indent(1), error),
        ],
        ImportEvent::Interrupted => {
            vec!["Interrupted, saving completed photos".to_string()]
        }
    }
}

pub fn format_import_summary(report: &ImportReport) -> Vec<String> {
    let stats = &report.stats;
    let mut lines = vec![String::new()];
    if !report.created_albums.is_empty() {
        lines.push(format!(
            "Created {}: {}",
            plural(report.created_albums.len(), "album"),
            report.created_albums.join(", ")
        ));
    }
    lines.push(format!(
        "Imported {}, updated {}, skipped {}, {}",
        plural(stats.processed, "photo"),
        stats.updated,
        stats.skipped,
        plural(stats.errors, "error")
    ));
    if report.interrupted {
        lines.push("Import was interrupted; run it again to continue".to_string());
    }
    lines
}

pub fn print_import_event(event: &ImportEvent) {
    print_lines(format_import_event(event));
}

pub fn print_import_summary(report: &ImportReport) {
    print_lines(format_import_summary(report));
}

// ============================================================================
// Sync
// ============================================================================

pub fn format_sync_plan(plan: &SyncPlan) -> Vec<String> {
    if plan.is_clean() {
        return vec![format!(
            "In sync ({} matched)",
            plural(plan.in_sync, "album")
        )];
    }

    let mut lines = Vec::new();
    if !plan.renames.is_empty() {
        lines.push("Renames".to_string());
        for r in &plan.renames {
            lines.push(format!(
                "{}{} \u{2192} {} ({})",
                indent(1),
                r.from,
                r.to,
                r.reason
            ));
        }
    }
    if !plan.ambiguous.is_empty() {
        lines.push("Ambiguous".to_string());
        for a in &plan.ambiguous {
            lines.push(format!(
                "{}{}: {} ({:.0}% word overlap)",
                indent(1),
                a.from,
                a.candidates.join(", "),
                a.score * 100.0
            ));
            lines.push(format!(
                "{}Resolve with --rename {}=NEW",
                indent(2),
                a.from
            ));
        }
    }
    if !plan.missing_directory.is_empty() {
        lines.push("Missing directory (run cleanup to remove)".to_string());
        for key in &plan.missing_directory {
            lines.push(format!("{}{}", indent(1), key));
        }
    }
    if !plan.missing_json.is_empty() {
        lines.push("Not in document (run import to add)".to_string());
        for key in &plan.missing_json {
            lines.push(format!("{}{}", indent(1), key));
        }
    }
    lines.push(format!("{} already in sync", plural(plan.in_sync, "album")));
    lines
}

pub fn format_sync_applied(report: &SyncReport, root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Renamed {}", plural(report.renamed.len(), "album"))];
    for m in &report.moved {
        lines.push(format!(
            "{}{} \u{2192} {}",
            indent(1),
            display_path(&m.from, root),
            display_path(&m.to, root)
        ));
    }
    if !report.failed.is_empty() {
        lines.push("Not renamed (left as they were)".to_string());
        for f in &report.failed {
            lines.push(format!("{}{} \u{2192} {}", indent(1), f.from, f.to));
            lines.push(format!("{}{}", indent(2), f.error));
        }
    }
    lines
}

pub fn print_sync_plan(plan: &SyncPlan) {
    print_lines(format_sync_plan(plan));
}

pub fn print_sync_applied(report: &SyncReport, root: &Path) {
    print_lines(format_sync_applied(report, root));
}

// ============================================================================
// Cleanup
// ============================================================================

pub fn format_cleanup_plan(plan: &CleanupPlan, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if !plan.orphan_albums.is_empty() {
        lines.push("Albums to remove".to_string());
        for (i, album) in plan.orphan_albums.iter().enumerate() {
            lines.push(format!(
                "{}{}",
                indent(1),
                entity_header(i + 1, &album.key, Some(album.photo_count))
            ));
            for path in &album.derived {
                lines.push(format!("{}{}", indent(2), display_path(path, root)));
            }
        }
    }

    if !plan.orphan_photos.is_empty() {
        lines.push("Photos to remove".to_string());
        for (i, photo) in plan.orphan_photos.iter().enumerate() {
            lines.push(format!(
                "{}{} {}/{} ({})",
                indent(1),
                format_index(i + 1),
                photo.album,
                photo.id,
                photo.original_filename
            ));
            for path in &photo.derived {
                lines.push(format!("{}{}", indent(2), display_path(path, root)));
            }
        }
    }

    if !plan.import_candidates.is_empty() {
        lines.push("Not in document (run import to add)".to_string());
        for c in &plan.import_candidates {
            lines.push(format!(
                "{}{} ({})",
                indent(1),
                c.key,
                plural(c.image_count, "image")
            ));
        }
    }

    if plan.unverifiable > 0 {
        lines.push(format!(
            "Kept {} without originalFilename",
            plural(plan.unverifiable, "photo")
        ));
    }

    if plan.is_empty() {
        lines.push("Nothing to clean up".to_string());
    } else {
        lines.push(String::new());
        lines.push(format!(
            "{}, {}, {}",
            plural(plan.orphan_albums.len(), "album"),
            plural(plan.orphan_photos.len(), "photo"),
            plural(plan.derived_file_count(), "file")
        ));
    }
    lines
}

pub fn format_cleanup_report(report: &CleanupReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Removed {}, {}",
        plural(report.albums_removed, "album"),
        plural(report.photos_removed, "photo")
    )];
    let dirs = if report.dirs_removed == 1 {
        "directory"
    } else {
        "directories"
    };
    lines.push(format!(
        "Deleted {}, {} empty {}",
        plural(report.files_deleted, "file"),
        report.dirs_removed,
        dirs
    ));
    if report.files_failed > 0 {
        lines.push(format!(
            "{} could not be deleted",
            plural(report.files_failed, "file")
        ));
    }
    lines
}

pub fn print_cleanup_plan(plan: &CleanupPlan, root: &Path) {
    print_lines(format_cleanup_plan(plan, root));
}

pub fn print_cleanup_report(report: &CleanupReport) {
    print_lines(format_cleanup_report(report));
}

// ============================================================================
// Reorder
// ============================================================================

/// Listing shown at the reorder prompt.
///
/// ```text
/// travel (3 photos)
///     001 Harbor At Dusk  #1  2024-05-01
///     002 (IMG_0042.jpg)  2023-11-14
/// ```
pub fn format_reorder_listing(key: &str, images: &[Photo]) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", key, plural(images.len(), "photo"))];
    for (i, photo) in images.iter().enumerate() {
        let filename = photo.original_filename().unwrap_or(&photo.id);
        let mut line = format!("{}{}", indent(1), image_line(i + 1, Some(photo.title.as_str()), filename));
        if let Some(order) = photo.order {
            line.push_str(&format!("  #{}", order));
        }
        if !photo.date.is_empty() {
            line.push_str(&format!("  {}", photo.date));
        }
        lines.push(line);
    }
    lines
}

// ============================================================================
// Layout
// ============================================================================

#[derive(Serialize)]
struct PlacedPhoto<'a> {
    album: &'a str,
    id: &'a str,
    #[serde(flatten)]
    placement: &'a Placement,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOutput<'a> {
    container_width: f64,
    viewport_width: f64,
    column_count: usize,
    column_width: f64,
    wide_eligible: bool,
    height: f64,
    items: Vec<PlacedPhoto<'a>>,
}

/// Placements as pretty JSON, one entry per `(album key, photo)` in order.
pub fn format_layout_json(
    photos: &[(&str, &Photo)],
    layout: &Layout,
    container_width: f64,
    viewport_width: f64,
) -> Result<String, serde_json::Error> {
    let items = photos
        .iter()
        .zip(&layout.placements)
        .map(|(&(album, photo), placement)| PlacedPhoto {
            album,
            id: &photo.id,
            placement,
        })
        .collect();
    serde_json::to_string_pretty(&LayoutOutput {
        container_width,
        viewport_width,
        column_count: layout.column_count,
        column_width: layout.column_width,
        wide_eligible: layout.wide_eligible,
        height: layout.height,
        items,
    })
}

// ============================================================================
// Tests
// ============================================================================
