//! Sync: detect renamed album directories.
//!
//! Compares the document's album keys with the directories under `albums/`.
//! A key without a directory is an *orphan*; a directory without a key is
//! *new*. An orphan and a new directory are paired as a rename when:
//!
//! 1. **Cardinality**: there is exactly one orphan and exactly one new
//!    directory, and the document has as many albums as there are
//!    directories.
//! 2. **Word overlap**: otherwise, the orphan's significant words overlap
//!    a new directory's by more than `sync.similarity_threshold`.
//!
//! When several directories tie for the best overlap, nothing is picked:
//! the orphan is reported as ambiguous and the operator resolves it with an
//! explicit `OLD=NEW` rename.
//!
//! Applying a rename moves `thumbnails/OLD` and `full/OLD` along, then
//! re-keys the album in place, regenerates its title from the new key and
//! rewrites the old key's path segment in every `thumbnail`, `full` and
//! `cover`. A rename whose moves fail is rolled back and reported; the
//! others still apply.
//!
//! ```text
//! albums.json: street, japan-trip      albums/: street, japan-trip-2019
//!                                      → rename japan-trip → japan-trip-2019
//! ```

use crate::config::SitePaths;
use crate::document::Document;
use crate::naming::title_from_key;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid rename {0}: {1}")]
    InvalidRename(String, String),
    #[error("Album '{0}' is not in the document")]
    UnknownAlbum(String),
    #[error("Album '{0}' already exists")]
    TargetExists(String),
    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Operator-supplied rename, parsed from `OLD=NEW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOverride {
    pub from: String,
    pub to: String,
}

impl FromStr for RenameOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once('=')
            .ok_or_else(|| format!("expected OLD=NEW, got '{s}'"))?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() || from == to {
            return Err(format!("expected two different album names, got '{s}'"));
        }
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenameReason {
    /// One orphan, one new directory, equal totals.
    Cardinality,
    /// Word overlap score above the threshold.
    Similarity(f64),
    /// Given on the command line.
    Operator,
}

impl fmt::Display for RenameReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameReason::Cardinality => write!(f, "only unmatched pair"),
            RenameReason::Similarity(score) => write!(f, "{:.0}% word overlap", score * 100.0),
            RenameReason::Operator => write!(f, "confirmed by operator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rename {
    pub from: String,
    pub to: String,
    pub reason: RenameReason,
}

/// An orphan with several equally plausible new directories.
#[derive(Debug, Clone, PartialEq)]
pub struct Ambiguity {
    pub from: String,
    pub candidates: Vec<String>,
    pub score: f64,
}

/// Differences between the document and the albums directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub renames: Vec<Rename>,
    pub ambiguous: Vec<Ambiguity>,
    /// Keys whose directory is gone with no rename candidate.
    pub missing_directory: Vec<String>,
    /// Directories with no key and no rename claim. Import creates them.
    pub missing_json: Vec<String>,
    /// Keys that match a directory exactly.
    pub in_sync: usize,
}

impl SyncPlan {
    pub fn is_clean(&self) -> bool {
        self.renames.is_empty()
            && self.ambiguous.is_empty()
            && self.missing_directory.is_empty()
            && self.missing_json.is_empty()
    }
}

/// Lowercased words of at least three characters, split on `-`, `_` and
/// whitespace.
pub fn significant_words(name: &str) -> HashSet<String> {
    name.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Share of significant words two names have in common, relative to the
/// larger word set. 0.0 when either name has no significant words.
///
/// `japan-trip` vs `japan-trip-2019` → 2 shared / 3 = 0.67
pub fn similarity(a: &str, b: &str) -> f64 {
    let (wa, wb) = (significant_words(a), significant_words(b));
    let larger = wa.len().max(wb.len());
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / larger as f64
}

/// Work out renames, ambiguities and missing entries. Pure: reads the
/// document and a directory listing, touches nothing.
pub fn plan_sync(
    doc: &Document,
    directories: &[String],
    overrides: &[RenameOverride],
    threshold: f64,
) -> Result<SyncPlan, SyncError> {
    let dir_set: HashSet<&str> = directories.iter().map(String::as_str).collect();
    let mut plan = SyncPlan::default();

    let mut orphans: Vec<String> = Vec::new();
    for key in doc.keys() {
        if dir_set.contains(key) {
            plan.in_sync += 1;
        } else {
            orphans.push(key.to_string());
        }
    }
    let mut new_dirs: Vec<String> = directories
        .iter()
        .filter(|d| !doc.contains(d))
        .cloned()
        .collect();
    new_dirs.sort();

    for o in overrides {
        let from_pos = orphans.iter().position(|k| *k == o.from).ok_or_else(|| {
            SyncError::InvalidRename(
                format!("{}={}", o.from, o.to),
                format!("'{}' is not an album without a directory", o.from),
            )
        })?;
        let to_pos = new_dirs.iter().position(|d| *d == o.to).ok_or_else(|| {
            SyncError::InvalidRename(
                format!("{}={}", o.from, o.to),
                format!("'{}' is not a directory without an album", o.to),
            )
        })?;
        orphans.remove(from_pos);
        new_dirs.remove(to_pos);
        plan.renames.push(Rename {
            from: o.from.clone(),
            to: o.to.clone(),
            reason: RenameReason::Operator,
        });
    }

    if orphans.len() == 1 && new_dirs.len() == 1 && doc.len() == directories.len() {
        plan.renames.push(Rename {
            from: orphans.remove(0),
            to: new_dirs.remove(0),
            reason: RenameReason::Cardinality,
        });
    }

    for orphan in orphans {
        let scored: Vec<(f64, &String)> = new_dirs
            .iter()
            .map(|d| (similarity(&orphan, d), d))
            .collect();
        let best = scored.iter().map(|(s, _)| *s).fold(0.0_f64, f64::max);

        if best <= threshold {
            plan.missing_directory.push(orphan);
            continue;
        }

        let top: Vec<String> = scored
            .iter()
            .filter(|(s, _)| (best - s).abs() < f64::EPSILON)
            .map(|(_, d)| (*d).clone())
            .collect();

        if let [only] = top.as_slice() {
            debug!(from = %orphan, to = %only, score = best, "rename by word overlap");
            new_dirs.retain(|d| d != only);
            plan.renames.push(Rename {
                from: orphan,
                to: only.clone(),
                reason: RenameReason::Similarity(best),
            });
        } else {
            plan.ambiguous.push(Ambiguity {
                from: orphan,
                candidates: top,
                score: best,
            });
        }
    }

    plan.missing_json = new_dirs;
    Ok(plan)
}

/// Replace every path segment equal to `from` with `to`.
///
/// `thumbnails/japan/x.jpg` with `japan` → `tokyo` gives
/// `thumbnails/tokyo/x.jpg`; `thumbnails/japan-2/x.jpg` is unchanged.
pub fn rewrite_segment(path: &str, from: &str, to: &str) -> String {
    path.split('/')
        .map(|segment| if segment == from { to } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Re-key one album and rewrite its paths. Document only.
pub fn rename_album(doc: &mut Document, from: &str, to: &str) -> Result<(), SyncError> {
    if !doc.contains(from) {
        return Err(SyncError::UnknownAlbum(from.to_string()));
    }
    if !doc.rename(from, to) {
        return Err(SyncError::TargetExists(to.to_string()));
    }
    if let Some(album) = doc.get_mut(to) {
        album.title = title_from_key(to);
        album.cover = rewrite_segment(&album.cover, from, to);
        for photo in &mut album.images {
            photo.thumbnail = rewrite_segment(&photo.thumbnail, from, to);
            photo.full = rewrite_segment(&photo.full, from, to);
        }
    }
    Ok(())
}

/// A derived directory moved alongside a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedDir {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Move `thumbnails/<from>` and `full/<from>` to the new key. Directories
/// that do not exist are skipped; an existing target is left alone.
///
/// All or nothing: if one move fails, the moves already made are undone
/// before the error is returned.
pub fn move_derived_dirs(
    paths: &SitePaths,
    from: &str,
    to: &str,
) -> Result<Vec<MovedDir>, SyncError> {
    let mut moved: Vec<MovedDir> = Vec::new();
    for base in [&paths.thumbnails, &paths.full] {
        let src = base.join(from);
        let dst = base.join(to);
        if !src.is_dir() {
            continue;
        }
        if dst.exists() {
            warn!(from = %src.display(), to = %dst.display(), "target exists, not moving");
            continue;
        }
        if let Err(source) = std::fs::rename(&src, &dst) {
            undo_moves(&moved);
            return Err(SyncError::Move {
                from: src,
                to: dst,
                source,
            });
        }
        moved.push(MovedDir { from: src, to: dst });
    }
    Ok(moved)
}

fn undo_moves(moved: &[MovedDir]) {
    for m in moved.iter().rev() {
        if let Err(e) = std::fs::rename(&m.to, &m.from) {
            error!(
                from = %m.to.display(),
                to = %m.from.display(),
                error = %e,
                "could not undo move; derived files are out of place"
            );
        }
    }
}

/// A planned rename that was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRename {
    pub from: String,
    pub to: String,
    pub error: String,
}

/// What applying a plan actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// `(from, to)` keys re-keyed in the document.
    pub renamed: Vec<(String, String)>,
    pub moved: Vec<MovedDir>,
    pub failed: Vec<FailedRename>,
}

/// Apply one rename: derived directories first, then the document, so the
/// document only changes once its files are in place.
fn apply_rename(
    doc: &mut Document,
    paths: &SitePaths,
    from: &str,
    to: &str,
) -> Result<Vec<MovedDir>, SyncError> {
    if !doc.contains(from) {
        return Err(SyncError::UnknownAlbum(from.to_string()));
    }
    if doc.contains(to) {
        return Err(SyncError::TargetExists(to.to_string()));
    }
    let moved = move_derived_dirs(paths, from, to)?;
    if let Err(e) = rename_album(doc, from, to) {
        undo_moves(&moved);
        return Err(e);
    }
    Ok(moved)
}

/// Apply every rename in the plan to the document and the derived
/// directories. Ambiguities and missing entries are report-only.
///
/// A rename that fails leaves its album untouched on disk and in the
/// document; the remaining renames still run, so the document can always be
/// saved afterwards.
pub fn apply_sync(doc: &mut Document, plan: &SyncPlan, paths: &SitePaths) -> SyncReport {
    let mut report = SyncReport::default();
    for rename in &plan.renames {
        match apply_rename(doc, paths, &rename.from, &rename.to) {
            Ok(moved) => {
                report.moved.extend(moved);
                report.renamed.push((rename.from.clone(), rename.to.clone()));
            }
            Err(e) => {
                warn!(from = %rename.from, to = %rename.to, error = %e, "rename not applied");
                report.failed.push(FailedRename {
                    from: rename.from.clone(),
                    to: rename.to.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestSite, album_with, imported_photo};

    fn dirs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn doc_with(keys: &[&str]) -> Document {
        let mut doc = Document::new();
        for key in keys {
            doc.insert(*key, album_with(&title_from_key(key), vec![]));
        }
        doc
    }

    fn two_photo_doc() -> Document {
        let mut doc = Document::new();
        doc.insert(
            "A",
            album_with(
                "A",
                vec![
                    imported_photo("A", "a-one-1", "one.jpg"),
                    imported_photo("A", "a-two-1", "two.jpg"),
                ],
            ),
        );
        doc.insert(
            "other",
            album_with("Other", vec![imported_photo("other", "o-1", "o.jpg")]),
        );
        doc
    }

    #[test]
    fn word_overlap_scores() {
        assert!((similarity("japan-trip", "japan-trip-2019") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(similarity("street", "street"), 1.0);
        assert_eq!(similarity("a-b", "a-b"), 0.0);
        assert_eq!(similarity("Summer_Holiday", "summer holiday"), 1.0);
    }

    #[test]
    fn override_parsing() {
        let o: RenameOverride = "old=new".parse().unwrap();
        assert_eq!(o.from, "old");
        assert_eq!(o.to, "new");
        assert!("old".parse::<RenameOverride>().is_err());
        assert!("same=same".parse::<RenameOverride>().is_err());
        assert!("=new".parse::<RenameOverride>().is_err());
    }

    #[test]
    fn single_unmatched_pair_is_a_rename() {
        let doc = doc_with(&["street", "holiday"]);
        let plan = plan_sync(&doc, &dirs(&["street", "xmas-2020"]), &[], 0.5).unwrap();
        assert_eq!(
            plan.renames,
            vec![Rename {
                from: "holiday".into(),
                to: "xmas-2020".into(),
                reason: RenameReason::Cardinality,
            }]
        );
        assert_eq!(plan.in_sync, 1);
        assert!(plan.missing_directory.is_empty());
        assert!(plan.missing_json.is_empty());
    }

    #[test]
    fn unequal_totals_fall_back_to_word_overlap() {
        let doc = doc_with(&["japan-trip", "street"]);
        let plan = plan_sync(
            &doc,
            &dirs(&["street", "japan-trip-2019", "portraits"]),
            &[],
            0.5,
        )
        .unwrap();
        assert_eq!(plan.renames.len(), 1);
        assert_eq!(plan.renames[0].to, "japan-trip-2019");
        assert!(matches!(plan.renames[0].reason, RenameReason::Similarity(_)));
        assert_eq!(plan.missing_json, vec!["portraits"]);
    }

    #[test]
    fn low_overlap_is_missing_directory() {
        let doc = doc_with(&["old-stuff", "street"]);
        let plan = plan_sync(&doc, &dirs(&["street", "new-things", "more"]), &[], 0.5).unwrap();
        assert!(plan.renames.is_empty());
        assert_eq!(plan.missing_directory, vec!["old-stuff"]);
        assert_eq!(plan.missing_json, vec!["more", "new-things"]);
    }

    #[test]
    fn tied_candidates_are_ambiguous() {
        let doc = doc_with(&["trip-japan"]);
        let plan = plan_sync(
            &doc,
            &dirs(&["trip-japan-2019", "trip-japan-2020"]),
            &[],
            0.5,
        )
        .unwrap();
        assert!(plan.renames.is_empty());
        assert_eq!(plan.ambiguous.len(), 1);
        assert_eq!(
            plan.ambiguous[0].candidates,
            vec!["trip-japan-2019", "trip-japan-2020"]
        );
        assert_eq!(plan.missing_json.len(), 2);
        assert!(!plan.is_clean());
    }

    #[test]
    fn operator_override_resolves_ambiguity() {
        let doc = doc_with(&["trip-japan"]);
        let overrides = vec!["trip-japan=trip-japan-2020".parse().unwrap()];
        let plan = plan_sync(
            &doc,
            &dirs(&["trip-japan-2019", "trip-japan-2020"]),
            &overrides,
            0.5,
        )
        .unwrap();
        assert_eq!(plan.renames.len(), 1);
        assert_eq!(plan.renames[0].reason, RenameReason::Operator);
        assert!(plan.ambiguous.is_empty());
        assert_eq!(plan.missing_json, vec!["trip-japan-2019"]);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let doc = doc_with(&["street"]);
        let overrides = vec!["street=elsewhere".parse().unwrap()];
        let result = plan_sync(&doc, &dirs(&["street", "elsewhere"]), &overrides, 0.5);
        assert!(matches!(result, Err(SyncError::InvalidRename(..))));
    }

    #[test]
    fn in_sync_document_is_clean() {
        let doc = doc_with(&["a-album", "b-album"]);
        let plan = plan_sync(&doc, &dirs(&["b-album", "a-album"]), &[], 0.5).unwrap();
        assert!(plan.is_clean());
        assert_eq!(plan.in_sync, 2);
    }

    #[test]
    fn segment_rewrite_is_exact() {
        assert_eq!(rewrite_segment("thumbnails/A/x.jpg", "A", "B"), "thumbnails/B/x.jpg");
        assert_eq!(rewrite_segment("thumbnails/AA/x.jpg", "A", "B"), "thumbnails/AA/x.jpg");
        assert_eq!(rewrite_segment("", "A", "B"), "");
    }

    #[test]
    fn rename_round_trip() {
        let site = TestSite::new();
        let mut doc = two_photo_doc();
        site.add_derived_for(&doc);
        site.add_album_dir("B");
        site.add_album_dir("other");
        let before_other = doc.get("other").cloned();

        let plan = plan_sync(&doc, &dirs(&["B", "other"]), &[], 0.5).unwrap();
        let report = apply_sync(&mut doc, &plan, &site.paths);

        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["B", "other"]);
        let album = doc.get("B").unwrap();
        assert_eq!(album.title, "B");
        assert_eq!(album.cover, "thumbnails/B/a-one-1.jpg");
        for photo in &album.images {
            assert!(photo.thumbnail.contains("/B/"), "{}", photo.thumbnail);
            assert!(photo.full.contains("/B/"), "{}", photo.full);
            assert!(site.exists(&photo.thumbnail));
            assert!(site.exists(&photo.full));
        }
        assert_eq!(doc.get("other").cloned(), before_other);
        assert_eq!(report.moved.len(), 2);
        assert_eq!(report.renamed, vec![("A".to_string(), "B".to_string())]);
        assert!(report.failed.is_empty());
        assert!(!site.paths.thumbnails.join("A").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_move_leaves_album_untouched_and_others_continue() {
        let site = TestSite::new();
        let mut doc = two_photo_doc();
        site.add_derived_for(&doc);
        site.add_album_dir("B");
        site.add_album_dir("elsewhere");
        // thumbnails/A moves fine; full/A cannot replace a dangling link.
        std::os::unix::fs::symlink(site.root().join("nowhere"), site.paths.full.join("B"))
            .unwrap();
        let before_a = doc.get("A").cloned();

        let overrides = vec!["A=B".parse().unwrap(), "other=elsewhere".parse().unwrap()];
        let plan = plan_sync(&doc, &dirs(&["B", "elsewhere"]), &overrides, 0.5).unwrap();
        assert_eq!(plan.renames.len(), 2);
        let report = apply_sync(&mut doc, &plan, &site.paths);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].from, "A");
        assert_eq!(doc.get("A").cloned(), before_a);
        assert!(site.paths.thumbnails.join("A").is_dir());
        assert!(!site.paths.thumbnails.join("B").exists());
        for photo in &doc.get("A").unwrap().images {
            assert!(site.exists(&photo.thumbnail));
            assert!(site.exists(&photo.full));
        }

        assert_eq!(
            report.renamed,
            vec![("other".to_string(), "elsewhere".to_string())]
        );
        let moved_album = doc.get("elsewhere").unwrap();
        assert!(site.exists(&moved_album.images[0].thumbnail));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["A", "elsewhere"]);
    }

    #[test]
    fn rename_refuses_existing_key() {
        let mut doc = doc_with(&["a-album", "b-album"]);
        assert!(matches!(
            rename_album(&mut doc, "a-album", "b-album"),
            Err(SyncError::TargetExists(_))
        ));
        assert!(matches!(
            rename_album(&mut doc, "zzz", "yyy"),
            Err(SyncError::UnknownAlbum(_))
        ));
    }
}
