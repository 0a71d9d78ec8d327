//! Naming rules shared by every pipeline command.
//!
//! Album keys are directory names (`street-photography`, `japan_2019`).
//! Titles, slugs and photo ids are all derived from those names and from
//! source filenames, so the rules live in one place:
//!
//! - `street-photography` → "Street Photography" (album title)
//! - `IMG_2041 (edit).JPG` → slug `img-2041-edit`, title "Img 2041 Edit"
//! - photo id → `street-photography-img-2041-edit-1700000000`

use std::path::Path;

/// Title-case the words of a key or filename stem.
///
/// Words are split on `-`, `_` and whitespace; empty words are dropped.
///
/// - `"street-photography"` → `"Street Photography"`
/// - `"japan_2019"` → `"Japan 2019"`
/// - `"new--york"` → `"New York"`
pub fn title_from_key(key: &str) -> String {
    key.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Title for a photo, from its original filename.
///
/// `"IMG_2041.jpg"` → `"Img 2041"`.
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let title = title_from_key(&stem);
    if title.is_empty() { stem } else { title }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run of characters
/// collapsed to a single dash, no leading or trailing dashes.
///
/// - `"IMG_2041 (edit)"` → `"img-2041-edit"`
/// - `"Café Noir"` → `"caf-noir"`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Normalized form of a source filename: the slug of its stem.
///
/// Two files that normalize the same way within one album get distinct ids
/// through the collision suffix in [`photo_id`].
pub fn normalize_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let slug = slugify(&stem);
    if slug.is_empty() {
        "photo".to_string()
    } else {
        slug
    }
}

/// Deterministic part of a photo id: album prefix plus normalized filename.
///
/// Import uses this to recognise files it has already imported, because the
/// full id also carries the run timestamp.
pub fn photo_key(album_key: &str, filename: &str) -> String {
    let prefix = slugify(album_key);
    let prefix = if prefix.is_empty() { "album" } else { &prefix };
    format!("{}-{}", prefix, normalize_filename(filename))
}

/// Full photo id: `<photo_key>-<suffix>`, with `-2`, `-3`, … appended while
/// `taken` reports a collision.
pub fn photo_id(album_key: &str, filename: &str, suffix: i64, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("{}-{}", photo_key(album_key, filename), suffix);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// Whether `id` was generated from `key` by [`photo_id`]: the rest must be
/// `-<ts>` or `-<ts>-<n>`.
///
/// A collision counter is never longer than the timestamp before it, so
/// `travel-dawn-2-1700000000` belongs to `dawn-2.jpg`, not `dawn.jpg`.
pub fn id_matches_key(id: &str, key: &str) -> bool {
    let Some(suffix) = id.strip_prefix(key).and_then(|rest| rest.strip_prefix('-')) else {
        return false;
    };
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    match suffix.split_once('-') {
        None => is_number(suffix),
        Some((ts, n)) => is_number(ts) && is_number(n) && n.len() <= ts.len(),
    }
}
