//! # Folio
//!
//! Tooling for a photography portfolio whose browser front-end renders a
//! single JSON document, `albums.json`. The document maps album keys to
//! albums and their photos; album directories under `albums/` hold the source
//! images. This crate keeps the two in step and ships the masonry layout the
//! front-end uses to arrange photo cards.
//!
//! # Architecture: Plan, Then Apply
//!
//! Every reconciliation command has the same shape:
//!
//! ```text
//! load albums.json → plan against albums/ → show plan → apply → save albums.json
//! ```
//!
//! - **Planning is pure** over the document and a directory listing, so the
//!   `--dry-run` output is exactly what apply would do.
//! - **Apply mutates the in-memory document** only. Persistence happens once,
//!   at the CLI boundary, through an atomic rename.
//! - **The document is the contract.** Unknown fields on albums and photos
//!   survive a load/save cycle untouched.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Ordered album map, load/save, display ordering |
//! | [`types`] | Album and photo records as stored in the document |
//! | [`naming`] | Titles, slugs and collision-free photo ids |
//! | [`config`] | `folio.toml` loading over stock defaults, site paths |
//! | [`imaging`] | Image backend trait, resize variants, EXIF capture metadata |
//! | [`analysis`] | Scene analysis (alt text, description, tags) via a local vision model |
//! | [`import`] | Add new source images: variants, metadata, analysis |
//! | [`sync`] | Detect renamed album directories and carry data over |
//! | [`cleanup`] | Remove entries whose sources are gone, with their derived files |
//! | [`reorder`] | Interactive manual ordering of one album |
//! | [`layout`] | Masonry placement and frame scheduling |
//! | [`output`] | CLI output formatting for every command |
//!
//! # Design Decisions
//!
//! ## Derived Files Are Disposable, Sources Are Not
//!
//! Cleanup only ever deletes files inside the generated `thumbnails/` and
//! `full/` trees, and only for photos that carry an `originalFilename` it can
//! verify against. Anything it cannot prove orphaned is kept.
//!
//! ## Analysis Never Blocks an Import
//!
//! The vision model is optional. When it is disabled, unreachable, or returns
//! something unusable, the photo is still imported with the fixed alt text
//! `"Photograph"`, and a later import run fills in the missing fields.

pub mod analysis;
pub mod cleanup;
pub mod config;
pub mod document;
pub mod imaging;
pub mod import;
pub mod layout;
pub mod naming;
pub mod output;
pub mod reorder;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
