//! Masonry placement.
//!
//! Greedy, single pass, O(items × columns). Each item goes into the column
//! (or pair of adjacent columns, for landscape items on wide screens) whose
//! current height is lowest, first index winning ties. Tie-breaks and the
//! 150–600px height clamp are part of the visual contract with the
//! front-end and must not drift.

use crate::config::LayoutSettings;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub column_target_width: f64,
    pub gutter: f64,
    pub desktop_breakpoint: f64,
    pub min_item_height: f64,
    pub max_item_height: f64,
    pub default_item_height: f64,
    pub resize_debounce: Duration,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::from(&LayoutSettings::default())
    }
}

impl From<&LayoutSettings> for LayoutConfig {
    fn from(s: &LayoutSettings) -> Self {
        Self {
            column_target_width: s.column_target_width,
            gutter: s.gutter,
            desktop_breakpoint: s.desktop_breakpoint,
            min_item_height: s.min_item_height,
            max_item_height: s.max_item_height,
            default_item_height: s.default_item_height,
            resize_debounce: Duration::from_millis(s.resize_debounce_ms),
        }
    }
}

/// What is known about an item's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
    /// Not loaded yet; laid out at the default height.
    #[default]
    Pending,
    /// Natural pixel size known.
    Measured { width: u32, height: u32 },
    /// Failed to load; keeps the default height for good.
    Failed,
}

impl ItemState {
    pub fn is_landscape(self) -> bool {
        matches!(self, ItemState::Measured { width, height } if width > height)
    }
}

/// One placed item, in container coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub column: usize,
    pub span: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of one layout pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub column_count: usize,
    pub column_width: f64,
    pub wide_eligible: bool,
    pub placements: Vec<Placement>,
    /// Tallest column, gutter included.
    pub height: f64,
}

impl Layout {
    pub fn empty() -> Self {
        Self {
            column_count: 1,
            column_width: 0.0,
            wide_eligible: false,
            placements: Vec::new(),
            height: 0.0,
        }
    }
}

/// Upper bound on the column count, whatever the container width.
pub const MAX_COLUMNS: usize = 1024;

/// Column count and stretched column width for an available width.
///
/// ```text
/// 1000px, target 300, gutter 16 → floor(1000 / 316) = 3 columns
///                                  (1000 - 2·16) / 3 = 322.67px each
/// ```
///
/// The count is capped at [`MAX_COLUMNS`].
pub fn column_metrics(available: f64, config: &LayoutConfig) -> (usize, f64) {
    let stride = config.column_target_width + config.gutter;
    let count = if stride > 0.0 && available.is_finite() {
        ((available / stride).floor() as usize).clamp(1, MAX_COLUMNS)
    } else {
        1
    };
    let width = (available - (count - 1) as f64 * config.gutter) / count as f64;
    (count, width)
}

fn item_height(state: ItemState, width: f64, config: &LayoutConfig) -> f64 {
    match state {
        ItemState::Measured { width: w, height: h } if w > 0 => {
            (width * h as f64 / w as f64).clamp(config.min_item_height, config.max_item_height)
        }
        _ => config.default_item_height,
    }
}

/// First column (or start of a `span`-wide run) with the lowest height.
/// Returns the start index and the height the item sits at.
fn pick_columns(heights: &[f64], span: usize) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for start in 0..=heights.len() - span {
        let top = heights[start..start + span]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if top < best.1 {
            best = (start, top);
        }
    }
    best
}

/// Lay out `items` in order.
///
/// A container with no usable width (zero, negative, NaN, infinite) gives one column
/// with every item at the default height; there is no error path.
pub fn compute_layout(
    items: &[ItemState],
    container_width: f64,
    viewport_width: f64,
    config: &LayoutConfig,
) -> Layout {
    let degenerate = !container_width.is_finite() || container_width <= 0.0;
    let (column_count, column_width) = if degenerate {
        (1, 0.0)
    } else {
        column_metrics(container_width, config)
    };
    let wide_eligible = column_count >= 2 && viewport_width >= config.desktop_breakpoint;

    let mut heights = vec![0.0_f64; column_count];
    let mut placements = Vec::with_capacity(items.len());

    for &state in items {
        let span = if wide_eligible && state.is_landscape() {
            2.min(column_count)
        } else {
            1
        };
        let (column, y) = pick_columns(&heights, span);
        let width = span as f64 * column_width + (span - 1) as f64 * config.gutter;
        let height = if degenerate {
            config.default_item_height
        } else {
            item_height(state, width, config)
        };

        for h in &mut heights[column..column + span] {
            *h = y + height + config.gutter;
        }
        placements.push(Placement {
            column,
            span,
            x: column as f64 * (column_width + config.gutter),
            y,
            width,
            height,
        });
    }

    Layout {
        column_count,
        column_width,
        wide_eligible,
        placements,
        height: heights.iter().copied().fold(0.0, f64::max),
    }
}
