//! Masonry layout for the gallery front-end.
//!
//! [`engine`] is the pure placement pass; [`scheduler`] wraps it with the
//! per-item load state and frame coalescing a browser host needs. Natural
//! sizes for stored photos come from `technical.dimensions`.

mod engine;
mod scheduler;

pub use engine::{ItemState, Layout, LayoutConfig, Placement, column_metrics, compute_layout};
pub use scheduler::{Debouncer, MasonryGrid};

use crate::types::Photo;

/// Photos with recorded dimensions are measured; the rest are pending.
pub fn item_state(photo: &Photo) -> ItemState {
    match photo.dimensions() {
        Some(d) => ItemState::Measured {
            width: d.width,
            height: d.height,
        },
        None => ItemState::Pending,
    }
}

pub fn layout_photos<'a>(
    photos: impl IntoIterator<Item = &'a Photo>,
    container_width: f64,
    viewport_width: f64,
    config: &LayoutConfig,
) -> Layout {
    let items: Vec<ItemState> = photos.into_iter().map(item_state).collect();
    compute_layout(&items, container_width, viewport_width, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::photo;
    use crate::types::{Dimensions, Technical};

    #[test]
    fn photos_without_dimensions_are_pending() {
        let mut wide = photo("wide", "2024-01-01");
        wide.technical = Some(Technical {
            dimensions: Some(Dimensions {
                width: 1600,
                height: 900,
            }),
            ..Default::default()
        });
        let unknown = photo("unknown", "2024-01-01");

        assert!(item_state(&wide).is_landscape());
        assert_eq!(item_state(&unknown), ItemState::Pending);

        let layout = layout_photos([&wide, &unknown], 1000.0, 1200.0, &LayoutConfig::default());
        assert_eq!(layout.placements[0].span, 2);
        assert_eq!(layout.placements[1].height, 250.0);
    }
}
