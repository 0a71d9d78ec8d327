//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `original` down so its width is at most `max_width`.
///
/// Aspect ratio is preserved and sources narrower than `max_width` are
/// returned unchanged; variants are never upscaled. Neither output edge
/// drops below one pixel.
///
/// ```text
/// (4000, 3000) at 600 → (600, 450)
/// (400, 300)   at 600 → (400, 300)
/// ```
pub fn fit_within_width(original: (u32, u32), max_width: u32) -> (u32, u32) {
    let (w, h) = original;
    if w <= max_width || w == 0 {
        return (w.max(1), h.max(1));
    }
    let ratio = max_width as f64 / w as f64;
    let height = (h as f64 * ratio).round() as u32;
    (max_width.max(1), height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scaled_to_width() {
        assert_eq!(fit_within_width((4000, 3000), 600), (600, 450));
    }

    #[test]
    fn portrait_scaled_to_width() {
        assert_eq!(fit_within_width((3000, 4500), 2000), (2000, 3000));
    }

    #[test]
    fn small_source_not_upscaled() {
        assert_eq!(fit_within_width((400, 300), 600), (400, 300));
    }

    #[test]
    fn exact_width_untouched() {
        assert_eq!(fit_within_width((600, 900), 600), (600, 900));
    }

    #[test]
    fn rounding_to_nearest_pixel() {
        // 1000x333 at 300 → 99.9 → 100
        assert_eq!(fit_within_width((1000, 333), 300), (300, 100));
    }

    #[test]
    fn extreme_panorama_keeps_one_pixel() {
        assert_eq!(fit_within_width((10000, 1), 100), (100, 1));
    }
}
