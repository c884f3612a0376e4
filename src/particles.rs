// src/particles.rs - Polarity normalisation and small particle removal

use image::{GrayImage, Luma};

use crate::image_utils::{count_foreground, distinct_values, invert_mask, BACKGROUND, FOREGROUND};
use crate::regions::{label_coords, label_mask};

/// Make foreground the minority class.
///
/// Fibers cover less of the frame than the background, so a mask whose
/// foreground is the majority has its polarity flipped. Ties are kept.
pub fn normalize_polarity(mask: &GrayImage) -> GrayImage {
    let total = (mask.width() as usize) * (mask.height() as usize);
    let foreground = count_foreground(mask);

    if foreground > total - foreground {
        log::debug!(
            "Inverting mask: {} of {} pixels were foreground",
            foreground,
            total
        );
        invert_mask(mask)
    } else {
        mask.clone()
    }
}

/// Remove 8-connected foreground components with fewer than `min_pixels` pixels.
///
/// The mask is polarity-normalised first. A mask with more than two distinct
/// values points at an upstream bug; it is reported and processed as is.
pub fn remove_particles(mask: &GrayImage, min_pixels: u32) -> GrayImage {
    let levels = distinct_values(mask);
    if levels > 2 {
        log::warn!(
            "Mask is not binary ({} distinct values); particle filtering continues on the raw values",
            levels
        );
    }

    let normalized = normalize_polarity(mask);
    let labels = label_mask(&normalized);

    let mut cleaned = GrayImage::new(mask.width(), mask.height());
    let mut removed = 0usize;
    for (_, coords) in label_coords(&labels) {
        if coords.len() < min_pixels as usize {
            removed += 1;
            continue;
        }
        for (x, y) in coords {
            cleaned.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }

    if removed > 0 {
        log::debug!("Removed {} particles smaller than {} pixels", removed, min_pixels);
    }

    debug_assert!(cleaned.pixels().all(|p| p[0] == FOREGROUND || p[0] == BACKGROUND));
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::{mask_from_points, mask_points};

    fn block(x0: u32, y0: u32, w: u32, h: u32) -> Vec<(u32, u32)> {
        let mut points = Vec::new();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                points.push((x, y));
            }
        }
        points
    }

    #[test]
    fn normalization_is_idempotent() {
        // Foreground majority
        let mut points = block(0, 0, 10, 8);
        points.retain(|&(x, _)| x != 3);
        let mask = mask_from_points(10, 10, &points);

        let once = normalize_polarity(&mask);
        let twice = normalize_polarity(&once);
        assert_eq!(once, twice);
        assert!(count_foreground(&once) < 50);

        // Already a minority, left untouched
        let sparse = mask_from_points(10, 10, &block(2, 2, 3, 3));
        assert_eq!(normalize_polarity(&sparse), sparse);

        // Exact tie, left untouched
        let half = mask_from_points(10, 10, &block(0, 0, 10, 5));
        assert_eq!(normalize_polarity(&half), half);
        assert_eq!(normalize_polarity(&normalize_polarity(&half)), half);
    }

    #[test]
    fn small_components_are_removed() {
        let mut points = block(1, 1, 5, 5);
        points.extend(block(10, 10, 2, 1));
        let mask = mask_from_points(20, 20, &points);

        let cleaned = remove_particles(&mask, 5);
        assert_eq!(mask_points(&cleaned), block(1, 1, 5, 5));
    }

    #[test]
    fn inverted_input_is_cleaned_after_flip() {
        // Dark fiber on a white mask: background is the foreground value
        let fiber = block(2, 4, 12, 2);
        let mask = invert_mask(&mask_from_points(16, 10, &fiber));

        let cleaned = remove_particles(&mask, 5);
        assert_eq!(mask_points(&cleaned), fiber);
    }

    #[test]
    fn non_binary_mask_is_still_processed() {
        let mut mask = mask_from_points(10, 10, &block(1, 1, 4, 4));
        mask.put_pixel(1, 1, Luma([128]));
        let cleaned = remove_particles(&mask, 3);
        assert_eq!(count_foreground(&cleaned), 16);
    }
}
