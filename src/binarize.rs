// src/binarize.rs - Ridge response to binary fiber mask

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::errors::{FiberMorphError, Result};
use crate::image_utils::{FloatImage, BACKGROUND, FOREGROUND};
use crate::regions::{label_coords, label_mask};

/// Histogram resolution of the minimum threshold
pub const HISTOGRAM_BINS: usize = 256;
/// Smoothing passes before the minimum threshold gives up
pub const MAX_SMOOTHING_ITERATIONS: usize = 10_000;
/// 3x3 dilations applied to reconnect broken fibers
pub const DILATION_ITERATIONS: usize = 2;

/// Threshold, clear the border and dilate a ridge response
pub fn binarize(response: &FloatImage, border_buffer: u32) -> Result<GrayImage> {
    let threshold = threshold_minimum(response)?;
    log::debug!("Minimum threshold at {:.5}", threshold);

    let (width, height) = response.dimensions();
    let thresholded = GrayImage::from_fn(width, height, |x, y| {
        Luma([if response.get_pixel(x, y)[0] > threshold { FOREGROUND } else { BACKGROUND }])
    });

    let cleared = clear_border(&thresholded, border_buffer);

    let mut dilated = cleared;
    for _ in 0..DILATION_ITERATIONS {
        dilated = dilate(&dilated, Norm::LInf, 1);
    }

    Ok(dilated)
}

/// Threshold at the valley between the two modes of the histogram.
///
/// The histogram is smoothed with a 3-tap mean until at most two peaks
/// remain; the threshold is the centre of the lowest bin between them.
pub fn threshold_minimum(image: &FloatImage) -> Result<f32> {
    let (min, max) = image
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    if !(min.is_finite() && max.is_finite()) || max <= min {
        return Err(FiberMorphError::Threshold(
            "image is empty or constant".to_string(),
        ));
    }

    let bin_width = (max - min) / HISTOGRAM_BINS as f32;
    let mut histogram = vec![0.0f64; HISTOGRAM_BINS];
    for pixel in image.pixels() {
        let bin = (((pixel[0] - min) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        histogram[bin] += 1.0;
    }

    let valley = histogram_valley(&histogram)?;
    Ok(min + (valley as f32 + 0.5) * bin_width)
}

/// Index of the lowest bin between the two peaks of a smoothed histogram
pub fn histogram_valley(histogram: &[f64]) -> Result<usize> {
    let mut smooth = histogram.to_vec();

    for _ in 0..=MAX_SMOOTHING_ITERATIONS {
        let peaks = find_peaks(&smooth);
        match peaks.len() {
            2 => {
                let (start, end) = (peaks[0], peaks[1]);
                let valley = (start..=end)
                    .min_by(|&a, &b| smooth[a].total_cmp(&smooth[b]))
                    .unwrap_or(start);
                return Ok(valley);
            }
            0 | 1 => {
                return Err(FiberMorphError::Threshold(
                    "histogram has a single mode".to_string(),
                ));
            }
            _ => smooth = smooth_histogram(&smooth),
        }
    }

    Err(FiberMorphError::Threshold(format!(
        "histogram still multimodal after {} smoothing passes",
        MAX_SMOOTHING_ITERATIONS
    )))
}

/// Local maxima, plateaus counted once. The first bin compares against its
/// right neighbour only; the last bin always holds the maximum value and is
/// never a peak.
fn find_peaks(histogram: &[f64]) -> Vec<usize> {
    let n = histogram.len();
    (0..n.saturating_sub(1))
        .filter(|&i| {
            let left = if i == 0 { f64::NEG_INFINITY } else { histogram[i - 1] };
            histogram[i] > left && histogram[i] >= histogram[i + 1]
        })
        .collect()
}

/// 3-tap mean with reflected edges
fn smooth_histogram(histogram: &[f64]) -> Vec<f64> {
    let n = histogram.len();
    (0..n)
        .map(|i| {
            let left = histogram[i.saturating_sub(1)];
            let right = histogram[(i + 1).min(n - 1)];
            (left + histogram[i] + right) / 3.0
        })
        .collect()
}

/// Remove components with a pixel within `buffer` pixels of the image edge
pub fn clear_border(mask: &GrayImage, buffer: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let near_border = |x: u32, y: u32| {
        x <= buffer || y <= buffer || x + buffer + 1 >= width || y + buffer + 1 >= height
    };

    let mut cleared = GrayImage::new(width, height);
    for (_, coords) in label_coords(&label_mask(mask)) {
        if coords.iter().any(|&(x, y)| near_border(x, y)) {
            continue;
        }
        for (x, y) in coords {
            cleared.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::{count_foreground, mask_from_points, mask_points};

    #[test]
    fn valley_between_two_modes() {
        let mut histogram = vec![0.0; 64];
        for (i, h) in histogram.iter_mut().enumerate() {
            let a = (-((i as f64 - 10.0).powi(2)) / 18.0).exp() * 100.0;
            let b = (-((i as f64 - 50.0).powi(2)) / 18.0).exp() * 60.0;
            *h = a + b;
        }
        let valley = histogram_valley(&histogram).unwrap();
        assert!(valley > 20 && valley < 42, "valley at {}", valley);
    }

    #[test]
    fn edge_spike_counts_as_peak() {
        // Background spike in the first bin plus a ridge mode near the top
        let mut histogram = vec![0.0; 32];
        histogram[0] = 1000.0;
        histogram[1] = 40.0;
        histogram[2] = 5.0;
        histogram[28] = 10.0;
        histogram[29] = 30.0;
        histogram[30] = 20.0;
        let valley = histogram_valley(&histogram).unwrap();
        assert!(valley > 1 && valley < 29, "valley at {}", valley);
    }

    #[test]
    fn unimodal_histogram_fails() {
        let histogram: Vec<f64> = (0..16).map(|i| 16.0 - i as f64).collect();
        assert!(matches!(histogram_valley(&histogram), Err(FiberMorphError::Threshold(_))));
    }

    #[test]
    fn raised_last_bin_is_not_a_mode() {
        let mut histogram: Vec<f64> = (0..16).map(|i| 16.0 - i as f64).collect();
        histogram[15] = 5.0;
        assert!(matches!(histogram_valley(&histogram), Err(FiberMorphError::Threshold(_))));
    }

    #[test]
    fn constant_image_fails() {
        let image = FloatImage::from_pixel(8, 8, Luma([0.3]));
        assert!(threshold_minimum(&image).is_err());
    }

    #[test]
    fn threshold_splits_two_levels() {
        // The brightest pixel sits alone in the last bin, above the upper mode
        let image = FloatImage::from_fn(20, 20, |x, y| {
            Luma([match (x, y) {
                (19, 19) => 1.0,
                (x, _) if x < 14 => 0.1,
                _ => 0.9,
            }])
        });
        let threshold = threshold_minimum(&image).unwrap();
        assert!(threshold > 0.1 && threshold < 0.9);
    }

    #[test]
    fn border_components_are_cleared() {
        let mut points = vec![(0, 5), (1, 5), (2, 5)];
        let inner: Vec<(u32, u32)> = (8..12).map(|x| (x, 10)).collect();
        points.extend(&inner);
        let mask = mask_from_points(20, 20, &points);

        let cleared = clear_border(&mask, 2);
        assert_eq!(mask_points(&cleared), inner);

        // A wide buffer reaches the inner segment as well
        assert_eq!(count_foreground(&clear_border(&mask, 8)), 0);
    }

    #[test]
    fn binarize_dilates_detected_ridge() {
        let image = FloatImage::from_fn(40, 40, |x, y| {
            Luma([match (x, y) {
                (20, 20) => 1.0,
                (x, 20) if (10..30).contains(&x) => 0.8,
                _ => 0.0,
            }])
        });
        let mask = binarize(&image, 3).unwrap();
        // One pixel row grown by two pixels on each side
        assert_eq!(count_foreground(&mask), 24 * 5);
        assert_eq!(mask.get_pixel(20, 18)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(20, 17)[0], BACKGROUND);
    }
}
