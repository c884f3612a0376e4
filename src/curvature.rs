// src/curvature.rs - Windowed Taubin circle fits along skeleton elements

use std::collections::HashMap;
use std::ops::Range;

use nalgebra::DMatrix;

use crate::aggregate::FiberSummary;
use crate::config::Config;
use crate::statistics::{mean, median, trim_percentiles};

/// Window sizes below this use the whole element as a single window
pub const MIN_SLIDING_WINDOW: usize = 10;

/// Percentile range of window samples kept per element
pub const SAMPLE_TRIM_PERCENTILES: (f64, f64) = (1.0, 99.0);

/// Below this weight on the quadratic term the fit is treated as a line
const COLLINEAR_TOLERANCE: f64 = 1e-10;

/// Parameters of the curvature estimator
#[derive(Debug, Clone, Copy)]
pub struct CurvatureSettings {
    pub window_size_px: usize,
    /// Pixels per physical unit
    pub resolution: f64,
    pub order_arc_pixels: bool,
}

impl CurvatureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size_px: config.window_size_px(),
            resolution: config.resolution,
            order_arc_pixels: config.order_arc_pixels,
        }
    }
}

/// Curvature measurements of one pruned skeleton element
#[derive(Debug, Clone)]
pub struct ElementCurvature {
    pub label: u32,
    /// Finite window curvatures before trimming
    pub samples: Vec<f64>,
    pub summary: FiberSummary,
}

/// Index ranges of the windows over an element of `len` pixels.
///
/// Windows of at least `MIN_SLIDING_WINDOW` pixels slide by one pixel and
/// never run past the end; smaller requests fit the whole element at once.
pub fn windows(len: usize, window_size_px: usize) -> Vec<Range<usize>> {
    if window_size_px < MIN_SLIDING_WINDOW {
        return if len == 0 { Vec::new() } else { vec![0..len] };
    }
    if len < window_size_px {
        return Vec::new();
    }
    (0..=len - window_size_px)
        .map(|start| start..start + window_size_px)
        .collect()
}

/// Radius of the Taubin algebraic circle fit through `points`.
///
/// Returns `f64::INFINITY` for fewer than three points, coincident points,
/// or collinear points.
pub fn taubin_radius(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return f64::INFINITY;
    }

    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (mx, my) = (sx / n as f64, sy / n as f64);

    let centered: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x - mx, y - my)).collect();
    let z: Vec<f64> = centered.iter().map(|&(x, y)| x * x + y * y).collect();
    let z_mean = z.iter().sum::<f64>() / n as f64;

    if !(z_mean.is_finite() && z_mean > 0.0) {
        return f64::INFINITY;
    }
    let z_scale = 2.0 * z_mean.sqrt();

    let design = DMatrix::from_fn(n, 3, |r, c| match c {
        0 => (z[r] - z_mean) / z_scale,
        1 => centered[r].0,
        _ => centered[r].1,
    });

    let svd = design.svd(false, true);
    let Some(v_t) = svd.v_t else {
        return f64::INFINITY;
    };

    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let a = v_t.row(smallest);

    if !a[0].is_finite() || a[0].abs() <= COLLINEAR_TOLERANCE {
        return f64::INFINITY;
    }

    // A (x^2 + y^2) + B x + C y + D = 0
    let big_a = a[0] / z_scale;
    let big_d = -z_mean * big_a;
    let discriminant = a[1] * a[1] + a[2] * a[2] - 4.0 * big_a * big_d;

    discriminant.sqrt() / (2.0 * big_a.abs())
}

/// Curvature (`resolution / radius`) of every window with a finite fit
pub fn window_curvatures(coords: &[(u32, u32)], window_size_px: usize, resolution: f64) -> Vec<f64> {
    let points: Vec<(f64, f64)> = coords.iter().map(|&(x, y)| (x as f64, y as f64)).collect();

    let mut dropped = 0usize;
    let samples: Vec<f64> = windows(points.len(), window_size_px)
        .into_iter()
        .filter_map(|range| {
            let radius = taubin_radius(&points[range]);
            if radius.is_finite() && radius > 0.0 {
                Some(resolution / radius)
            } else {
                dropped += 1;
                None
            }
        })
        .collect();

    if dropped > 0 {
        log::debug!("Dropped {} windows with a non-finite circle fit", dropped);
    }
    samples
}

/// Reorder skeleton pixels by walking along 8-adjacent neighbours.
///
/// The walk starts at an end point (or the first pixel of a loop) and
/// prefers 4-neighbours; when it runs out of neighbours it jumps to the
/// nearest unvisited pixel.
pub fn order_arc_pixels(coords: &[(u32, u32)]) -> Vec<(u32, u32)> {
    const STEPS: [(i64, i64); 8] = [
        (1, 0), (-1, 0), (0, 1), (0, -1),
        (1, 1), (1, -1), (-1, 1), (-1, -1),
    ];

    let n = coords.len();
    if n < 3 {
        return coords.to_vec();
    }

    let index: HashMap<(i64, i64), usize> = coords
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| ((x as i64, y as i64), i))
        .collect();
    let neighbours_of = |i: usize| -> Vec<usize> {
        let (x, y) = (coords[i].0 as i64, coords[i].1 as i64);
        STEPS
            .iter()
            .filter_map(|&(dx, dy)| index.get(&(x + dx, y + dy)).copied())
            .collect()
    };

    let start = (0..n).find(|&i| neighbours_of(i).len() == 1).unwrap_or(0);

    let mut visited = vec![false; n];
    let mut ordered = Vec::with_capacity(n);
    let mut current = start;

    loop {
        visited[current] = true;
        ordered.push(coords[current]);
        if ordered.len() == n {
            break;
        }

        let next = neighbours_of(current).into_iter().find(|&j| !visited[j]);
        current = match next {
            Some(j) => j,
            None => {
                let (cx, cy) = (coords[current].0 as i64, coords[current].1 as i64);
                (0..n)
                    .filter(|&j| !visited[j])
                    .min_by_key(|&j| {
                        let dx = coords[j].0 as i64 - cx;
                        let dy = coords[j].1 as i64 - cy;
                        dx * dx + dy * dy
                    })
                    .unwrap_or(current)
            }
        };
    }

    ordered
}

/// Curvature samples and trimmed summary of one element
pub fn analyze_element(label: u32, coords: &[(u32, u32)], settings: &CurvatureSettings) -> ElementCurvature {
    let ordered;
    let coords = if settings.order_arc_pixels {
        ordered = order_arc_pixels(coords);
        &ordered[..]
    } else {
        coords
    };

    let samples = window_curvatures(coords, settings.window_size_px, settings.resolution);
    let (lower, upper) = SAMPLE_TRIM_PERCENTILES;
    let trimmed = trim_percentiles(&samples, lower, upper);

    if trimmed.is_empty() {
        log::debug!("Element {} ({} px) has no finite curvature", label, coords.len());
    }

    ElementCurvature {
        label,
        summary: FiberSummary {
            curv_mean: mean(&trimmed),
            curv_median: median(&trimmed),
            length: coords.len() as f64 / settings.resolution,
        },
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn circle_points(cx: f64, cy: f64, r: f64, count: usize, sweep: f64) -> Vec<(f64, f64)> {
        (0..count)
            .map(|i| {
                let t = sweep * i as f64 / count as f64;
                (cx + r * t.cos(), cy + r * t.sin())
            })
            .collect()
    }

    #[test]
    fn window_counts() {
        let full = windows(100, 10);
        assert_eq!(full.len(), 91);
        assert_eq!(full[0], 0..10);
        assert_eq!(full[90], 90..100);

        let whole = windows(8, 5);
        assert_eq!(whole, vec![0..8]);

        assert!(windows(9, 12).is_empty());
        assert_eq!(windows(12, 12).len(), 1);
    }

    #[test]
    fn taubin_recovers_full_circle() {
        let points = circle_points(100.0, 100.0, 20.0, 50, 2.0 * PI);
        let radius = taubin_radius(&points);
        assert!(((radius - 20.0) / 20.0).abs() < 1e-6, "radius {}", radius);
        assert!((1.0 / radius - 0.05).abs() < 1e-6);
    }

    #[test]
    fn taubin_recovers_partial_arc() {
        let points = circle_points(-30.0, 55.0, 75.0, 40, PI / 3.0);
        let radius = taubin_radius(&points);
        assert!(((radius - 75.0) / 75.0).abs() < 1e-6, "radius {}", radius);
    }

    #[test]
    fn collinear_points_are_not_finite() {
        let horizontal: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 7.0)).collect();
        assert!(!taubin_radius(&horizontal).is_finite());

        let diagonal: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, i as f64)).collect();
        assert!(!taubin_radius(&diagonal).is_finite());

        assert!(!taubin_radius(&[(1.0, 1.0), (2.0, 2.0)]).is_finite());
        assert!(!taubin_radius(&[(3.0, 3.0); 5]).is_finite());
    }

    #[test]
    fn straight_element_contributes_no_samples() {
        let line: Vec<(u32, u32)> = (10..60).map(|x| (x, 30)).collect();
        assert!(window_curvatures(&line, 20, 1.0).is_empty());

        let settings = CurvatureSettings { window_size_px: 20, resolution: 2.0, order_arc_pixels: false };
        let element = analyze_element(1, &line, &settings);
        assert!(element.samples.is_empty());
        assert!(element.summary.curv_mean.is_none());
        assert!(element.summary.curv_median.is_none());
        assert_eq!(element.summary.length, 25.0);
    }

    #[test]
    fn curvature_scales_with_resolution() {
        let points = circle_points(0.0, 0.0, 40.0, 200, 2.0 * PI);
        let coords: Vec<(u32, u32)> = points
            .iter()
            .map(|&(x, y)| ((x + 100.0) as u32, (y + 100.0) as u32))
            .collect();
        // A window below the sliding threshold fits the whole ring
        let at_one = window_curvatures(&coords, 5, 1.0);
        let at_ten = window_curvatures(&coords, 5, 10.0);
        assert_eq!(at_one.len(), 1);
        assert!((at_one[0] - 1.0 / 40.0).abs() < 0.002);
        assert!((at_ten[0] - 10.0 * at_one[0]).abs() < 1e-9);
    }

    #[test]
    fn arc_walk_follows_adjacency() {
        // L-shaped path listed in raster order
        let mut path: Vec<(u32, u32)> = (0..6).map(|y| (2, y)).collect();
        path.extend((3..8).map(|x| (x, 5)));
        let mut raster = path.clone();
        raster.sort_by_key(|&(x, y)| (y, x));

        let ordered = order_arc_pixels(&raster);
        assert_eq!(ordered.len(), path.len());
        let reversed: Vec<(u32, u32)> = path.iter().rev().copied().collect();
        assert!(ordered == path || ordered == reversed, "{:?}", ordered);
    }

    #[test]
    fn arc_walk_visits_disconnected_pixels() {
        let coords = vec![(0, 0), (1, 0), (2, 0), (10, 0), (11, 0)];
        let ordered = order_arc_pixels(&coords);
        assert_eq!(ordered.len(), 5);
        let mut sorted = ordered.clone();
        sorted.sort();
        assert_eq!(sorted, coords);
    }
}
