// src/regions.rs - Connected component labelling and region properties

use std::collections::BTreeMap;
use std::f64::consts::PI;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Matrix2;

use crate::image_utils::{BACKGROUND, FOREGROUND, is_foreground};

/// Label image, 0 is background
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Bounding box, inclusive minimum and exclusive maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

/// Derived attributes of one labelled component
#[derive(Debug, Clone)]
pub struct RegionProps {
    pub label: u32,
    /// Pixel coordinates `(x, y)` in raster order, not path order
    pub coords: Vec<(u32, u32)>,
    pub area: usize,
    /// Centre of mass `(x, y)`
    pub centroid: (f64, f64),
    pub bbox: BoundingBox,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
    pub eccentricity: f64,
    pub equivalent_diameter: f64,
    /// Number of region pixels with a 4-neighbour outside the region
    pub perimeter: usize,
    /// Area including enclosed holes
    pub filled_area: usize,
}

/// Label 8-connected foreground components of a mask
pub fn label_mask(mask: &GrayImage) -> LabelImage {
    // Collapse to 0/255 first; the labeller splits touching pixels of different values
    let (width, height) = mask.dimensions();
    let binary = GrayImage::from_fn(width, height, |x, y| {
        Luma([if is_foreground(mask.get_pixel(x, y)) { FOREGROUND } else { BACKGROUND }])
    });
    connected_components(&binary, Connectivity::Eight, Luma([BACKGROUND]))
}

/// Pixel coordinates of every label, keyed by label id
pub fn label_coords(labels: &LabelImage) -> BTreeMap<u32, Vec<(u32, u32)>> {
    let mut coords: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        if pixel[0] != 0 {
            coords.entry(pixel[0]).or_default().push((x, y));
        }
    }
    coords
}

/// Region properties of every label, keyed by label id
pub fn region_props(labels: &LabelImage) -> BTreeMap<u32, RegionProps> {
    label_coords(labels)
        .into_iter()
        .map(|(label, coords)| {
            let props = describe_region(labels, label, coords);
            (label, props)
        })
        .collect()
}

fn describe_region(labels: &LabelImage, label: u32, coords: Vec<(u32, u32)>) -> RegionProps {
    let area = coords.len();
    let n = area as f64;

    let (sum_x, sum_y) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let centroid = (sum_x / n, sum_y / n);

    let mut bbox = BoundingBox {
        min_x: u32::MAX,
        min_y: u32::MAX,
        max_x: 0,
        max_y: 0,
    };
    for &(x, y) in &coords {
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x + 1);
        bbox.max_y = bbox.max_y.max(y + 1);
    }

    // Second central moments, normalised by area
    let (mut mu_xx, mut mu_yy, mut mu_xy) = (0.0, 0.0, 0.0);
    for &(x, y) in &coords {
        let dx = x as f64 - centroid.0;
        let dy = y as f64 - centroid.1;
        mu_xx += dx * dx;
        mu_yy += dy * dy;
        mu_xy += dx * dy;
    }
    let covariance = Matrix2::new(mu_xx / n, mu_xy / n, mu_xy / n, mu_yy / n);
    let eigen = covariance.symmetric_eigen();
    let l1 = eigen.eigenvalues[0].max(eigen.eigenvalues[1]).max(0.0);
    let l2 = eigen.eigenvalues[0].min(eigen.eigenvalues[1]).max(0.0);

    let eccentricity = if l1 > 0.0 { (1.0 - l2 / l1).sqrt() } else { 0.0 };

    let in_region = |x: i64, y: i64| -> bool {
        x >= 0
            && y >= 0
            && (x as u32) < labels.width()
            && (y as u32) < labels.height()
            && labels.get_pixel(x as u32, y as u32)[0] == label
    };

    let perimeter = coords
        .iter()
        .filter(|&&(x, y)| {
            let (x, y) = (x as i64, y as i64);
            !(in_region(x - 1, y) && in_region(x + 1, y) && in_region(x, y - 1) && in_region(x, y + 1))
        })
        .count();

    RegionProps {
        label,
        area,
        centroid,
        bbox,
        major_axis_length: 4.0 * l1.sqrt(),
        minor_axis_length: 4.0 * l2.sqrt(),
        eccentricity,
        equivalent_diameter: (4.0 * n / PI).sqrt(),
        perimeter,
        filled_area: filled_area(labels, label, &bbox),
        coords,
    }
}

/// Region area plus the holes it encloses, found by flooding the
/// background from a one pixel frame around the bounding box
fn filled_area(labels: &LabelImage, label: u32, bbox: &BoundingBox) -> usize {
    let width = bbox.width() as usize + 2;
    let height = bbox.height() as usize + 2;
    let is_region = |fx: usize, fy: usize| -> bool {
        if fx == 0 || fy == 0 || fx == width - 1 || fy == height - 1 {
            return false;
        }
        let x = bbox.min_x + fx as u32 - 1;
        let y = bbox.min_y + fy as u32 - 1;
        labels.get_pixel(x, y)[0] == label
    };

    let mut outside = vec![false; width * height];
    let mut stack = vec![(0usize, 0usize)];
    outside[0] = true;

    while let Some((x, y)) = stack.pop() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= width || ny >= height {
                continue;
            }
            let idx = ny * width + nx;
            if !outside[idx] && !is_region(nx, ny) {
                outside[idx] = true;
                stack.push((nx, ny));
            }
        }
    }

    outside.iter().filter(|&&o| !o).count()
}
