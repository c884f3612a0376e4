// src/ridge_filter.rs - Multi-scale Frangi vesselness for dark fibers on a bright background

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::image_utils::{gray_to_unit_float, FloatImage};

/// Gaussian scales probed by the filter
pub const FRANGI_SIGMAS: [f32; 5] = [1.0, 3.0, 5.0, 7.0, 9.0];

/// Blobness sensitivity
const FRANGI_BETA: f32 = 0.5;

/// Enhance dark curvilinear structures. Returns the maximum vesselness over
/// all scales; bright ridges respond with zero.
pub fn frangi(image: &GrayImage) -> FloatImage {
    let (width, height) = image.dimensions();
    let unit = gray_to_unit_float(image);
    let mut response = FloatImage::new(width, height);

    for &sigma in FRANGI_SIGMAS.iter() {
        let scale = vesselness_at_scale(&unit, sigma);
        for (out, v) in response.pixels_mut().zip(scale.iter()) {
            out[0] = out[0].max(*v);
        }
    }

    response
}

/// Vesselness of every pixel at one scale, in raster order
fn vesselness_at_scale(image: &FloatImage, sigma: f32) -> Vec<f32> {
    let blurred = gaussian_blur_f32(image, sigma);
    let (width, height) = blurred.dimensions();
    let norm = sigma * sigma;

    let mut eigen = Vec::with_capacity((width * height) as usize);
    let mut max_structure = 0.0f32;

    for y in 0..height {
        for x in 0..width {
            let (hxx, hxy, hyy) = hessian_at(&blurred, x, y);
            let (l1, l2) = sorted_eigenvalues(hxx * norm, hxy * norm, hyy * norm);
            let s = (l1 * l1 + l2 * l2).sqrt();
            max_structure = max_structure.max(s);
            eigen.push((l1, l2, s));
        }
    }

    let gamma = if max_structure > 0.0 { max_structure / 2.0 } else { 1.0 };

    eigen
        .into_iter()
        .map(|(l1, l2, s)| {
            // Dark ridges curve upwards across the fiber
            if l2 <= 0.0 {
                return 0.0;
            }
            let rb = l1.abs() / l2;
            let blobness = (-(rb * rb) / (2.0 * FRANGI_BETA * FRANGI_BETA)).exp();
            let structure = 1.0 - (-(s * s) / (2.0 * gamma * gamma)).exp();
            blobness * structure
        })
        .collect()
}

/// Second derivatives by central differences, edges clamped
fn hessian_at(image: &FloatImage, x: u32, y: u32) -> (f32, f32, f32) {
    let (width, height) = image.dimensions();
    let px = |dx: i64, dy: i64| -> f32 {
        let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
        let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
        let Luma([v]) = *image.get_pixel(sx, sy);
        v
    };

    let center = px(0, 0);
    let hxx = px(1, 0) - 2.0 * center + px(-1, 0);
    let hyy = px(0, 1) - 2.0 * center + px(0, -1);
    let hxy = (px(1, 1) - px(1, -1) - px(-1, 1) + px(-1, -1)) / 4.0;
    (hxx, hxy, hyy)
}

/// Eigenvalues of `[[a, b], [b, c]]` ordered so that `|l1| <= |l2|`
fn sorted_eigenvalues(a: f32, b: f32, c: f32) -> (f32, f32) {
    let half_trace = (a + c) / 2.0;
    let root = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let (e1, e2) = (half_trace + root, half_trace - root);
    if e1.abs() <= e2.abs() {
        (e1, e2)
    } else {
        (e2, e1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eigenvalues_are_sorted_by_magnitude() {
        let (l1, l2) = sorted_eigenvalues(-1.0, 0.0, 4.0);
        assert_eq!((l1, l2), (-1.0, 4.0));
        let (l1, l2) = sorted_eigenvalues(3.0, 0.0, 0.5);
        assert_eq!((l1, l2), (0.5, 3.0));
    }

    #[test]
    fn dark_line_responds_on_its_centre() {
        let mut image = GrayImage::from_pixel(60, 40, Luma([230]));
        for x in 5..55 {
            for y in 19..22 {
                image.put_pixel(x, y, Luma([20]));
            }
        }

        let response = frangi(&image);
        let on_line = response.get_pixel(30, 20)[0];
        let background = response.get_pixel(30, 2)[0];

        assert!(on_line > 0.5, "ridge response {}", on_line);
        assert!(background < 0.01, "background response {}", background);
    }

    #[test]
    fn bright_line_is_ignored() {
        let mut image = GrayImage::from_pixel(60, 40, Luma([20]));
        for x in 5..55 {
            for y in 19..22 {
                image.put_pixel(x, y, Luma([230]));
            }
        }

        let response = frangi(&image);
        assert!(response.get_pixel(30, 20)[0] < 0.01);
    }

    #[test]
    fn flat_image_has_no_response() {
        let image = GrayImage::from_pixel(20, 20, Luma([128]));
        let response = frangi(&image);
        assert!(response.pixels().all(|p| p[0].abs() < 1e-6));
    }
}
