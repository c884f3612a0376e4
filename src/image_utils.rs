use image::{GrayImage, ImageBuffer, Luma};

/// Single channel floating point image
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Value written for foreground pixels of a mask
pub const FOREGROUND: u8 = 255;
/// Value written for background pixels of a mask
pub const BACKGROUND: u8 = 0;

/// Any non-zero pixel counts as foreground
#[inline]
pub fn is_foreground(pixel: &Luma<u8>) -> bool {
    pixel[0] != BACKGROUND
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}

/// Foreground test that treats everything outside the image as background
#[inline]
pub fn foreground_at(mask: &GrayImage, x: i32, y: i32) -> bool {
    let (width, height) = mask.dimensions();
    in_bounds(x, y, width, height) && is_foreground(mask.get_pixel(x as u32, y as u32))
}

pub fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| is_foreground(p)).count()
}

/// Number of distinct pixel values present in the mask
pub fn distinct_values(mask: &GrayImage) -> usize {
    let mut seen = [false; 256];
    for pixel in mask.pixels() {
        seen[pixel[0] as usize] = true;
    }
    seen.iter().filter(|&&s| s).count()
}

/// Swap foreground and background (`255 - v`)
pub fn invert_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| Luma([u8::MAX - mask.get_pixel(x, y)[0]]))
}

/// Pixels set in `a` and not in `b`, as a 0/255 mask
pub fn subtract_mask(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (width, height) = a.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let keep = is_foreground(a.get_pixel(x, y)) && !is_foreground(b.get_pixel(x, y));
        Luma([if keep { FOREGROUND } else { BACKGROUND }])
    })
}

/// Foreground coordinates in raster order (row by row)
pub fn mask_points(mask: &GrayImage) -> Vec<(u32, u32)> {
    mask.enumerate_pixels()
        .filter(|(_, _, p)| is_foreground(p))
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Build a 0/255 mask with the given points set
pub fn mask_from_points(width: u32, height: u32, points: &[(u32, u32)]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(x, y) in points {
        if x < width && y < height {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    mask
}

/// Linearly rescale a float image to the full 8-bit range (for saving)
pub fn float_to_gray(image: &FloatImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    let span = max - min;
    let (width, height) = image.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        if !(span.is_finite() && span > 0.0) {
            return Luma([0]);
        }
        let v = (image.get_pixel(x, y)[0] - min) / span;
        Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// Convert an 8-bit image to floats in [0, 1]
pub fn gray_to_unit_float(image: &GrayImage) -> FloatImage {
    let (width, height) = image.dimensions();
    FloatImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[0] as f32 / 255.0]))
}
