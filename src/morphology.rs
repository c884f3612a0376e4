use image::{GrayImage, Luma};

use crate::image_utils::{foreground_at, is_foreground, BACKGROUND, FOREGROUND};

/// Direction vectors of the 8-neighbourhood, counter-clockwise from east
/// (y grows downward, so "north" is `dy = -1`)
pub static NEIGHBOURHOOD: [(i32, i32); 8] = [
    (1, 0),   // east
    (1, -1),  // north-east
    (0, -1),  // north
    (-1, -1), // north-west
    (-1, 0),  // west
    (-1, 1),  // south-west
    (0, 1),   // south
    (1, 1),   // south-east
];

/// Border directions peeled in turn: north, south, east, west
const BORDER_PASSES: [(i32, i32); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

/// Neighbour occupancy in `NEIGHBOURHOOD` order
fn neighbours(mask: &GrayImage, x: u32, y: u32) -> [bool; 8] {
    let mut ring = [false; 8];
    for (i, &(dx, dy)) in NEIGHBOURHOOD.iter().enumerate() {
        ring[i] = foreground_at(mask, x as i32 + dx, y as i32 + dy);
    }
    ring
}

/// Number of foreground 8-neighbours
pub fn neighbour_count(mask: &GrayImage, x: u32, y: u32) -> usize {
    neighbours(mask, x, y).iter().filter(|&&n| n).count()
}

/// Yokoi 8-connectivity number. A pixel with value 1 is simple: removing
/// it changes neither the foreground components nor the holes.
fn connectivity_number(ring: &[bool; 8]) -> u32 {
    let bg = |i: usize| u32::from(!ring[i % 8]);
    [0usize, 2, 4, 6]
        .iter()
        .map(|&k| bg(k) - bg(k) * bg(k + 1) * bg(k + 2))
        .sum()
}

/// Thin a binary mask to 1-pixel-wide curves while preserving topology.
///
/// Border pixels are peeled one direction at a time; a candidate is
/// deleted only if, at that moment, it is simple and not an end point.
pub fn skeletonize(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut skeleton = GrayImage::from_fn(width, height, |x, y| {
        Luma([if is_foreground(mask.get_pixel(x, y)) { FOREGROUND } else { BACKGROUND }])
    });

    let mut iterations = 0usize;
    loop {
        let mut changed = false;

        for &(dx, dy) in BORDER_PASSES.iter() {
            let candidates: Vec<(u32, u32)> = skeleton
                .enumerate_pixels()
                .filter(|(x, y, p)| {
                    is_foreground(p) && !foreground_at(&skeleton, *x as i32 + dx, *y as i32 + dy)
                })
                .map(|(x, y, _)| (x, y))
                .collect();

            for (x, y) in candidates {
                let ring = neighbours(&skeleton, x, y);
                let count = ring.iter().filter(|&&n| n).count();
                if count >= 2 && connectivity_number(&ring) == 1 {
                    skeleton.put_pixel(x, y, Luma([BACKGROUND]));
                    changed = true;
                }
            }
        }

        iterations += 1;
        if !changed {
            break;
        }
    }

    log::trace!("Skeletonization converged after {} iterations", iterations);
    skeleton
}
