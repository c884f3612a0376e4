// src/pruning.rs - Branch point detection and removal on skeletons
//
// Junctions are found with a library of 3x3 hit-or-miss elements, collapsed
// to one point per junction blob, grown by the 4-neighbourhood and cut out
// of the skeleton so that the arcs meeting there become disjoint.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::image_utils::{foreground_at, mask_from_points, subtract_mask, BACKGROUND, FOREGROUND};
use crate::particles::remove_particles;
use crate::regions::{label_coords, label_mask};

/// 3x3 pattern, row-major, `true` marks a required foreground pixel
pub type StructuringElement = [[bool; 3]; 3];

const X: bool = true;
const O: bool = false;

/// Three arms, two orthogonal and one perpendicular
const TEE: StructuringElement = [
    [O, O, O],
    [X, X, X],
    [O, X, O],
];

/// Two diagonal arms and one orthogonal arm
const WYE: StructuringElement = [
    [X, O, X],
    [O, X, O],
    [O, X, O],
];

/// Two perpendicular orthogonal arms and the diagonal opposite both,
/// as left by the thinning at the core of a diagonal crossing
const KINK: StructuringElement = [
    [O, X, O],
    [X, X, O],
    [O, O, X],
];

/// Four orthogonal arms
const PLUS: StructuringElement = [
    [O, X, O],
    [X, X, X],
    [O, X, O],
];

/// Four diagonal arms
const CROSS: StructuringElement = [
    [X, O, X],
    [O, X, O],
    [X, O, X],
];

/// Skeleton with branch points cut out
pub struct PrunedSkeleton {
    /// Disjoint arcs; every connected component is one fiber element
    pub mask: GrayImage,
    /// Representative junction pixels `(x, y)`
    pub junctions: Vec<(u32, u32)>,
}

fn rotate(element: &StructuringElement) -> StructuringElement {
    let mut rotated = [[O; 3]; 3];
    for (r, row) in element.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            rotated[c][2 - r] = v;
        }
    }
    rotated
}

fn reflect(element: &StructuringElement) -> StructuringElement {
    let mut reflected = *element;
    for row in reflected.iter_mut() {
        row.reverse();
    }
    reflected
}

/// All distinct rotations and reflections of a pattern
pub fn dihedral_orbit(element: &StructuringElement) -> Vec<StructuringElement> {
    let mut orbit: Vec<StructuringElement> = Vec::with_capacity(8);
    for start in [*element, reflect(element)] {
        let mut current = start;
        for _ in 0..4 {
            if !orbit.contains(&current) {
                orbit.push(current);
            }
            current = rotate(&current);
        }
    }
    orbit
}

/// Branch point library: every orientation of the three 3-way junction
/// shapes plus the orthogonal and diagonal 4-way crosses
pub fn structuring_elements() -> Vec<StructuringElement> {
    let mut elements = dihedral_orbit(&TEE);
    elements.extend(dihedral_orbit(&WYE));
    elements.extend(dihedral_orbit(&KINK));
    elements.push(PLUS);
    elements.push(CROSS);
    elements
}

fn hit_count(element: &StructuringElement) -> usize {
    element.iter().flatten().filter(|&&v| v).count()
}

/// Pixels where at least one element matches exactly: the number of
/// skeleton pixels under the element's hits (zero padded) equals its size
pub fn find_branch_points(skeleton: &GrayImage) -> GrayImage {
    let (width, height) = skeleton.dimensions();
    let elements: Vec<(StructuringElement, usize)> = structuring_elements()
        .into_iter()
        .map(|e| {
            let hits = hit_count(&e);
            (e, hits)
        })
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let is_branch = elements.iter().any(|(element, hits)| {
            let mut response = 0usize;
            for (r, row) in element.iter().enumerate() {
                for (c, &v) in row.iter().enumerate() {
                    if v && foreground_at(skeleton, x as i32 + c as i32 - 1, y as i32 + r as i32 - 1) {
                        response += 1;
                    }
                }
            }
            response == *hits
        });
        Luma([if is_branch { FOREGROUND } else { BACKGROUND }])
    })
}

/// One representative pixel per 8-connected branch point blob, at the
/// blob's rounded centre of mass
pub fn junction_centers(branch_points: &GrayImage) -> Vec<(u32, u32)> {
    let (width, height) = branch_points.dimensions();
    let mut centers = Vec::new();

    for (label, coords) in label_coords(&label_mask(branch_points)) {
        let n = coords.len() as f64;
        let (sx, sy) = coords
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        let (cx, cy) = (sx / n, sy / n);

        if !(cx.is_finite() && cy.is_finite()) {
            log::debug!("Discarding branch component {} with undefined centre", label);
            continue;
        }

        let (rx, ry) = (cx.round(), cy.round());
        if rx >= 0.0 && ry >= 0.0 && (rx as u32) < width && (ry as u32) < height {
            centers.push((rx as u32, ry as u32));
        }
    }

    centers
}

/// Cut branch points and their 4-neighbours out of a skeleton, then drop
/// arcs with fewer than `min_arc_px` pixels
pub fn prune_skeleton(skeleton: &GrayImage, min_arc_px: u32) -> PrunedSkeleton {
    let (width, height) = skeleton.dimensions();

    let branch_points = find_branch_points(skeleton);
    let junctions = junction_centers(&branch_points);
    log::debug!("Found {} junctions", junctions.len());

    let junction_mask = mask_from_points(width, height, &junctions);
    let cut = dilate(&junction_mask, Norm::L1, 1);
    let arcs = subtract_mask(skeleton, &cut);

    PrunedSkeleton {
        mask: remove_particles(&arcs, min_arc_px),
        junctions,
    }
}
