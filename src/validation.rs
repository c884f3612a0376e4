// src/validation.rs - Synthetic fibers of known curvature run through the batch

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use csv::Writer;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

use crate::aggregate::ImageSummary;
use crate::batch::{run_batch, LogProgress};
use crate::config::{Config, WindowUnit};
use crate::errors::Result;
use crate::image_io::{make_subdirectory, save_image};
use crate::output::{format_value, CURVATURE_DECIMALS};

const FIBER_LEVEL: u8 = 40;
const BACKGROUND_LEVEL: u8 = 220;
const BLUR_SIGMA: f32 = 1.0;
/// Clearance between a synthetic fiber and the image edge
const MARGIN: u32 = 50;

/// A rendered image and the curvature it was drawn with
pub struct SyntheticFiber {
    pub id: String,
    pub image: GrayImage,
    /// Curvature in 1/px
    pub reference_curvature: f64,
}

fn render<F: Fn(f64, f64) -> bool>(width: u32, height: u32, on_fiber: F) -> GrayImage {
    let sharp = GrayImage::from_fn(width, height, |x, y| {
        Luma([if on_fiber(x as f64, y as f64) { FIBER_LEVEL } else { BACKGROUND_LEVEL }])
    });
    gaussian_blur_f32(&sharp, BLUR_SIGMA)
}

/// Dark circular arc centred in the image, opening downwards.
///
/// `sweep_degrees` is the arc's angular extent, symmetric about the top.
pub fn draw_arc_image(width: u32, height: u32, radius: f64, thickness: f64, sweep_degrees: f64) -> GrayImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let half_sweep = sweep_degrees.to_radians() / 2.0;

    render(width, height, |x, y| {
        let (dx, dy) = (x - cx, cy - y);
        let distance = (dx * dx + dy * dy).sqrt();
        if (distance - radius).abs() > thickness / 2.0 {
            return false;
        }
        // Signed angle from straight up, in [-PI, PI)
        let from_top = (dy.atan2(dx) - PI / 2.0 + PI).rem_euclid(2.0 * PI) - PI;
        from_top.abs() <= half_sweep
    })
}

/// Dark horizontal segment centred in the image
pub fn draw_line_image(width: u32, height: u32, length: f64, thickness: f64) -> GrayImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    render(width, height, |x, y| {
        (x - cx).abs() <= length / 2.0 && (y - cy).abs() <= thickness / 2.0
    })
}

/// `repeats` arcs of growing radius plus one straight segment
pub fn synthetic_fibers(repeats: usize) -> Vec<SyntheticFiber> {
    let mut fibers: Vec<SyntheticFiber> = (0..repeats)
        .map(|i| {
            let radius = 40.0 + 20.0 * i as f64;
            let size = 2 * (radius as u32 + MARGIN);
            SyntheticFiber {
                id: format!("arc_{:02}", i),
                image: draw_arc_image(size, size, radius, 5.0, 200.0),
                reference_curvature: 1.0 / radius,
            }
        })
        .collect();

    fibers.push(SyntheticFiber {
        id: "line".to_string(),
        image: draw_line_image(300, 120, 180.0, 5.0),
        reference_curvature: 0.0,
    });
    fibers
}

/// Render the synthetic set, run the batch on it and write the error table.
///
/// Everything goes under `<output_directory>/validation`; resolution is
/// forced to 1 so curvatures are in 1/px.
pub fn run_validation(config: &Config, repeats: usize) -> Result<PathBuf> {
    let root = make_subdirectory(&config.output_directory, "validation")?;
    let image_dir = make_subdirectory(&root, "images")?;

    let fibers = synthetic_fibers(repeats);
    for fiber in &fibers {
        save_image(&fiber.image, image_dir.join(format!("{}.png", fiber.id)))?;
    }
    log::info!("Rendered {} synthetic images to {}", fibers.len(), image_dir.display());

    let run_config = Config {
        input_directory: image_dir.to_string_lossy().into_owned(),
        output_directory: root.join("results").to_string_lossy().into_owned(),
        file_type: "png".to_string(),
        resolution: 1.0,
        window_unit: WindowUnit::Px,
        ..config.clone()
    };

    let sink = LogProgress::new();
    let report = run_batch(&run_config, &sink)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let table_path = root.join(format!("validation_curvature_{}.csv", timestamp));
    write_validation_csv(&fibers, &report.rows, &table_path)?;

    Ok(table_path)
}

fn write_validation_csv(
    fibers: &[SyntheticFiber],
    rows: &[ImageSummary],
    path: &Path,
) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["ID", "ref_curvature", "curv_median_median", "abs_error", "rel_error"])?;

    for fiber in fibers {
        let measured = rows
            .iter()
            .find(|row| row.id == fiber.id)
            .and_then(|row| row.curv_median_median);
        let abs_error = measured.map(|m| (m - fiber.reference_curvature).abs());
        let rel_error = abs_error
            .filter(|_| fiber.reference_curvature > 0.0)
            .map(|e| e / fiber.reference_curvature);

        match measured {
            Some(m) => log::info!("{}: reference {:.5}, measured {:.5}", fiber.id, fiber.reference_curvature, m),
            None => log::info!("{}: reference {:.5}, no curvature measured", fiber.id, fiber.reference_curvature),
        }

        writer.write_record(&[
            fiber.id.clone(),
            format_value(Some(fiber.reference_curvature), CURVATURE_DECIMALS),
            format_value(measured, CURVATURE_DECIMALS),
            format_value(abs_error, CURVATURE_DECIMALS),
            format_value(rel_error, CURVATURE_DECIMALS),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
