use std::path::Path;

use fibermorph_rust_lib::config::Config;
use image::{GrayImage, Luma};

/// Configuration pointing a batch at scratch directories, curvature in 1/px
pub fn scratch_config(input: &Path, output: &Path) -> Config {
    Config {
        input_directory: input.to_string_lossy().into_owned(),
        output_directory: output.to_string_lossy().into_owned(),
        file_type: "png".to_string(),
        jobs: 2,
        resolution: 1.0,
        window_size: 40.0,
        order_arc_pixels: true,
        ..Config::default()
    }
}

/// Default settings (raster order, 10 px windows) on scratch directories,
/// curvature in 1/px
pub fn default_config(input: &Path, output: &Path) -> Config {
    Config {
        input_directory: input.to_string_lossy().into_owned(),
        output_directory: output.to_string_lossy().into_owned(),
        file_type: "png".to_string(),
        resolution: 1.0,
        ..Config::default()
    }
}

/// Save a grayscale fixture as `<dir>/<id>.png`
pub fn write_png(dir: &Path, id: &str, image: &GrayImage) {
    image
        .save(dir.join(format!("{}.png", id)))
        .expect("fixture image should save");
}

/// PNG whose header decodes but whose pixel data is cut short, so it
/// passes the pre-flight probe and fails inside its job
pub fn write_truncated_png(dir: &Path, id: &str) {
    let path = dir.join(format!("{}.png", id));
    let noise = GrayImage::from_fn(64, 64, |x, y| Luma([((x * 31 + y * 17) % 251) as u8]));
    noise.save(&path).expect("fixture image should save");

    let bytes = std::fs::read(&path).expect("fixture should read back");
    std::fs::write(&path, &bytes[..bytes.len() / 2]).expect("fixture should truncate");
}
