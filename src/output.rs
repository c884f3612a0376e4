use std::fs;
use std::path::{Path, PathBuf};
use csv::{Reader, Writer};

use crate::aggregate::{FiberSummary, ImageSummary};
use crate::errors::{FiberMorphError, Result};

/// Decimals written for curvature values
pub const CURVATURE_DECIMALS: usize = 5;
/// Decimals written for lengths
pub const LENGTH_DECIMALS: usize = 2;

/// Format a value with fixed decimals; undefined or non-finite values
/// become an empty cell
pub fn format_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => String::new(),
    }
}

fn parse_value(cell: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| FiberMorphError::Config(format!("Malformed number '{}' in CSV: {}", cell, e)))
}

fn create_parent<P: AsRef<Path>>(path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Name of the batch summary file for a timestamp
pub fn summary_file_name(timestamp: &str) -> String {
    format!("curvature_summary_data_{}.csv", timestamp)
}

/// Write the trimmed fiber table of one image
pub fn write_fiber_csv<P: AsRef<Path>>(fibers: &[FiberSummary], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    create_parent(output_path)?;

    let mut writer = Writer::from_path(output_path)?;
    writer.write_record(["curv_mean", "curv_median", "length"])?;

    for fiber in fibers {
        writer.write_record(&[
            format_value(fiber.curv_mean, CURVATURE_DECIMALS),
            format_value(fiber.curv_median, CURVATURE_DECIMALS),
            format_value(Some(fiber.length), LENGTH_DECIMALS),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a fiber table written by `write_fiber_csv`
pub fn read_fiber_csv<P: AsRef<Path>>(path: P) -> Result<Vec<FiberSummary>> {
    let mut reader = Reader::from_path(path)?;
    let mut fibers = Vec::new();

    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| parse_value(record.get(i).unwrap_or(""));
        let length = cell(2)?.ok_or_else(|| {
            FiberMorphError::Config("Fiber row without a length".to_string())
        })?;
        fibers.push(FiberSummary {
            curv_mean: cell(0)?,
            curv_median: cell(1)?,
            length,
        });
    }

    Ok(fibers)
}

/// Write the raw window curvatures of one element
pub fn write_within_element_csv<P: AsRef<Path>>(samples: &[f64], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    create_parent(output_path)?;

    let mut writer = Writer::from_path(output_path)?;
    writer.write_record(["window", "curv"])?;

    for (window, curv) in samples.iter().enumerate() {
        writer.write_record(&[
            window.to_string(),
            format_value(Some(*curv), CURVATURE_DECIMALS),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the batch summary, one row per image in the given order
pub fn write_summary_csv<P: AsRef<Path>>(rows: &[ImageSummary], output_path: P) -> Result<PathBuf> {
    let output_path = output_path.as_ref();
    create_parent(output_path)?;

    let mut writer = Writer::from_path(output_path)?;
    writer.write_record([
        "ID",
        "curv_mean_mean",
        "curv_mean_median",
        "curv_median_mean",
        "curv_median_median",
        "length_mean",
        "length_median",
        "hair_count",
    ])?;

    for row in rows {
        writer.write_record(&[
            row.id.clone(),
            format_value(row.curv_mean_mean, CURVATURE_DECIMALS),
            format_value(row.curv_mean_median, CURVATURE_DECIMALS),
            format_value(row.curv_median_mean, CURVATURE_DECIMALS),
            format_value(row.curv_median_median, CURVATURE_DECIMALS),
            format_value(row.length_mean, LENGTH_DECIMALS),
            format_value(row.length_median, LENGTH_DECIMALS),
            row.hair_count.to_string(),
        ])?;
    }

    writer.flush()?;
    log::info!("Summary written to {}", output_path.display());
    Ok(output_path.to_path_buf())
}
