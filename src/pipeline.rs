// src/pipeline.rs - Curvature analysis of one image, from raw pixels to a summary row

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::aggregate::{summarize_image, trim_fiber_outliers, FiberSummary, ImageSummary};
use crate::binarize::binarize;
use crate::config::Config;
use crate::curvature::{analyze_element, CurvatureSettings};
use crate::errors::Result;
use crate::image_io::{make_subdirectory, save_image, InputImage};
use crate::image_utils::{float_to_gray, invert_mask};
use crate::morphology::skeletonize;
use crate::output::{write_fiber_csv, write_within_element_csv};
use crate::particles::remove_particles;
use crate::pruning::prune_skeleton;
use crate::regions::{label_mask, region_props};
use crate::ridge_filter::frangi;

/// Directories every artifact of a run is written to
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub analysis: PathBuf,
    /// Stage image directories, present only when images are saved
    pub stages: Option<StageDirs>,
    /// Present only when raw element curvatures are written
    pub within_element: Option<PathBuf>,
}

/// One directory per intermediate image
#[derive(Debug, Clone)]
pub struct StageDirs {
    pub filtered: PathBuf,
    pub binary: PathBuf,
    pub clean: PathBuf,
    pub skeletonized: PathBuf,
    pub pruned: PathBuf,
}

impl OutputLayout {
    /// Create every directory the configuration asks for under `root`
    pub fn create<P: AsRef<Path>>(root: P, config: &Config) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let stages = if config.save_images {
            Some(StageDirs {
                filtered: make_subdirectory(root, "filtered")?,
                binary: make_subdirectory(root, "binary")?,
                clean: make_subdirectory(root, "clean")?,
                skeletonized: make_subdirectory(root, "skeletonized")?,
                pruned: make_subdirectory(root, "pruned")?,
            })
        } else {
            None
        };

        let within_element = if config.within_element {
            Some(make_subdirectory(root, "within_element")?)
        } else {
            None
        };

        Ok(Self {
            root: root.to_path_buf(),
            analysis: make_subdirectory(root, "analysis")?,
            stages,
            within_element,
        })
    }
}

fn save_stage(dir: Option<&PathBuf>, id: &str, image: &GrayImage) -> Result<()> {
    if let Some(dir) = dir {
        save_image(image, dir.join(format!("{}.png", id)))?;
    }
    Ok(())
}

/// Process a single image and return its summary row
pub fn process_image(
    input_image: InputImage,
    config: &Config,
    layout: &OutputLayout,
) -> Result<ImageSummary> {
    let InputImage { image, path, id } = input_image;
    let stages = layout.stages.as_ref();
    log::debug!("Processing {} ({}x{})", path.display(), image.width(), image.height());

    // Step 1: Ridge enhancement
    let response = frangi(&image);
    if let Some(stages) = stages {
        save_stage(Some(&stages.filtered), &id, &float_to_gray(&response))?;
    }

    // Step 2: Threshold, clear border, reconnect
    let binary = binarize(&response, config.border_buffer)?;
    if let Some(stages) = stages {
        save_stage(Some(&stages.binary), &id, &invert_mask(&binary))?;
    }

    // Step 3: Drop specks before thinning
    let clean = remove_particles(&binary, config.min_fiber_px);
    save_stage(stages.map(|s| &s.clean), &id, &clean)?;

    // Step 4: Skeletonize
    let skeleton = skeletonize(&clean);
    save_stage(stages.map(|s| &s.skeletonized), &id, &skeleton)?;

    // Step 5: Cut junctions so every element is a single arc
    let pruned = prune_skeleton(&skeleton, config.min_arc_px);
    save_stage(stages.map(|s| &s.pruned), &id, &pruned.mask)?;

    // Step 6: Curvature per element
    let settings = CurvatureSettings::from_config(config);
    let elements = region_props(&label_mask(&pruned.mask));
    let mut fibers: Vec<FiberSummary> = Vec::with_capacity(elements.len());

    for (label, props) in &elements {
        let element = analyze_element(*label, &props.coords, &settings);
        log::trace!(
            "{} element {}: {} px, eccentricity {:.3}, {} windows",
            id,
            label,
            props.area,
            props.eccentricity,
            element.samples.len()
        );

        if let Some(dir) = &layout.within_element {
            write_within_element_csv(&element.samples, dir.join(format!("{}_{}.csv", id, label)))?;
        }
        fibers.push(element.summary);
    }

    // Step 7: Outlier removal and summary
    let trimmed = trim_fiber_outliers(&fibers);
    write_fiber_csv(&trimmed, layout.analysis.join(format!("{}.csv", id)))?;

    let summary = summarize_image(&id, &trimmed);
    log::debug!(
        "{}: {} elements, {} junctions, {} fibers kept",
        id,
        elements.len(),
        pruned.junctions.len(),
        summary.hair_count
    );

    Ok(summary)
}
