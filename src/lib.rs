// src/lib.rs - Library interface for fibermorph curvature analysis

pub mod aggregate;
pub mod batch;
pub mod binarize;
pub mod config;
pub mod curvature;
pub mod errors;
pub mod image_io;
pub mod image_utils;
pub mod logging;
pub mod morphology;
pub mod output;
pub mod particles;
pub mod pipeline;
pub mod pruning;
pub mod regions;
pub mod ridge_filter;
pub mod statistics;
pub mod validation;

// Re-export commonly used types and functions
pub use errors::{FiberMorphError, Result};
pub use config::{Config, FailurePolicy, WindowUnit};
pub use pipeline::{process_image, OutputLayout};
pub use image_io::{InputImage, load_image, save_image};
pub use batch::{run_batch, BatchReport, JobFailure, LogProgress, ProgressSink};
pub use aggregate::{FiberSummary, ImageSummary};

// Re-export the image stages
pub use ridge_filter::frangi;
pub use binarize::{binarize, clear_border, threshold_minimum};
pub use particles::{normalize_polarity, remove_particles};
pub use morphology::skeletonize;
pub use pruning::{prune_skeleton, PrunedSkeleton};
pub use regions::{label_mask, region_props, RegionProps};

// Re-export curvature functions
pub use curvature::{
    analyze_element,
    order_arc_pixels,
    taubin_radius,
    window_curvatures,
    windows,
    CurvatureSettings,
    ElementCurvature,
};
