use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for fibermorph
#[derive(Error, Debug)]
pub enum FiberMorphError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("No .{extension} images found under {dir}")]
    NoImagesFound {
        dir: PathBuf,
        extension: String,
    },

    #[error("Duplicate image id '{id}': {first} and {second}")]
    DuplicateImageId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Unreadable image {path}: {source}")]
    UnreadableImage {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Threshold error: {0}")]
    Threshold(String),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{failed} of {total} image jobs failed")]
    JobsFailed {
        failed: usize,
        total: usize,
    },
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, FiberMorphError>;
