use std::fs;
use std::path::{Path, PathBuf};
use image::{GrayImage, ImageFormat};

use crate::errors::{FiberMorphError, Result};

/// Represents a grayscale input image with its identity
pub struct InputImage {
    pub image: GrayImage,
    pub path: PathBuf,
    /// File stem, used to name every artifact derived from this image
    pub id: String,
}

/// Get all files with the given extension from a directory (recursively),
/// sorted lexicographically by path
pub fn find_images_in_dir<P: AsRef<Path>>(dir_path: P, extension: &str) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.is_dir() {
        return Err(FiberMorphError::InvalidPath(dir_path.to_path_buf()));
    }

    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    let mut files = Vec::new();
    find_images_recursive(dir_path, &extension, &mut files)?;
    files.sort();

    Ok(files)
}

/// Helper function to recursively search for matching files
fn find_images_recursive(dir_path: &Path, extension: &str, result: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_images_recursive(&path, extension, result)?;
        } else if path.is_file() {
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase() == extension)
                .unwrap_or(false);
            if matches {
                result.push(path);
            }
        }
    }

    Ok(())
}

/// Stem of an image path, used as its id
pub fn image_id<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| FiberMorphError::InvalidPath(path.to_path_buf()))
}

/// Check that an image header decodes without loading the pixels
pub fn probe_image<P: AsRef<Path>>(path: P) -> Result<(u32, u32)> {
    let path = path.as_ref();
    image::image_dimensions(path).map_err(|source| FiberMorphError::UnreadableImage {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an image as 8-bit grayscale
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();
    let id = image_id(path)?;

    let image = image::open(path)
        .map_err(|source| FiberMorphError::UnreadableImage {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();

    Ok(InputImage {
        image,
        path: path.to_path_buf(),
        id,
    })
}

/// Save a grayscale image as PNG
pub fn save_image<P: AsRef<Path>>(image: &GrayImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Create `base/name` if absent and return it.
///
/// Safe when several workers create the same directory at once.
pub fn make_subdirectory<P: AsRef<Path>>(base: P, name: &str) -> Result<PathBuf> {
    let path = base.as_ref().join(name);
    if !path.is_dir() {
        log::debug!("Creating output directory {}", path.display());
    }
    fs::create_dir_all(&path)?;
    Ok(path)
}
