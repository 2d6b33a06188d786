pub mod load;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

pub use self::load::{LoadError, load};
use crate::compare::buffer::PixelBuffer;

/// Raster extensions picked up when pairing directories.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Encode a canvas in the format implied by `path`'s extension.
/// JPEG has no alpha channel, so it is dropped first.
pub fn encode(canvas: PixelBuffer, path: &Path) -> Result<Vec<u8>, image::ImageError> {
    let format = ImageFormat::from_path(path)?;
    let (w, h) = (canvas.width(), canvas.height());
    let img = canvas.into_image().ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    debug!(width = w, height = h, ?format, "encoding diff image");

    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut cursor, format)?,
        _ => img.write_to(&mut cursor, format)?,
    }
    Ok(bytes)
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Remove stale output files. Missing files are fine; returns the paths
/// that exist but could not be removed.
pub fn clean_outputs<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Vec<PathBuf> {
    let mut stuck = Vec::new();
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove stale diff image");
                stuck.push(path.to_path_buf());
            }
        }
    }
    stuck
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Recursively collect image files under `dir` as IDs: relative paths with
/// `/` separators, extension included. A missing directory yields no IDs.
pub fn list_image_ids(dir: &Path) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(ids);
    }
    let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries =
        glob::glob(&pattern).with_context(|| format!("Invalid search pattern {pattern}"))?;
    for path in entries.flatten() {
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(dir) {
            let id: Vec<_> = rel.iter().map(|c| c.to_string_lossy()).collect();
            ids.insert(id.join("/"));
        }
    }
    Ok(ids)
}
