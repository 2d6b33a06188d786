use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::compare::buffer::PixelBuffer;

/// Extension of the metadata file stored next to each image.
pub const SIDECAR_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata in {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported image format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("viewport in {} exceeds the {width}x{height} image", path.display())]
    Viewport { path: PathBuf, width: u32, height: u32 },

    #[error("decoder for {} panicked", path.display())]
    Panicked { path: PathBuf },
}

/// Region of a capture holding the real content, in buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Device pixel ratio of the capture. Informational only.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Viewport {
    pub fn full_frame(image: &PixelBuffer) -> Self {
        Self {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
            scale: 1.0,
        }
    }

    /// Whether the region lies entirely inside `image`.
    pub fn fits(&self, image: &PixelBuffer) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        right.is_some_and(|r| r <= image.width()) && bottom.is_some_and(|b| b <= image.height())
    }

    /// The part of the region that lies inside `image`.
    pub fn clamped_to(&self, image: &PixelBuffer) -> Self {
        let x = self.x.min(image.width());
        let y = self.y.min(image.height());
        Self {
            x,
            y,
            width: self.width.min(image.width() - x),
            height: self.height.min(image.height() - y),
            scale: self.scale,
        }
    }
}

/// Sidecar descriptor stored next to a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInformation {
    pub name: String,
    pub viewport: Viewport,
}

/// An image and its metadata. Both absent when the file does not exist.
#[derive(Debug, Clone, Default)]
pub struct LoadedImage {
    pub image: Option<PixelBuffer>,
    pub info: Option<TestInformation>,
}

impl LoadedImage {
    /// Image plus the viewport to compare, if the image exists.
    pub fn region(&self) -> Option<(&PixelBuffer, Viewport)> {
        let image = self.image.as_ref()?;
        let viewport = self
            .info
            .as_ref()
            .map_or_else(|| Viewport::full_frame(image), |info| info.viewport.clamped_to(image));
        Some((image, viewport))
    }
}

/// Pick the codec from the file extension.
pub fn format_for(path: &Path) -> Result<ImageFormat, LoadError> {
    ImageFormat::from_path(path).map_err(|_| LoadError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

pub fn decode(path: &Path, bytes: &[u8]) -> Result<PixelBuffer, LoadError> {
    let format = format_for(path)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|source| {
        LoadError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(PixelBuffer::from(img.to_rgba8()))
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, LoadError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LoadError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_sidecar(image_path: &Path) -> Result<Option<TestInformation>, LoadError> {
    let path = image_path.with_extension(SIDECAR_EXTENSION);
    let Some(bytes) = read_optional(&path).await? else {
        return Ok(None);
    };
    let info = serde_json::from_slice(&bytes).map_err(|source| LoadError::Metadata {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "loaded sidecar metadata");
    Ok(Some(info))
}

/// Load an image and its sidecar metadata.
///
/// A missing image is not an error: the result simply holds neither image nor
/// metadata. Without a sidecar, the metadata covers the whole decoded image
/// and is named after the file.
pub async fn load(path: &Path) -> Result<LoadedImage, LoadError> {
    let Some(bytes) = read_optional(path).await? else {
        debug!(path = %path.display(), "image absent");
        return Ok(LoadedImage::default());
    };
    let info = read_sidecar(path).await?;

    let owned = path.to_path_buf();
    let image = tokio::task::spawn_blocking(move || decode(&owned, &bytes))
        .await
        .map_err(|_| LoadError::Panicked {
            path: path.to_path_buf(),
        })??;
    if let Some(info) = &info
        && !info.viewport.fits(&image)
    {
        return Err(LoadError::Viewport {
            path: path.with_extension(SIDECAR_EXTENSION),
            width: image.width(),
            height: image.height(),
        });
    }
    let info = info.unwrap_or_else(|| TestInformation {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        viewport: Viewport::full_frame(&image),
    });
    debug!(
        path = %path.display(),
        name = %info.name,
        width = image.width(),
        height = image.height(),
        scale = info.viewport.scale,
        "decoded image"
    );

    Ok(LoadedImage {
        image: Some(image),
        info: Some(info),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, w: u32, h: u32, color: Rgba<u8>) {
        RgbaImage::from_pixel(w, h, color).save(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("nope.png")).await.unwrap();
        assert!(loaded.image.is_none());
        assert!(loaded.info.is_none());
        assert!(loaded.region().is_none());
    }

    #[tokio::test]
    async fn synthesizes_full_frame_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("button.png");
        write_png(&path, 5, 3, Rgba([1, 2, 3, 255]));

        let loaded = load(&path).await.unwrap();
        let info = loaded.info.unwrap();
        assert_eq!(info.name, "button.png");
        assert_eq!(
            info.viewport,
            Viewport {
                x: 0,
                y: 0,
                width: 5,
                height: 3,
                scale: 1.0
            }
        );
        let image = loaded.image.unwrap();
        assert_eq!((image.width(), image.height()), (5, 3));
    }

    #[tokio::test]
    async fn reads_sidecar_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        write_png(&path, 10, 10, Rgba([0, 0, 0, 255]));
        std::fs::write(
            dir.path().join("card.json"),
            r#"{"name":"Card","viewport":{"x":2,"y":1,"width":4,"height":5,"scale":2}}"#,
        )
        .unwrap();

        let loaded = load(&path).await.unwrap();
        let (_, vp) = loaded.region().unwrap();
        assert_eq!((vp.x, vp.y, vp.width, vp.height), (2, 1, 4, 5));
        assert_eq!(vp.scale, 2.0);
        assert_eq!(loaded.info.unwrap().name, "Card");
    }

    #[tokio::test]
    async fn malformed_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        write_png(&path, 2, 2, Rgba([0, 0, 0, 255]));
        std::fs::write(dir.path().join("card.json"), "{ not json").unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Metadata { .. }));
    }

    #[tokio::test]
    async fn oversized_sidecar_viewport_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        write_png(&path, 2, 2, Rgba([0, 0, 0, 255]));
        std::fs::write(
            dir.path().join("card.json"),
            r#"{"name":"Card","viewport":{"x":0,"y":0,"width":1500000000,"height":1}}"#,
        )
        .unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Viewport {
                width: 2,
                height: 2,
                ..
            }
        ));
        assert!(err.to_string().contains("card.json"));

        std::fs::write(
            dir.path().join("card.json"),
            r#"{"name":"Card","viewport":{"x":4294967295,"y":0,"width":2,"height":1}}"#,
        )
        .unwrap();
        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Viewport { .. }));
    }

    #[test]
    fn region_is_clamped_to_the_image() {
        let image = PixelBuffer::new(4, 3);
        let loaded = LoadedImage {
            image: Some(image),
            info: Some(TestInformation {
                name: "wide".into(),
                viewport: Viewport {
                    x: 1,
                    y: 2,
                    width: u32::MAX,
                    height: 5000,
                    scale: 1.0,
                },
            }),
        };
        let (_, vp) = loaded.region().unwrap();
        assert_eq!((vp.x, vp.y, vp.width, vp.height), (1, 2, 3, 1));
    }

    #[tokio::test]
    async fn undecodable_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.xyz");
        std::fs::write(&path, b"whatever").unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    }
}
