//! The decorative glasses bitmap, loaded once per component.

use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("glasses image not found: {0}")]
    NotFound(String),
    #[error("glasses image has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Immutable RGBA glasses image.
#[derive(Debug, Clone)]
pub struct GlassesAsset {
    image: RgbaImage,
}

impl GlassesAsset {
    /// Decode the glasses image from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let image = image::open(path)?.into_rgba8();
        let asset = Self::from_image(image)?;
        tracing::info!(
            path = %path.display(),
            width = asset.image.width(),
            height = asset.image.height(),
            "glasses asset loaded"
        );
        Ok(asset)
    }

    pub fn from_image(image: RgbaImage) -> Result<Self, AssetError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::Empty { width, height });
        }
        Ok(Self { image })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
