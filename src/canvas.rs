//! Raster decoding into an immutable pixel canvas

use crate::error::CropError;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Decoded image together with the container format it came from
#[derive(Debug, Clone)]
pub struct Canvas {
    image: DynamicImage,
    format: ImageFormat,
}

impl Canvas {
    /// Decode an encoded image buffer (PNG, JPEG, GIF, BMP, WebP, TIFF, ...)
    pub fn decode(bytes: &[u8]) -> Result<Self, CropError> {
        if bytes.is_empty() {
            return Err(CropError::Decode("empty image buffer".to_string()));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| CropError::Decode(format!("unrecognized image container: {}", e)))?;

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CropError::Decode(format!("failed to decode {:?}: {}", format, e)))?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CropError::Decode(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        tracing::debug!(
            "Decoded {:?} canvas {}x{} ({:?})",
            format,
            width,
            height,
            image.color()
        );

        Ok(Self { image, format })
    }

    #[cfg(test)]
    pub fn from_image(image: DynamicImage, format: ImageFormat) -> Self {
        Self { image, format }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Container format the canvas was decoded from
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
