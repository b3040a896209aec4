//! Cropping and re-encoding of validated regions
//!
//! Each region is copied out of the canvas into its own buffer and encoded
//! independently. Regions are spread over a fixed-size worker pool; every
//! result lands in the slot of its region index, so the output order never
//! depends on which worker finished first.

use crate::canvas::Canvas;
use crate::error::CropError;
use crate::geometry::Rect;
use crate::regions::Region;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::io::Cursor;

/// Target encoding for extracted regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Same container as the source, falling back to PNG when it cannot be written
    Native(ImageFormat),
    /// Lossy JPEG at the given quality (1-100)
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// Format parity with the decoded canvas
    pub fn matching(canvas: &Canvas) -> Self {
        OutputFormat::Native(canvas.format())
    }

    /// Container actually written
    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Native(format) if format.writing_enabled() => *format,
            OutputFormat::Native(_) => ImageFormat::Png,
            OutputFormat::Jpeg { .. } => ImageFormat::Jpeg,
        }
    }

    /// Preferred file extension, without the dot
    pub fn extension(&self) -> &'static str {
        self.image_format()
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
    }

    /// Encode a standalone image in this format
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        match self {
            OutputFormat::Jpeg { quality } => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, *quality);
                jpeg_compatible(image).write_with_encoder(encoder)?;
            }
            OutputFormat::Native(_) => {
                let format = self.image_format();
                if format == ImageFormat::Jpeg {
                    jpeg_compatible(image).write_to(&mut Cursor::new(&mut buffer), format)?;
                } else {
                    image.write_to(&mut Cursor::new(&mut buffer), format)?;
                }
            }
        }
        Ok(buffer)
    }
}

/// JPEG has no alpha channel and no 16-bit mode
fn jpeg_compatible(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image.clone(),
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// One cropped and encoded region
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    /// Position in the output sequence
    pub index: usize,
    pub name: String,
    pub rect: Rect,
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Copy `region` out of the canvas and encode it
pub fn extract_region(
    canvas: &Canvas,
    region: &Region,
    index: usize,
    format: OutputFormat,
) -> Result<ExtractedRegion, CropError> {
    let (x, y, width, height) = region.rect.to_crop_box();
    let cropped = canvas.image().crop_imm(x, y, width, height);

    let bytes = format.encode(&cropped).map_err(|e| CropError::Encode {
        index,
        message: e.to_string(),
    })?;

    tracing::debug!(
        "Extracted {:?} region {} '{}' {} ({} px, {} bytes)",
        region.source,
        index,
        region.name,
        region.rect,
        region.rect.area(),
        bytes.len()
    );

    Ok(ExtractedRegion {
        index,
        name: region.name.clone(),
        rect: region.rect,
        bytes,
        format,
        width: cropped.width(),
        height: cropped.height(),
    })
}

/// Fixed-size pool that extracts the regions of one request in parallel
pub struct Extractor {
    pool: ThreadPool,
}

impl Extractor {
    /// Create a pool with `workers` threads; 0 means one per CPU
    pub fn new(workers: usize) -> Result<Self, CropError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("crop-worker-{}", i))
            .build()
            .map_err(|e| CropError::Internal(format!("Failed to start worker pool: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Extract every region, returning results in region order.
    ///
    /// The first failing region (by index) fails the whole call.
    pub fn extract_all(
        &self,
        canvas: &Canvas,
        regions: &[Region],
        format: OutputFormat,
    ) -> Result<Vec<ExtractedRegion>, CropError> {
        let mut slots: Vec<Option<Result<ExtractedRegion, CropError>>> =
            (0..regions.len()).map(|_| None).collect();

        self.pool.install(|| {
            slots
                .par_iter_mut()
                .zip(regions.par_iter())
                .enumerate()
                .for_each(|(index, (slot, region))| {
                    *slot = Some(extract_region(canvas, region, index, format));
                });
        });

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(CropError::Internal(format!("Region {} was never extracted", index)))
                })
            })
            .collect()
    }
}
