//! Region extraction entry points
//!
//! `extract_manual` and `extract_auto` run decode, region resolution and
//! extraction for one request. They perform no I/O; publishing the result is
//! a separate step (see [`CropSet::publish`]).

use crate::aggregate::CropSet;
use crate::canvas::Canvas;
use crate::config::Config;
use crate::detection::{Detector, DetectorParams, StepTiming};
use crate::error::CropError;
use crate::extract::{extract_region, Extractor, OutputFormat};
use crate::regions::{resolve_manual, RegionSpec};

/// Result of automatic extraction plus detector diagnostics
#[derive(Debug, Clone)]
pub struct AutoExtraction {
    pub crops: CropSet,
    pub candidates_found: usize,
    pub steps: Vec<StepTiming>,
}

/// Shared, request-independent extraction machinery
pub struct Cropper {
    detector: Detector,
    extractor: Extractor,
    jpeg_quality: u8,
}

impl Cropper {
    pub fn new(config: &Config) -> Result<Self, CropError> {
        let extractor = Extractor::new(config.workers)?;
        tracing::info!(
            "Cropper ready: {} extraction workers, jpeg quality {}",
            extractor.workers(),
            config.jpeg_quality
        );

        Ok(Self {
            detector: Detector::new(config.detector),
            extractor,
            jpeg_quality: config.jpeg_quality,
        })
    }

    pub fn detector_params(&self) -> &DetectorParams {
        self.detector.params()
    }

    pub fn workers(&self) -> usize {
        self.extractor.workers()
    }

    /// Crop caller-specified rectangles, keeping the source format.
    ///
    /// One invalid spec fails the whole batch before anything is encoded.
    pub fn extract_manual(
        &self,
        image_bytes: &[u8],
        specs: &[RegionSpec],
    ) -> Result<CropSet, CropError> {
        let canvas = Canvas::decode(image_bytes)?;
        let regions = resolve_manual(specs, canvas.dimensions())?;

        let extracted =
            self.extractor
                .extract_all(&canvas, &regions, OutputFormat::matching(&canvas))?;

        Ok(CropSet::new(extracted))
    }

    /// Detect document-like regions and crop each as JPEG, largest first
    pub fn extract_auto(&self, image_bytes: &[u8]) -> Result<AutoExtraction, CropError> {
        let canvas = Canvas::decode(image_bytes)?;
        let detection = self.detector.detect(&canvas);
        for region in &detection.regions {
            tracing::debug!(
                "Detected {} at {} (contour area {:?})",
                region.name,
                region.rect,
                region.area
            );
        }
        tracing::debug!("Detection finished in {}ms", detection.total_time_ms);

        let format = OutputFormat::Jpeg {
            quality: self.jpeg_quality,
        };
        let extracted = self
            .extractor
            .extract_all(&canvas, &detection.regions, format)?;

        Ok(AutoExtraction {
            crops: CropSet::new(extracted),
            candidates_found: detection.candidates_found,
            steps: detection.steps,
        })
    }

    /// Decode and re-encode an image in its own format
    pub fn reencode(&self, image_bytes: &[u8]) -> Result<(Vec<u8>, OutputFormat), CropError> {
        let canvas = Canvas::decode(image_bytes)?;
        let format = OutputFormat::matching(&canvas);
        let bytes = format
            .encode(canvas.image())
            .map_err(|e| CropError::Encode {
                index: 0,
                message: e.to_string(),
            })?;
        Ok((bytes, format))
    }

    /// Crop a single caller-specified rectangle without the worker pool
    pub fn extract_single(
        &self,
        image_bytes: &[u8],
        spec: &RegionSpec,
    ) -> Result<CropSet, CropError> {
        let canvas = Canvas::decode(image_bytes)?;
        let regions = resolve_manual(std::slice::from_ref(spec), canvas.dimensions())?;
        let extracted = regions
            .iter()
            .enumerate()
            .map(|(index, region)| {
                extract_region(&canvas, region, index, OutputFormat::matching(&canvas))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CropSet::new(extracted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bound, Rect};
    use crate::regions::parse_region_specs;
    use clap::Parser;
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn cropper() -> Cropper {
        let mut config = Config::from(crate::Args::parse_from(["multicrop-server"]));
        config.workers = 2;
        Cropper::new(&config).unwrap()
    }

    fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn document_scan() -> Vec<u8> {
        let mut img = RgbImage::from_pixel(400, 300, Rgb([240, 240, 235]));
        for y in 60..180 {
            for x in 40..260 {
                img.put_pixel(x, y, Rgb([20, 25, 30]));
            }
        }
        encode(img, ImageFormat::Png)
    }

    #[test]
    fn test_manual_scenario_fails_on_second_rect() {
        let bytes = encode(RgbImage::from_pixel(200, 200, Rgb([1, 2, 3])), ImageFormat::Png);
        let specs = parse_region_specs(
            r#"[{"left":10,"top":20,"right":100,"bottom":120,"name":"Logo"},
                {"left":130,"top":200,"right":230,"bottom":300}]"#,
        )
        .unwrap();

        let err = cropper().extract_manual(&bytes, &specs).unwrap_err();

        match err {
            CropError::InvalidRectangle { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(source.bound(), Bound::Bottom);
            }
            other => panic!("expected InvalidRectangle, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_keeps_png_and_order() {
        let bytes = encode(RgbImage::from_pixel(200, 200, Rgb([9, 9, 9])), ImageFormat::Png);
        let specs = vec![
            RegionSpec::new(10, 20, 100, 120).named("Logo"),
            RegionSpec::new(0, 0, 50, 50),
            RegionSpec::new(150, 150, 200, 200).named("Corner"),
        ];

        let set = cropper().extract_manual(&bytes, &specs).unwrap();

        assert_eq!(set.count(), 3);
        let names: Vec<&str> = set.regions().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Logo", "crop_1", "Corner"]);
        for (i, region) in set.regions().iter().enumerate() {
            assert_eq!(region.index, i);
            assert_eq!(image::guess_format(&region.bytes).unwrap(), ImageFormat::Png);
        }
        let logo = image::load_from_memory(&set.regions()[0].bytes).unwrap();
        assert_eq!(logo.dimensions(), (90, 100));
    }

    #[test]
    fn test_manual_jpeg_source_stays_jpeg() {
        let bytes = encode(RgbImage::from_pixel(64, 64, Rgb([90, 120, 200])), ImageFormat::Jpeg);
        let set = cropper()
            .extract_manual(&bytes, &[RegionSpec::new(8, 8, 40, 24)])
            .unwrap();
        assert_eq!(
            image::guess_format(&set.regions()[0].bytes).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_empty_bytes_fail_both_paths_with_decode_error() {
        let cropper = cropper();
        assert!(matches!(
            cropper.extract_manual(&[], &[RegionSpec::new(0, 0, 1, 1)]),
            Err(CropError::Decode(_))
        ));
        assert!(matches!(cropper.extract_auto(&[]), Err(CropError::Decode(_))));
    }

    #[test]
    fn test_auto_returns_jpeg_crop_of_document() {
        let result = cropper().extract_auto(&document_scan()).unwrap();

        assert_eq!(result.crops.count(), 1);
        let region = &result.crops.regions()[0];
        assert_eq!(region.name, "auto_crop_0");
        assert_eq!(image::guess_format(&region.bytes).unwrap(), ImageFormat::Jpeg);
        assert!((region.rect.left - 40).abs() <= 4);
        assert!((region.rect.right - 260).abs() <= 4);
        assert_eq!(
            image::load_from_memory(&region.bytes).unwrap().dimensions(),
            (region.rect.width() as u32, region.rect.height() as u32)
        );
        assert_eq!(result.steps.len(), 6);
    }

    #[test]
    fn test_auto_on_blank_page_is_empty_not_error() {
        let bytes = encode(RgbImage::from_pixel(120, 80, Rgb([250, 250, 250])), ImageFormat::Png);
        let result = cropper().extract_auto(&bytes).unwrap();
        assert!(result.crops.is_empty());
    }

    #[test]
    fn test_auto_geometry_is_repeatable() {
        let cropper = cropper();
        let bytes = document_scan();
        let rects = |set: &CropSet| set.regions().iter().map(|r| r.rect).collect::<Vec<Rect>>();

        let first = cropper.extract_auto(&bytes).unwrap();
        let second = cropper.extract_auto(&bytes).unwrap();

        assert_eq!(rects(&first.crops), rects(&second.crops));
    }

    #[test]
    fn test_reencode_keeps_format() {
        let bytes = encode(RgbImage::from_pixel(10, 10, Rgb([1, 1, 1])), ImageFormat::Png);
        let (out, format) = cropper().reencode(&bytes).unwrap();
        assert_eq!(format.image_format(), ImageFormat::Png);
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_single_crop() {
        let bytes = encode(RgbImage::from_pixel(50, 50, Rgb([5, 5, 5])), ImageFormat::Png);
        let set = cropper()
            .extract_single(&bytes, &RegionSpec::new(5, 5, 25, 15))
            .unwrap();
        assert_eq!(set.count(), 1);
        assert_eq!(set.regions()[0].name, "crop_0");
        assert_eq!((set.regions()[0].width, set.regions()[0].height), (20, 10));
    }
}
