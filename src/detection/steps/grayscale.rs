use image::{DynamicImage, GrayImage};

/// Convert the canvas to single-channel luminance
pub fn apply(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}
