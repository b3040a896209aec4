use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

/// Sigma OpenCV derives for a 5x5 kernel when none is given
pub const KERNEL_5X5_SIGMA: f32 = 1.1;

/// Gaussian blur to suppress sensor and scan noise before edge detection.
///
/// Non-positive sigma returns the image unchanged; `imageproc` panics on it.
pub fn apply(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    gaussian_blur_f32(image, sigma)
}
