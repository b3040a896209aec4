use image::GrayImage;
use imageproc::edges::canny;

/// Dual-threshold Canny edge map; edge pixels are 255, the rest 0.
///
/// Callers guarantee `0 < low <= high`; `imageproc` asserts the ordering.
pub fn apply(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    canny(image, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_output_dimensions_match_input() {
        let edges = apply(&GrayImage::new(17, 31), 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let edges = apply(&GrayImage::from_pixel(30, 30, Luma([200])), 50.0, 150.0);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_sharp_boundary_detected() {
        let img = GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([0]) } else { Luma([255]) });
        let edges = apply(&img, 50.0, 150.0);
        assert!(edges.pixels().any(|p| p.0[0] == 255));
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
