use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

/// Thicken edges by `radius` pixels so one-pixel breaks (typically at
/// rectangle corners after non-maximum suppression) do not split a
/// silhouette into open fragments. A radius of 0 leaves the map untouched.
pub fn apply(edges: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return edges.clone();
    }
    dilate(edges, Norm::LInf, radius)
}
