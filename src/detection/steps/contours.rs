use crate::geometry::Rect;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;

/// An outermost contour reduced to what the detector needs
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Enclosed area of the contour polygon (shoelace formula)
    pub area: f64,
    /// Minimal axis-aligned rectangle containing every contour point
    pub rect: Rect,
}

/// Trace the external contours of a binary edge map.
///
/// Only outer borders with no enclosing parent are kept; holes and nested
/// silhouettes are discarded. Candidates come back in tracing (raster) order.
pub fn external(edges: &GrayImage) -> Vec<Candidate> {
    let contours: Vec<Contour<u32>> = find_contours(edges);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            Some(Candidate {
                area: polygon_area(&c.points),
                rect: bounding_rect(&c.points)?,
            })
        })
        .collect()
}

/// Absolute area enclosed by a closed polygon
pub fn polygon_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| f64::from(a.x) * f64::from(b.y) - f64::from(b.x) * f64::from(a.y))
        .sum();

    twice_area.abs() / 2.0
}

/// Bounding rectangle with exclusive right/bottom edges
pub fn bounding_rect(points: &[Point<u32>]) -> Option<Rect> {
    let first = points.first()?;
    let init = (first.x, first.y, first.x, first.y);
    let (min_x, min_y, max_x, max_y) = points.iter().fold(init, |acc, p| {
        (acc.0.min(p.x), acc.1.min(p.y), acc.2.max(p.x), acc.3.max(p.y))
    });

    Some(Rect::new(
        i64::from(min_x),
        i64::from(min_y),
        i64::from(max_x) + 1,
        i64::from(max_y) + 1,
    ))
}
