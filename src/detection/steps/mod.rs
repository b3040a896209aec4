//! Individual detection stages

pub mod blur;
pub mod close;
pub mod contours;
pub mod edges;
pub mod grayscale;
