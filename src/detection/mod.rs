//! Automatic detection of document-like regions
//!
//! A fixed sequence of pure stages over the whole canvas:
//! grayscale, blur, edges, gap closing, external contours, then area
//! filtering and a descending-area sort.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Detector, DetectorParams, StepTiming};
