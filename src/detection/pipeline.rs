use crate::canvas::Canvas;
use crate::regions::Region;
use serde::Serialize;
use std::time::Instant;

use super::steps::{self, contours::Candidate};

/// Tunable detector constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectorParams {
    /// Gaussian sigma applied before edge detection
    pub blur_sigma: f32,
    /// Canny hysteresis thresholds on an 8-bit luminance scale
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Dilation radius used to close gaps in the edge map (0 disables)
    pub close_radius: u8,
    /// Contours enclosing less than this many square pixels are noise
    pub min_area: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            blur_sigma: steps::blur::KERNEL_5X5_SIGMA,
            low_threshold: 50.0,
            high_threshold: 150.0,
            close_radius: 1,
            min_area: 5000.0,
        }
    }
}

/// Timing information for a single detection stage
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Outcome of one detection run
#[derive(Debug, Clone)]
pub struct Detection {
    /// Surviving regions, largest first
    pub regions: Vec<Region>,
    /// External contours found before area filtering
    pub candidates_found: usize,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Edge/contour based detector for document-like rectangles
#[derive(Debug, Clone, Default)]
pub struct Detector {
    params: DetectorParams,
}

impl Detector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect candidate regions on a decoded canvas.
    ///
    /// Never fails: an empty result means no contour cleared the area
    /// threshold.
    pub fn detect(&self, canvas: &Canvas) -> Detection {
        let start = Instant::now();
        let mut timings = Vec::new();
        let p = &self.params;

        let gray = run_step("grayscale", &mut timings, || {
            steps::grayscale::apply(canvas.image())
        });
        let blurred = run_step("blur", &mut timings, || {
            steps::blur::apply(&gray, p.blur_sigma)
        });
        let edges = run_step("edges", &mut timings, || {
            steps::edges::apply(&blurred, p.low_threshold, p.high_threshold)
        });
        let closed = run_step("close", &mut timings, || {
            steps::close::apply(&edges, p.close_radius)
        });
        let candidates = run_step("contours", &mut timings, || {
            steps::contours::external(&closed)
        });
        let candidates_found = candidates.len();

        let kept = run_step("filter", &mut timings, || {
            filter_and_sort(candidates, p.min_area)
        });

        let regions: Vec<Region> = kept
            .into_iter()
            .enumerate()
            .map(|(index, c)| Region::auto(c.rect, index, c.area))
            .collect();

        tracing::debug!(
            "Detection kept {} of {} contours (min area {})",
            regions.len(),
            candidates_found,
            p.min_area
        );

        Detection {
            regions,
            candidates_found,
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: timings,
        }
    }
}

/// Drop candidates below `min_area` and order the rest largest first.
///
/// The sort is stable, so equal areas keep their tracing order.
pub fn filter_and_sort(candidates: Vec<Candidate>, min_area: f64) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.area >= min_area)
        .collect();
    kept.sort_by(|a, b| b.area.total_cmp(&a.area));
    kept
}

fn run_step<T, F>(name: &str, timings: &mut Vec<StepTiming>, step_fn: F) -> T
where
    F: FnOnce() -> T,
{
    let step_start = Instant::now();
    let result = step_fn();
    timings.push(StepTiming {
        name: name.to_string(),
        time_ms: step_start.elapsed().as_millis() as u64,
    });
    result
}
