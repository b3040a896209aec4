//! Rectangle geometry and validation against canvas bounds
//!
//! Coordinates are taken exactly as given: nothing is swapped, clamped or
//! sign-flipped. A rectangle either satisfies
//! `0 <= left < right <= width` and `0 <= top < bottom <= height`, or it is
//! rejected with the bound that failed.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One edge of a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Left,
    Top,
    Right,
    Bottom,
}

impl Bound {
    pub const ALL: [Bound; 4] = [Bound::Left, Bound::Top, Bound::Right, Bound::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bound lying outside the canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundViolation {
    pub bound: Bound,
    pub value: i64,
    /// Nearest value the bound may take (0 for left/top, the canvas size otherwise)
    pub limit: i64,
}

impl BoundViolation {
    /// Distance between the offending value and the canvas edge
    pub fn excess(&self) -> u64 {
        self.value.abs_diff(self.limit)
    }
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Bound::Left | Bound::Top => {
                write!(f, "{} ({}) must not be negative", self.bound, self.value)
            }
            Bound::Right => write!(
                f,
                "right ({}) exceeds canvas width ({})",
                self.value, self.limit
            ),
            Bound::Bottom => write!(
                f,
                "bottom ({}) exceeds canvas height ({})",
                self.value, self.limit
            ),
        }
    }
}

fn describe(primary: &BoundViolation, others: &[BoundViolation]) -> String {
    std::iter::once(primary)
        .chain(others)
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a rectangle was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RectError {
    #[error("{bound} is not an integer: {raw}")]
    NotInteger { bound: Bound, raw: String },

    #[error("{bound} ({value}) must be greater than {opposite} ({opposite_value})")]
    Empty {
        bound: Bound,
        value: i64,
        opposite: Bound,
        opposite_value: i64,
    },

    /// Every bound outside the canvas, the furthest one first
    #[error("{}", describe(.primary, .others))]
    OutOfBounds {
        primary: BoundViolation,
        others: Vec<BoundViolation>,
    },
}

impl RectError {
    /// The bound that violated its constraint (the furthest out, for
    /// rectangles crossing several canvas edges)
    pub fn bound(&self) -> Bound {
        match self {
            Self::NotInteger { bound, .. } | Self::Empty { bound, .. } => *bound,
            Self::OutOfBounds { primary, .. } => primary.bound,
        }
    }

    /// All canvas-edge violations, empty for the other kinds
    pub fn violations(&self) -> Vec<BoundViolation> {
        match self {
            Self::OutOfBounds { primary, others } => std::iter::once(primary)
                .chain(others)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Axis-aligned rectangle in canvas pixel coordinates, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// Pixel count covered by the rectangle
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    pub fn get(&self, bound: Bound) -> i64 {
        match bound {
            Bound::Left => self.left,
            Bound::Top => self.top,
            Bound::Right => self.right,
            Bound::Bottom => self.bottom,
        }
    }

    /// Check the rectangle against a `width` x `height` canvas.
    ///
    /// Order of checks: non-empty extent first (`left < right`,
    /// `top < bottom`), then all four bounds against the canvas edges at
    /// once. The furthest-out bound is reported first.
    pub fn validate(self, width: u32, height: u32) -> Result<Rect, RectError> {
        if self.left >= self.right {
            return Err(RectError::Empty {
                bound: Bound::Right,
                value: self.right,
                opposite: Bound::Left,
                opposite_value: self.left,
            });
        }
        if self.top >= self.bottom {
            return Err(RectError::Empty {
                bound: Bound::Bottom,
                value: self.bottom,
                opposite: Bound::Top,
                opposite_value: self.top,
            });
        }

        let limits = [
            (Bound::Left, 0),
            (Bound::Top, 0),
            (Bound::Right, i64::from(width)),
            (Bound::Bottom, i64::from(height)),
        ];
        let mut violations: Vec<BoundViolation> = limits
            .into_iter()
            .map(|(bound, limit)| BoundViolation {
                bound,
                value: self.get(bound),
                limit,
            })
            .filter(|v| match v.bound {
                Bound::Left | Bound::Top => v.value < v.limit,
                Bound::Right | Bound::Bottom => v.value > v.limit,
            })
            .collect();

        // Stable: equal excess keeps left, top, right, bottom order
        violations.sort_by(|a, b| b.excess().cmp(&a.excess()));
        let mut violations = violations.into_iter();
        if let Some(primary) = violations.next() {
            return Err(RectError::OutOfBounds {
                primary,
                others: violations.collect(),
            });
        }

        Ok(self)
    }

    /// Crop origin and size as unsigned pixel values.
    ///
    /// Only meaningful for a rectangle that passed [`Rect::validate`].
    pub fn to_crop_box(&self) -> (u32, u32, u32, u32) {
        let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
        (
            clamp(self.left),
            clamp(self.top),
            clamp(self.width()),
            clamp(self.height()),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}
