//! Region model and resolution of caller-supplied rectangles
//!
//! A request's crop list is resolved in input order. Any failing spec aborts
//! the whole batch so callers never receive a partial set.

use crate::error::CropError;
use crate::geometry::{Bound, Rect, RectError};
use serde::{Deserialize, Serialize};

/// Where a region came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    Manual,
    Auto,
}

/// A validated rectangle with its resolved name
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub rect: Rect,
    pub name: String,
    pub source: RegionSource,
    /// Enclosed contour area, only set for detected regions
    pub area: Option<f64>,
}

impl Region {
    pub fn manual(rect: Rect, name: String) -> Self {
        Self {
            rect,
            name,
            source: RegionSource::Manual,
            area: None,
        }
    }

    pub fn auto(rect: Rect, index: usize, area: f64) -> Self {
        Self {
            rect,
            name: format!("auto_crop_{}", index),
            source: RegionSource::Auto,
            area: Some(area),
        }
    }
}

/// A coordinate exactly as the caller sent it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Integer(i64),
    Other(serde_json::Value),
}

impl Coordinate {
    /// Coordinate from a form text field
    pub fn from_text(text: &str) -> Self {
        Coordinate::Other(serde_json::Value::String(text.to_string()))
    }

    /// Integer value, accepting JSON integers and strings holding one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Coordinate::Integer(value) => Some(*value),
            Coordinate::Other(serde_json::Value::String(text)) => text.trim().parse().ok(),
            Coordinate::Other(_) => None,
        }
    }

    fn raw(&self) -> String {
        match self {
            Coordinate::Integer(value) => value.to_string(),
            Coordinate::Other(value) => value.to_string(),
        }
    }
}

/// One partially-specified rectangle from the caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegionSpec {
    #[serde(default)]
    pub left: Option<Coordinate>,
    #[serde(default)]
    pub top: Option<Coordinate>,
    #[serde(default)]
    pub right: Option<Coordinate>,
    #[serde(default)]
    pub bottom: Option<Coordinate>,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
impl RegionSpec {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left: Some(Coordinate::Integer(left)),
            top: Some(Coordinate::Integer(top)),
            right: Some(Coordinate::Integer(right)),
            bottom: Some(Coordinate::Integer(bottom)),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl RegionSpec {
    fn coordinate(&self, bound: Bound) -> Option<&Coordinate> {
        match bound {
            Bound::Left => self.left.as_ref(),
            Bound::Top => self.top.as_ref(),
            Bound::Right => self.right.as_ref(),
            Bound::Bottom => self.bottom.as_ref(),
        }
    }

    /// Caller-supplied name when present and non-empty, else `crop_<index>`
    pub fn resolved_name(&self, index: usize) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("crop_{}", index),
        }
    }

    /// Turn the region spec into a rectangle, without checking canvas bounds
    fn to_rect(&self, index: usize) -> Result<Rect, CropError> {
        for bound in Bound::ALL {
            if self.coordinate(bound).is_none() {
                return Err(CropError::MissingField {
                    index,
                    field: bound,
                });
            }
        }

        let mut values = [0i64; 4];
        for (slot, bound) in values.iter_mut().zip(Bound::ALL) {
            let coordinate = self.coordinate(bound).ok_or(CropError::MissingField {
                index,
                field: bound,
            })?;
            *slot = coordinate
                .as_integer()
                .ok_or_else(|| CropError::InvalidRectangle {
                    index,
                    source: RectError::NotInteger {
                        bound,
                        raw: coordinate.raw(),
                    },
                })?;
        }

        let [left, top, right, bottom] = values;
        Ok(Rect::new(left, top, right, bottom))
    }
}

/// Parse the `crops` JSON form field into an ordered list of specs
pub fn parse_region_specs(json: &str) -> Result<Vec<RegionSpec>, CropError> {
    let specs: Vec<RegionSpec> = serde_json::from_str(json).map_err(|e| {
        CropError::InvalidRequest(format!(
            "Invalid crop data format. Must be a JSON array of regions: {}",
            e
        ))
    })?;

    if specs.is_empty() {
        return Err(CropError::InvalidRequest(
            "Crop list is empty".to_string(),
        ));
    }

    Ok(specs)
}

/// Resolve specs against a `width` x `height` canvas, preserving order
pub fn resolve_manual(
    specs: &[RegionSpec],
    (width, height): (u32, u32),
) -> Result<Vec<Region>, CropError> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let rect = spec
                .to_rect(index)?
                .validate(width, height)
                .map_err(|source| CropError::InvalidRectangle { index, source })?;
            Ok(Region::manual(rect, spec.resolved_name(index)))
        })
        .collect()
}
