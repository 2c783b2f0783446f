//! Bounding box types used by spatial filters and offering envelopes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box.
///
/// Coordinates are expressed in the CRS named by `srs` (EPSG:4326 when absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            srs: None,
        }
    }

    /// Attach a CRS identifier.
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// Degenerate box around a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Parse a KVP bbox value: "minx,miny,maxx,maxy[,srs]"
    pub fn from_kvp(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 && parts.len() != 5 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let number = |raw: &str| -> Result<f64, BboxParseError> {
            raw.parse()
                .map_err(|_| BboxParseError::InvalidNumber(raw.to_string()))
        };

        let mut bbox = Self::new(
            number(parts[0])?,
            number(parts[1])?,
            number(parts[2])?,
            number(parts[3])?,
        );
        if let Some(srs) = parts.get(4).filter(|s| !s.is_empty()) {
            bbox.srs = Some(srs.to_string());
        }
        Ok(bbox)
    }

    /// Check if this bbox intersects another. Touching edges count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the box so that it covers the given point.
    pub fn include_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Smallest box covering all points, or `None` for an empty input.
    pub fn envelope<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::from_point(x, y);
        for (x, y) in iter {
            bbox.include_point(x, y);
        }
        Some(bbox)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy[,srs]'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),
}
