//! Court zone polygons used for in/out calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::BallPosition;

/// Tolerance used when testing whether a point lies on a polygon edge.
const EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("polygon vertex {0} is not finite")]
    NonFiniteVertex(usize),
}

/// A simple polygon in frame pixel coordinates.
///
/// Serialized as a list of `[x, y]` vertices. The closing edge from the last
/// vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self, ZoneError> {
        if vertices.len() < 3 {
            return Err(ZoneError::TooFewVertices(vertices.len()));
        }
        if let Some(i) = vertices
            .iter()
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(ZoneError::NonFiniteVertex(i));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Strict containment: points on the boundary are not contained.
    pub fn contains(&self, point: BallPosition) -> bool {
        let (px, py) = (point.x, point.y);
        let n = self.vertices.len();
        let mut inside = false;

        for i in 0..n {
            let (x1, y1) = self.vertices[i];
            let (x2, y2) = self.vertices[(i + 1) % n];

            if on_segment((px, py), (x1, y1), (x2, y2)) {
                return false;
            }

            if (y1 > py) != (y2 > py) {
                let x_cross = x1 + (py - y1) * (x2 - x1) / (y2 - y1);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }

        inside
    }
}

fn on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.0 >= a.0.min(b.0) - EDGE_EPSILON
        && p.0 <= a.0.max(b.0) + EDGE_EPSILON
        && p.1 >= a.1.min(b.1) - EDGE_EPSILON
        && p.1 <= a.1.max(b.1) + EDGE_EPSILON
}

impl TryFrom<Vec<(f64, f64)>> for Polygon {
    type Error = ZoneError;

    fn try_from(vertices: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<(f64, f64)> {
    fn from(p: Polygon) -> Self {
        p.vertices
    }
}

/// In-bounds regions for one camera view. Unset zones contain nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourtZones {
    #[serde(default)]
    pub left: Option<Polygon>,
    #[serde(default)]
    pub right: Option<Polygon>,
}

impl CourtZones {
    pub fn new(left: Option<Polygon>, right: Option<Polygon>) -> Self {
        Self { left, right }
    }

    pub fn is_configured(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }

    /// True when the point lies strictly inside either zone.
    pub fn contains(&self, point: BallPosition) -> bool {
        [&self.left, &self.right]
            .into_iter()
            .flatten()
            .any(|polygon| polygon.contains(point))
    }
}
