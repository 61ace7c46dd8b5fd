use geo::{BoundingRect, LineString, MultiPolygon, Rect};
use std::fmt::Write;

use super::Mercator;

/// Projected SVG path data for one geometry and its screen bounds.
/// `bounds` is `None` when the geometry has no points.
#[derive(Debug, Clone, PartialEq)]
pub struct PathData {
    pub d: String,
    pub bounds: Option<Rect<f64>>,
}

impl Mercator {
    pub fn path_for(&self, geometry: &MultiPolygon<f64>) -> PathData {
        let projected = self.project_geometry(geometry);
        let mut d = String::new();
        for polygon in &projected {
            append_ring(&mut d, polygon.exterior());
            for hole in polygon.interiors() {
                append_ring(&mut d, hole);
            }
        }
        PathData {
            d,
            bounds: projected.bounding_rect(),
        }
    }
}

fn append_ring(d: &mut String, ring: &LineString<f64>) {
    let mut cmd = 'M';
    for c in ring.coords().filter(|c| c.x.is_finite() && c.y.is_finite()) {
        let _ = write!(d, "{cmd}{:.2},{:.2}", c.x, c.y);
        cmd = 'L';
    }
    if cmd == 'L' {
        d.push('Z');
    }
}
