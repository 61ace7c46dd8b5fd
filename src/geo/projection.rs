use geo::{Coord, MapCoords, MultiPolygon};
use std::f64::consts::FRAC_PI_4;

use crate::constants::{PROJECTION_CENTER, PROJECTION_SCALE};

// Mercator diverges at the poles; clip to the usual web-map latitude.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spherical Mercator projection with a configurable geographic centre,
/// scale (pixels per radian) and screen translation of that centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    scale: f64,
    dx: f64,
    dy: f64,
}

impl Mercator {
    pub fn new(center: (f64, f64), scale: f64, translate: (f64, f64)) -> Self {
        let (cx, cy) = raw(center.0, center.1);
        Self {
            scale,
            dx: translate.0 - scale * cx,
            dy: translate.1 + scale * cy,
        }
    }

    /// The map's standard framing: centred on (0°, 30°N) in the middle of
    /// the viewport.
    pub fn for_viewport(width: f64, height: f64) -> Self {
        Self::new(PROJECTION_CENTER, PROJECTION_SCALE, (width / 2.0, height / 2.0))
    }

    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let (x, y) = raw(lon_deg, lat_deg);
        (self.dx + self.scale * x, self.dy - self.scale * y)
    }

    pub fn project_coord(&self, c: Coord<f64>) -> Coord<f64> {
        let (x, y) = self.project(c.x, c.y);
        Coord { x, y }
    }

    /// Same shape in screen pixels, y growing downwards.
    pub fn project_geometry(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| self.project_coord(c))
    }
}

fn raw(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lambda = lon_deg.to_radians();
    let phi = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (lambda, (FRAC_PI_4 + phi / 2.0).tan().ln())
}
