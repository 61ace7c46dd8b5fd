use geo::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::constants::REGION_PALETTE;
use crate::geo::{Mercator, PathData, RegionFeature};

/// A boundary ready to draw.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: usize,
    pub code: Option<String>,
    pub name: String,
    pub fill: &'static str,
    pub path: PathData,
}

impl Region {
    pub fn project(id: usize, feature: RegionFeature, projection: &Mercator) -> Self {
        let path = projection.path_for(&feature.geometry);
        Self {
            id,
            code: feature.code,
            name: feature.name,
            fill: REGION_PALETTE[0],
            path,
        }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.path.bounds
    }

    pub fn summary(&self) -> RegionSummary<'_> {
        RegionSummary {
            id: self.id,
            code: self.code.as_deref(),
            name: &self.name,
            fill: self.fill,
            bounds: self
                .path
                .bounds
                .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y]),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegionSummary<'a> {
    pub id: usize,
    pub code: Option<&'a str>,
    pub name: &'a str,
    pub fill: &'static str,
    /// `[min_x, min_y, max_x, max_y]` in screen pixels.
    pub bounds: Option<[f64; 4]>,
}

/// Decorative fills, drawn uniformly with replacement. A seed makes the
/// draw reproducible; without one every start looks different.
pub struct RegionPalette {
    rng: StdRng,
    colors: &'static [&'static str],
}

impl RegionPalette {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            colors: REGION_PALETTE,
        }
    }

    pub fn draw(&mut self) -> &'static str {
        self.colors[self.rng.gen_range(0..self.colors.len())]
    }
}
