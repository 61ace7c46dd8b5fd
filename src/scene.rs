use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DataLoadError, DataSet, LoadCause};
use crate::geo::{decode_regions, Mercator};
use crate::interaction::{FocusState, SessionState, Viewport};
use crate::markers::{classify_radius, parse_markers, ColorScale, Marker};
use crate::regions::{Region, RegionPalette, RegionSummary};
use crate::settings::Settings;
use crate::utils::escape_html;

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::File(PathBuf::from(location))
        }
    }

    /// Reads the whole payload, giving up after `timeout`.
    pub async fn fetch(&self, timeout: Duration) -> Result<String, LoadCause> {
        tokio::time::timeout(timeout, self.read())
            .await
            .map_err(|_| LoadCause::Timeout(timeout.as_secs()))?
    }

    async fn read(&self) -> Result<String, LoadCause> {
        match self {
            DataSource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            DataSource::Url(url) => {
                let response = reqwest::get(url.as_str()).await?.error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => f.write_str(url),
        }
    }
}

/// A marker with its screen position and style resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedMarker {
    pub index: usize,
    #[serde(flatten)]
    pub marker: Marker,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: &'static str,
}

/// Everything loaded at start. Never changes afterwards.
#[derive(Debug, Clone)]
pub struct Scene {
    pub viewport: Viewport,
    pub regions: Vec<Region>,
    pub markers: Vec<PlacedMarker>,
    pub errors: Vec<DataLoadError>,
}

impl Scene {
    pub fn marker(&self, index: usize) -> Option<&PlacedMarker> {
        self.markers.get(index)
    }

    pub fn region_summaries(&self) -> Vec<RegionSummary<'_>> {
        self.regions.iter().map(Region::summary).collect()
    }
}

pub struct SceneAssembler {
    regions_source: DataSource,
    regions_object: String,
    markers_source: DataSource,
    timeout: Duration,
    viewport: Viewport,
    color_seed: Option<u64>,
}

impl SceneAssembler {
    pub fn new(regions_source: DataSource, markers_source: DataSource, viewport: Viewport) -> Self {
        Self {
            regions_source,
            regions_object: crate::constants::DEFAULT_REGIONS_OBJECT.to_string(),
            markers_source,
            timeout: Duration::from_secs(crate::constants::DEFAULT_FETCH_TIMEOUT_SECS),
            viewport,
            color_seed: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let assembler = Self::new(
            DataSource::parse(&settings.regions_source),
            DataSource::parse(&settings.markers_source),
            settings.viewport(),
        )
        .with_regions_object(settings.regions_object.as_str())
        .with_timeout(settings.fetch_timeout());
        match settings.color_seed {
            Some(seed) => assembler.with_color_seed(seed),
            None => assembler,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_color_seed(mut self, seed: u64) -> Self {
        self.color_seed = Some(seed);
        self
    }

    pub fn with_regions_object(mut self, object: impl Into<String>) -> Self {
        self.regions_object = object.into();
        self
    }

    pub fn projection(&self) -> Mercator {
        Mercator::for_viewport(self.viewport.width, self.viewport.height)
    }

    /// Loads regions, then markers. A failure in either step is recorded
    /// and the other step still runs, so the scene holds whatever loaded.
    pub async fn assemble(&self) -> Scene {
        let mut errors = Vec::new();

        tracing::info!(source = %self.regions_source, "loading regions");
        let regions = match self.load_regions().await {
            Ok(regions) => {
                tracing::info!(count = regions.len(), "regions ready");
                regions
            }
            Err(e) => {
                tracing::error!(error = %e, "region load failed");
                errors.push(e);
                Vec::new()
            }
        };

        // Regions are fully projected before the marker fetch begins.
        tracing::info!(source = %self.markers_source, "loading markers");
        let markers = match self.load_markers().await {
            Ok(markers) => {
                tracing::info!(count = markers.len(), "markers ready");
                markers
            }
            Err(e) => {
                tracing::error!(error = %e, "marker load failed");
                errors.push(e);
                Vec::new()
            }
        };

        Scene {
            viewport: self.viewport,
            regions,
            markers,
            errors,
        }
    }

    async fn load_regions(&self) -> Result<Vec<Region>, DataLoadError> {
        let payload = self
            .regions_source
            .fetch(self.timeout)
            .await
            .map_err(|e| DataLoadError::new(DataSet::Regions, e))?;
        self.build_regions(&payload)
            .map_err(|e| DataLoadError::new(DataSet::Regions, e))
    }

    async fn load_markers(&self) -> Result<Vec<PlacedMarker>, DataLoadError> {
        let payload = self
            .markers_source
            .fetch(self.timeout)
            .await
            .map_err(|e| DataLoadError::new(DataSet::Markers, e))?;
        self.build_markers(&payload)
            .map_err(|e| DataLoadError::new(DataSet::Markers, e))
    }

    /// Decodes and projects region boundaries. Projection runs in parallel;
    /// fills are drawn afterwards in document order so a seed reproduces
    /// the same colouring.
    pub fn build_regions(&self, payload: &str) -> Result<Vec<Region>, LoadCause> {
        let features = decode_regions(payload, &self.regions_object)?;
        let projection = self.projection();
        let mut regions: Vec<Region> = features
            .into_par_iter()
            .enumerate()
            .map(|(id, feature)| Region::project(id, feature, &projection))
            .collect();

        let mut palette = RegionPalette::new(self.color_seed);
        for region in &mut regions {
            region.fill = palette.draw();
        }
        Ok(regions)
    }

    pub fn build_markers(&self, payload: &str) -> Result<Vec<PlacedMarker>, LoadCause> {
        let projection = self.projection();
        let mut colors = ColorScale::default();
        Ok(parse_markers(payload)?
            .into_iter()
            .enumerate()
            .map(|(index, marker)| {
                let (x, y) = projection.project(marker.longitude, marker.latitude);
                PlacedMarker {
                    index,
                    x,
                    y,
                    radius: classify_radius(marker.mass),
                    color: colors.color_for(marker.mass),
                    marker,
                }
            })
            .collect())
    }
}

/// Renders the scene as a standalone SVG document in the given session
/// state.
pub fn render_svg(scene: &Scene, session: &SessionState) -> String {
    let Viewport { width, height } = scene.viewport;
    let transform = session.transform;
    let mut s = String::with_capacity(64 * 1024);

    let _ = writeln!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" id="map" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    let _ = writeln!(
        s,
        r#"  <rect class="background" width="{width}" height="{height}" fill="none" pointer-events="all"/>"#
    );
    let _ = writeln!(
        s,
        r#"  <g id="scene" transform="{}" style="stroke-width: {}px">"#,
        transform.to_svg_attr(),
        transform.stroke_width()
    );

    for region in &scene.regions {
        let active = session.focus == FocusState::FocusedRegion(region.id);
        let _ = writeln!(
            s,
            r#"    <path class="country{}" data-region="{}" fill="{}" d="{}"><title>{}</title></path>"#,
            if active { " active" } else { "" },
            region.id,
            region.fill,
            region.path.d,
            escape_html(&region.name)
        );
    }

    for placed in &scene.markers {
        let _ = writeln!(
            s,
            r#"    <circle class="location" data-marker="{}" r="{}" fill="{}" cx="{:.2}" cy="{:.2}"/>"#,
            placed.index, placed.radius, placed.color, placed.x, placed.y
        );
    }

    s.push_str("  </g>\n</svg>\n");
    s
}
