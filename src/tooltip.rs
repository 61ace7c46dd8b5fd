use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{IMAGE_EXTENSIONS, TOOLTIP_FADE_MS, TOOLTIP_OFFSET_X, TOOLTIP_OFFSET_Y};
use crate::error::AssetMissing;
use crate::markers::Marker;
use crate::utils::escape_html;

/// Pointer position in page coordinates, as reported with the hover event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipContent {
    pub image_name: String,
    pub image_url: String,
    pub name: String,
    pub location: String,
    pub time: String,
    pub released: String,
    pub id: i64,
}

impl TooltipContent {
    pub fn for_marker(marker: &Marker) -> Self {
        let image_name = image_name(&marker.name);
        Self {
            image_url: format!("/img/{image_name}"),
            image_name,
            name: marker.name.clone(),
            location: marker.location.clone(),
            time: marker.time.clone(),
            released: marker.released.clone(),
            id: marker.id,
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<img style="width: 100%; height: 100%;" src="{}" alt="{}"><br>Name: {}<br>Location: {}<br>Date: {}<br>Released: {}<br>Order: {}"#,
            escape_html(&self.image_url),
            escape_html(&self.name),
            escape_html(&self.name),
            escape_html(&self.location),
            escape_html(&self.time),
            escape_html(&self.released),
            self.id
        )
    }
}

/// Everything the page needs to draw the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipView {
    pub visible: bool,
    pub marker: Option<usize>,
    pub left: f64,
    pub top: f64,
    pub opacity: f64,
    pub fade_ms: u64,
    pub display: &'static str,
    pub content: Option<TooltipContent>,
    pub html: Option<String>,
}

impl TooltipView {
    fn hidden() -> Self {
        Self {
            visible: false,
            marker: None,
            left: 0.0,
            top: 0.0,
            opacity: 0.0,
            fade_ms: TOOLTIP_FADE_MS,
            display: "none",
            content: None,
            html: None,
        }
    }
}

/// The single floating info panel. Showing a new marker replaces whatever
/// is on screen.
#[derive(Debug, Clone)]
pub struct TooltipPresenter {
    view: TooltipView,
}

impl Default for TooltipPresenter {
    fn default() -> Self {
        Self {
            view: TooltipView::hidden(),
        }
    }
}

impl TooltipPresenter {
    pub fn view(&self) -> &TooltipView {
        &self.view
    }

    pub fn on_hover_start(&mut self, index: usize, marker: &Marker, pointer: Pointer) -> TooltipView {
        let content = TooltipContent::for_marker(marker);
        self.view = TooltipView {
            visible: true,
            marker: Some(index),
            left: pointer.x + TOOLTIP_OFFSET_X,
            top: pointer.y + TOOLTIP_OFFSET_Y,
            opacity: 1.0,
            fade_ms: TOOLTIP_FADE_MS,
            display: "inline-block",
            html: Some(content.to_html()),
            content: Some(content),
        };
        self.view.clone()
    }

    /// Hides the panel if it is showing `index`. A stale hover-end for a
    /// marker that has already been replaced changes nothing.
    pub fn on_hover_end(&mut self, index: usize) -> TooltipView {
        if self.view.marker == Some(index) {
            self.view = TooltipView::hidden();
        }
        self.view.clone()
    }
}

/// File stem for a marker's picture: lowercase, spaces to underscores,
/// apostrophes and colons dropped.
pub fn image_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\'' && *c != ':')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Finds the picture for `image_name` under `dir`, trying the bare name
/// first and then the usual image extensions.
pub fn resolve_image(dir: &Path, image_name: &str) -> Result<PathBuf, AssetMissing> {
    let missing = || AssetMissing {
        image_name: image_name.to_string(),
    };
    if image_name.is_empty()
        || image_name.starts_with('.')
        || image_name.contains(['/', '\\'])
    {
        return Err(missing());
    }

    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| {
            if ext.is_empty() {
                dir.join(image_name)
            } else {
                dir.join(format!("{image_name}.{ext}"))
            }
        })
        .find(|candidate| candidate.is_file())
        .ok_or_else(missing)
}

pub const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="160" viewBox="0 0 240 160"><rect width="240" height="160" fill="#eeeeee"/><path d="M70 110l30-36 22 26 16-18 32 28z" fill="#bbbbbb"/><circle cx="160" cy="58" r="12" fill="#bbbbbb"/><text x="120" y="145" font-family="sans-serif" font-size="12" text-anchor="middle" fill="#888888">no image</text></svg>"##;
