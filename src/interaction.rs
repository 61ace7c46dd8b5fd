//! Pan/zoom/focus state for one map session.
//!
//! All mutations go through [`InteractionState`]; each call replaces the
//! whole [`ViewTransform`] at once and reports what the view should do.

use geo::Rect;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_STROKE_WIDTH, FOCUS_FILL, FRAME_INTERVAL_MS, MAX_SCALE, MIN_SCALE, VIEW_TRANSITION_MS,
};
use crate::error::{GeometryError, InteractionError};
use crate::regions::Region;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
    };

    /// Builds a transform with the scale held inside the zoom extent.
    /// A non-finite scale collapses to the minimum.
    pub fn new(translate_x: f64, translate_y: f64, scale: f64) -> Self {
        let scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            MIN_SCALE
        };
        Self {
            translate_x: if translate_x.is_finite() { translate_x } else { 0.0 },
            translate_y: if translate_y.is_finite() { translate_y } else { 0.0 },
            scale,
        }
    }

    pub fn stroke_width(&self) -> f64 {
        BASE_STROKE_WIDTH / self.scale
    }

    /// The value of the SVG `transform` attribute for the scene group.
    pub fn to_svg_attr(&self) -> String {
        format!(
            "translate({},{}) scale({})",
            self.translate_x, self.translate_y, self.scale
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "region", rename_all = "snake_case")]
pub enum FocusState {
    NoFocus,
    FocusedRegion(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionState {
    pub transform: ViewTransform,
    pub focus: FocusState,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            transform: ViewTransform::IDENTITY,
            focus: FocusState::NoFocus,
        }
    }
}

/// What a single physical click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClickTarget {
    Region { id: usize },
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Click {
    pub target: ClickTarget,
    /// Set when the pointer moved between press and release; such clicks
    /// finish a pan and must not change focus.
    #[serde(default)]
    pub after_drag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Focus,
    Reset,
    Gesture,
}

/// An animated move between two transforms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub from: ViewTransform,
    pub to: ViewTransform,
    pub duration_ms: u64,
}

impl Transition {
    /// The transform `elapsed_ms` into the transition, eased cubic in-out.
    pub fn sample(&self, elapsed_ms: u64) -> ViewTransform {
        if self.duration_ms == 0 || elapsed_ms >= self.duration_ms {
            return self.to;
        }
        let t = ease_cubic_in_out(elapsed_ms as f64 / self.duration_ms as f64);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        ViewTransform::new(
            lerp(self.from.translate_x, self.to.translate_x),
            lerp(self.from.translate_y, self.to.translate_y),
            lerp(self.from.scale, self.to.scale),
        )
    }

    /// Samples taken every `interval_ms`, ending exactly on `to`. An
    /// instant transition is the single frame `to`.
    pub fn keyframes(&self, interval_ms: u64) -> Vec<ViewTransform> {
        if self.duration_ms == 0 || interval_ms == 0 {
            return vec![self.to];
        }
        let count = (self.duration_ms + interval_ms - 1) / interval_ms;
        (1..=count).map(|i| self.sample(i * interval_ms)).collect()
    }
}

fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// Result of one interaction, enough for a view to redraw. Views play
/// `frames` one every `frame_ms` instead of easing on their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewUpdate {
    pub kind: UpdateKind,
    pub transition: Transition,
    pub frame_ms: u64,
    pub frames: Vec<ViewTransform>,
    pub focus: FocusState,
    pub stroke_width: f64,
    pub transform_attr: String,
}

impl ViewUpdate {
    fn new(kind: UpdateKind, transition: Transition, focus: FocusState) -> Self {
        Self {
            kind,
            stroke_width: transition.to.stroke_width(),
            transform_attr: transition.to.to_svg_attr(),
            frame_ms: FRAME_INTERVAL_MS,
            frames: transition.keyframes(FRAME_INTERVAL_MS),
            transition,
            focus,
        }
    }
}

/// Transform that centres `bounds` in the viewport, filling 90% of its
/// tighter dimension.
pub fn focus_transform(
    region: &str,
    bounds: Option<Rect<f64>>,
    viewport: Viewport,
) -> Result<ViewTransform, GeometryError> {
    let bounds = bounds.ok_or_else(|| GeometryError::EmptyBounds(region.to_string()))?;
    let (min, max) = (bounds.min(), bounds.max());
    if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
        return Err(GeometryError::NonFiniteBounds(region.to_string()));
    }
    if bounds.width() <= 0.0 && bounds.height() <= 0.0 {
        return Err(GeometryError::EmptyBounds(region.to_string()));
    }

    let (cx, cy) = bounds.center().x_y();
    let extent = (bounds.width() / viewport.width).max(bounds.height() / viewport.height);
    let scale = (FOCUS_FILL / extent).clamp(MIN_SCALE, MAX_SCALE);
    Ok(ViewTransform::new(
        viewport.width / 2.0 - scale * cx,
        viewport.height / 2.0 - scale * cy,
        scale,
    ))
}

/// Fallback for degenerate bounds: no zoom, centred on the region when it
/// has a usable centre.
fn unzoomed_transform(bounds: Option<Rect<f64>>, viewport: Viewport) -> ViewTransform {
    match bounds.map(|b| b.center().x_y()) {
        Some((cx, cy)) if cx.is_finite() && cy.is_finite() => {
            ViewTransform::new(viewport.width / 2.0 - cx, viewport.height / 2.0 - cy, MIN_SCALE)
        }
        _ => ViewTransform::IDENTITY,
    }
}

#[derive(Debug, Clone)]
pub struct InteractionState {
    viewport: Viewport,
    session: SessionState,
}

impl InteractionState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            session: SessionState::default(),
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Routes one click to exactly one transition. Clicks that end a drag
    /// produce nothing.
    pub fn handle_click(
        &mut self,
        click: Click,
        regions: &[Region],
    ) -> Result<Option<ViewUpdate>, InteractionError> {
        if click.after_drag {
            tracing::debug!(clicked = ?click.target, "click after drag ignored");
            return Ok(None);
        }
        match click.target {
            ClickTarget::Region { id } => {
                let region = regions
                    .get(id)
                    .ok_or(InteractionError::UnknownRegion(id))?;
                Ok(Some(self.click_region(region)))
            }
            ClickTarget::Background => Ok(Some(self.reset())),
        }
    }

    pub fn click_region(&mut self, region: &Region) -> ViewUpdate {
        if self.session.focus == FocusState::FocusedRegion(region.id) {
            return self.reset();
        }

        let target = match focus_transform(&region.name, region.bounds(), self.viewport) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "focusing without zoom");
                unzoomed_transform(region.bounds(), self.viewport)
            }
        };

        // Clear the old focus before setting the new one.
        self.session.focus = FocusState::NoFocus;
        let from = self.session.transform;
        self.session = SessionState {
            transform: target,
            focus: FocusState::FocusedRegion(region.id),
        };
        tracing::debug!(region = %region.name, scale = target.scale, "region focused");

        ViewUpdate::new(
            UpdateKind::Focus,
            Transition {
                from,
                to: target,
                duration_ms: VIEW_TRANSITION_MS,
            },
            self.session.focus,
        )
    }

    pub fn reset(&mut self) -> ViewUpdate {
        let from = self.session.transform;
        self.session = SessionState::default();
        tracing::debug!("view reset");

        ViewUpdate::new(
            UpdateKind::Reset,
            Transition {
                from,
                to: ViewTransform::IDENTITY,
                duration_ms: VIEW_TRANSITION_MS,
            },
            FocusState::NoFocus,
        )
    }

    /// Applies a pan/zoom gesture immediately. Focus is left alone.
    pub fn zoom_gesture(&mut self, reported: ViewTransform) -> ViewUpdate {
        let from = self.session.transform;
        let to = ViewTransform::new(reported.translate_x, reported.translate_y, reported.scale);
        self.session.transform = to;

        ViewUpdate::new(
            UpdateKind::Gesture,
            Transition {
                from,
                to,
                duration_ms: 0,
            },
            self.session.focus,
        )
    }
}
