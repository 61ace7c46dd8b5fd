use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interaction::ViewUpdate;
use crate::tooltip::TooltipView;

// SSE Event types
#[derive(Debug, Clone, Serialize)]
pub struct ViewEvent {
    pub event_type: String,
    pub emitted_at: DateTime<Utc>,
    /// Client id of the viewer whose request caused the event, so that
    /// viewer can skip its own echo.
    pub origin: Option<String>,
    pub data: ViewData,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ViewData {
    pub view: Option<ViewUpdate>,
    pub tooltip: Option<TooltipView>,
    pub message: Option<String>,
}

impl ViewEvent {
    pub fn new(event_type: &str, data: ViewData) -> Self {
        Self {
            event_type: event_type.to_string(),
            emitted_at: Utc::now(),
            origin: None,
            data,
        }
    }

    pub fn from_client(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    pub fn view(update: &ViewUpdate) -> Self {
        Self::new(
            "view_update",
            ViewData {
                view: Some(update.clone()),
                ..Default::default()
            },
        )
    }

    pub fn tooltip(view: &TooltipView) -> Self {
        Self::new(
            "tooltip",
            ViewData {
                tooltip: Some(view.clone()),
                ..Default::default()
            },
        )
    }

    pub fn heartbeat() -> Self {
        Self::new(
            "heartbeat",
            ViewData {
                message: Some("SSE connection alive".to_string()),
                ..Default::default()
            },
        )
    }
}
