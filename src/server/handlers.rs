use axum::{
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, StatusCode},
    response::sse::{Event as SseEvent, KeepAlive},
    response::{Html, IntoResponse, Json, Response, Sse},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::{Stream, StreamExt};

use crate::error::{DataLoadError, InteractionError};
use crate::html_template::{get_map_html, Asset};
use crate::interaction::{Click, SessionState, ViewTransform, ViewUpdate, Viewport};
use crate::regions::RegionSummary;
use crate::scene::{render_svg, PlacedMarker};
use crate::settings::Settings;
use crate::tooltip::{resolve_image, Pointer, TooltipView, PLACEHOLDER_SVG};

use super::events::ViewEvent;
use super::state::AppState;

/// Header carrying the page's client id on interaction requests.
pub const CLIENT_HEADER: &str = "x-atlas-client";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn client_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Simple MIME type detection based on file extension
fn get_mime_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

impl From<InteractionError> for StatusCode {
    fn from(e: InteractionError) -> Self {
        tracing::warn!(error = %e, "rejected interaction");
        match e {
            InteractionError::UnknownRegion(_) => StatusCode::NOT_FOUND,
            InteractionError::UnknownMarker(_) => StatusCode::BAD_REQUEST,
        }
    }
}

pub async fn index_html(State(state): State<AppState>) -> Html<String> {
    let session = state.session().interaction.session();
    get_map_html(&state.scene, &session)
}

fn embedded(path: &str, content_type: &'static str) -> Response {
    match Asset::get(path) {
        Some(file) => ([(header::CONTENT_TYPE, content_type)], file.data.into_owned()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn style_css() -> Response {
    embedded("style.css", "text/css")
}

pub async fn script_js() -> Response {
    embedded("script.js", "application/javascript")
}

#[derive(Serialize)]
pub struct SceneResponse<'a> {
    pub viewport: Viewport,
    pub session: SessionState,
    pub tooltip: TooltipView,
    pub regions: Vec<RegionSummary<'a>>,
    pub markers: &'a [PlacedMarker],
    pub errors: &'a [DataLoadError],
}

// API endpoint describing the loaded scene and current session
pub async fn get_scene(State(state): State<AppState>) -> Response {
    let (session, tooltip) = {
        let guard = state.session();
        (guard.interaction.session(), guard.tooltip.view().clone())
    };
    let scene = &state.scene;
    Json(SceneResponse {
        viewport: scene.viewport,
        session,
        tooltip,
        regions: scene.region_summaries(),
        markers: &scene.markers,
        errors: &scene.errors,
    })
    .into_response()
}

pub async fn get_svg(State(state): State<AppState>) -> Response {
    let session = state.session().interaction.session();
    (
        [(header::CONTENT_TYPE, "image/svg+xml")],
        render_svg(&state.scene, &session),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct ClickResponse {
    pub handled: bool,
    pub update: Option<ViewUpdate>,
    pub session: SessionState,
}

// API endpoint for a click on a region or on the map background
pub async fn post_click(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(click): Json<Click>,
) -> Result<Json<ClickResponse>, StatusCode> {
    // Published under the lock so viewers see updates in the order applied.
    let (update, session) = {
        let mut session = state.session();
        let update = session.interaction.handle_click(click, &state.scene.regions)?;
        if let Some(ref update) = update {
            state.publish(ViewEvent::view(update).from_client(client_id(&headers)));
        }
        (update, session.interaction.session())
    };

    Ok(Json(ClickResponse {
        handled: update.is_some(),
        update,
        session,
    }))
}

// API endpoint for pan/zoom gestures; applied immediately, never queued
pub async fn post_zoom(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(reported): Json<ViewTransform>,
) -> Json<ViewUpdate> {
    let update = {
        let mut session = state.session();
        let update = session.interaction.zoom_gesture(reported);
        state.publish(ViewEvent::view(&update).from_client(client_id(&headers)));
        update
    };
    Json(update)
}

#[derive(Debug, Deserialize)]
pub struct HoverRequest {
    pub marker: usize,
    pub x: f64,
    pub y: f64,
}

pub async fn post_hover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<HoverRequest>,
) -> Result<Json<TooltipView>, StatusCode> {
    let placed = state
        .scene
        .marker(req.marker)
        .ok_or(InteractionError::UnknownMarker(req.marker))?;
    let view = {
        let mut session = state.session();
        let view = session.tooltip.on_hover_start(
            req.marker,
            &placed.marker,
            Pointer { x: req.x, y: req.y },
        );
        state.publish(ViewEvent::tooltip(&view).from_client(client_id(&headers)));
        view
    };
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct HoverEndRequest {
    pub marker: usize,
}

pub async fn post_hover_end(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<HoverEndRequest>,
) -> Result<Json<TooltipView>, StatusCode> {
    if state.scene.marker(req.marker).is_none() {
        return Err(InteractionError::UnknownMarker(req.marker).into());
    }
    let view = {
        let mut session = state.session();
        let view = session.tooltip.on_hover_end(req.marker);
        state.publish(ViewEvent::tooltip(&view).from_client(client_id(&headers)));
        view
    };
    Ok(Json(view))
}

// API endpoint to get current settings
pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json((*state.settings).clone())
}

// Marker pictures; a missing one degrades to a placeholder, never an error
pub async fn serve_image(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    let found = match resolve_image(&state.image_dir(), &name) {
        Ok(path) => tokio::fs::read(&path)
            .await
            .map(|data| (get_mime_type(&path), data))
            .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "image unreadable")),
        Err(missing) => {
            tracing::warn!(error = %missing, "serving placeholder");
            Err(())
        }
    };

    match found {
        Ok((content_type, data)) => (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            data,
        )
            .into_response(),
        Err(()) => (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            PLACEHOLDER_SVG,
        )
            .into_response(),
    }
}

// SSE endpoint: every view and tooltip change, as named events, plus a
// heartbeat on connect and every 30 seconds
pub async fn view_events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let updates = BroadcastStream::new(state.event_sender.subscribe()).filter_map(|received| {
        match received {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "slow viewer skipped events");
                None
            }
        }
    });
    let heartbeats =
        IntervalStream::new(tokio::time::interval(HEARTBEAT_INTERVAL)).map(|_| ViewEvent::heartbeat());

    let stream = updates.merge(heartbeats).map(|event| {
        Ok(SseEvent::default()
            .event(event.event_type.as_str())
            .json_data(&event)
            .unwrap_or_else(|_| SseEvent::default().data("Error serializing event")))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{ClickTarget, FocusState, UpdateKind};
    use crate::scene::{DataSource, SceneAssembler};

    const WORLD: &str = r#"{
        "type": "Topology",
        "objects": { "countries": { "type": "GeometryCollection", "geometries": [
            { "type": "Polygon", "properties": { "name": "Wonderland" }, "arcs": [[0]] }
        ] } },
        "arcs": [[[-90, 20], [-75, 20], [-75, 35], [-90, 35], [-90, 20]]]
    }"#;

    const MARKERS: &str = r#"{ "type": "FeatureCollection", "features": [
        { "type": "Feature", "geometry": { "type": "Point", "coordinates": [-81.56, 28.42] },
          "properties": { "name": "Big Thunder Mountain", "mass": 500000,
          "longitude": -81.56, "latitude": 28.42, "id": 1, "location": "Orlando",
          "time": "1971", "released": "true" } },
        { "type": "Feature", "geometry": { "type": "Point", "coordinates": [8.0, 46.0] },
          "properties": { "name": "Matterhorn", "mass": 15,
          "longitude": 8.0, "latitude": 46.0, "id": 2, "location": "Zermatt",
          "time": "1959", "released": true } }
    ] }"#;

    const REGION_CLICK: Click = Click {
        target: ClickTarget::Region { id: 0 },
        after_drag: false,
    };

    async fn state_with(dir: &std::path::Path, world: Option<&str>) -> AppState {
        let settings = Settings {
            image_dir: dir.to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let regions = dir.join("world.json");
        if let Some(world) = world {
            std::fs::write(&regions, world).unwrap();
        }
        let markers = dir.join("markers.json");
        std::fs::write(&markers, MARKERS).unwrap();
        let scene = SceneAssembler::new(
            DataSource::File(regions),
            DataSource::File(markers),
            settings.viewport(),
        )
        .assemble()
        .await;
        AppState::new(scene, settings)
    }

    async fn app_state(dir: &std::path::Path) -> AppState {
        state_with(dir, Some(WORLD)).await
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn from_client(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_HEADER, id.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn click_focuses_then_toggles_off() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        let mut events = state.event_sender.subscribe();

        let Json(first) = post_click(State(state.clone()), from_client("tab-1"), Json(REGION_CLICK))
            .await
            .unwrap();
        assert!(first.handled);
        assert_eq!(first.session.focus, FocusState::FocusedRegion(0));
        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type, "view_update");
        assert_eq!(event.origin.as_deref(), Some("tab-1"));

        let Json(second) = post_click(State(state.clone()), HeaderMap::new(), Json(REGION_CLICK))
            .await
            .unwrap();
        assert_eq!(second.update.unwrap().kind, UpdateKind::Reset);
        assert_eq!(second.session, SessionState::default());
        assert_eq!(events.recv().await.unwrap().origin, None);
    }

    #[tokio::test]
    async fn unknown_region_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        let click = Click {
            target: ClickTarget::Region { id: 42 },
            after_drag: false,
        };
        let err = post_click(State(state.clone()), HeaderMap::new(), Json(click))
            .await
            .err();
        assert_eq!(err, Some(StatusCode::NOT_FOUND));
        assert_eq!(state.session().interaction.session(), SessionState::default());
    }

    #[tokio::test]
    async fn zoom_is_applied_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        let Json(update) = post_zoom(
            State(state.clone()),
            HeaderMap::new(),
            Json(ViewTransform {
                translate_x: -50.0,
                translate_y: 20.0,
                scale: 12.0,
            }),
        )
        .await;
        assert_eq!(update.transition.to.scale, 8.0);
        assert_eq!(state.session().interaction.session().transform.scale, 8.0);

        // In range, the echo is exactly what was sent, so a view only
        // re-applies echoes that were clamped.
        let sent = ViewTransform {
            translate_x: -123.456,
            translate_y: 78.9,
            scale: 2.5,
        };
        let Json(update) = post_zoom(State(state.clone()), HeaderMap::new(), Json(sent)).await;
        let echoed: ViewTransform =
            serde_json::from_str(&serde_json::to_string(&update.transition.to).unwrap()).unwrap();
        assert_eq!(echoed, sent);
        assert_eq!(update.frames, vec![sent]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn events_are_broadcast_in_the_order_applied() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        let mut events = state.event_sender.subscribe();

        let clicks: Vec<_> = (0..40)
            .map(|i| {
                let state = state.clone();
                let click = if i % 3 == 0 {
                    Click {
                        target: ClickTarget::Background,
                        after_drag: false,
                    }
                } else {
                    REGION_CLICK
                };
                tokio::spawn(async move {
                    post_click(State(state), HeaderMap::new(), Json(click)).await.is_ok()
                })
            })
            .collect();
        for click in clicks {
            assert!(click.await.unwrap());
        }

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = event.data.view;
        }
        let final_session = state.session().interaction.session();
        let last = last.unwrap();
        assert_eq!(last.focus, final_session.focus);
        assert_eq!(last.transition.to, final_session.transform);
    }

    #[tokio::test]
    async fn hover_shows_one_tooltip_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        let hover = |marker, x| HoverRequest { marker, x, y: x };

        post_hover(State(state.clone()), HeaderMap::new(), Json(hover(0, 1.0)))
            .await
            .unwrap();
        let Json(view) = post_hover(State(state.clone()), HeaderMap::new(), Json(hover(1, 2.0)))
            .await
            .unwrap();
        assert_eq!(view.content.unwrap().name, "Matterhorn");
        assert_eq!(state.session().tooltip.view().marker, Some(1));

        let Json(view) = post_hover_end(
            State(state.clone()),
            HeaderMap::new(),
            Json(HoverEndRequest { marker: 1 }),
        )
        .await
        .unwrap();
        assert!(!view.visible);

        let err = post_hover(State(state), HeaderMap::new(), Json(hover(9, 0.0)))
            .await
            .err();
        assert_eq!(err, Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn scene_api_reports_failed_region_load() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(dir.path(), None).await;

        let json: serde_json::Value =
            serde_json::from_str(&body_text(get_scene(State(state.clone())).await).await).unwrap();
        assert_eq!(json["errors"].as_array().unwrap().len(), 1);
        assert_eq!(json["errors"][0]["source"], "regions");
        assert_eq!(json["regions"].as_array().unwrap().len(), 0);
        assert_eq!(json["markers"].as_array().unwrap().len(), 2);
        assert_eq!(json["tooltip"]["visible"], false);

        let Html(page) = index_html(State(state)).await;
        assert!(page.contains(r#"class="load-error""#));
        assert!(page.contains(r#"<svg xmlns="http://www.w3.org/2000/svg" id="map""#));
    }

    #[tokio::test]
    async fn svg_marks_the_focused_region() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        assert!(!body_text(get_svg(State(state.clone())).await).await.contains("country active"));

        post_click(State(state.clone()), HeaderMap::new(), Json(REGION_CLICK))
            .await
            .unwrap();
        let response = get_svg(State(state)).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        let svg = body_text(response).await;
        assert!(svg.contains(r#"class="country active" data-region="0""#));
    }

    #[tokio::test]
    async fn event_stream_delivers_heartbeat_then_updates() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;

        let response = view_events_stream(State(state.clone())).await.into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        let mut body = response.into_body().into_data_stream();

        let mut received = String::new();
        let deadline = Duration::from_secs(5);
        tokio::time::timeout(deadline, async {
            while !received.contains("event: heartbeat") {
                received.push_str(&String::from_utf8_lossy(&body.next().await.unwrap().unwrap()));
            }
        })
        .await
        .unwrap();

        post_click(State(state), from_client("tab-2"), Json(REGION_CLICK))
            .await
            .unwrap();
        tokio::time::timeout(deadline, async {
            while !received.contains("event: view_update") {
                received.push_str(&String::from_utf8_lossy(&body.next().await.unwrap().unwrap()));
            }
        })
        .await
        .unwrap();
        assert!(received.contains(r#""origin":"tab-2""#));
    }

    #[tokio::test]
    async fn missing_image_serves_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let state = app_state(dir.path()).await;
        std::fs::write(dir.path().join("big_thunder_mountain.png"), b"\x89PNG").unwrap();

        let found = serve_image(State(state.clone()), AxumPath("big_thunder_mountain".to_string())).await;
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(found.headers()[header::CONTENT_TYPE], "image/png");

        let missing = serve_image(State(state), AxumPath("matterhorn".to_string())).await;
        assert_eq!(missing.status(), StatusCode::OK);
        assert_eq!(missing.headers()[header::CONTENT_TYPE], "image/svg+xml");
    }
}
