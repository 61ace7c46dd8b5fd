use axum::response::Html;
use rust_embed::RustEmbed;

use crate::interaction::SessionState;
use crate::scene::{render_svg, Scene};
use crate::utils::escape_html;

#[derive(RustEmbed)]
#[folder = "frontend/"]
pub struct Asset;

const SCENE_PLACEHOLDER: &str = "<!-- SCENE_PLACEHOLDER -->";
const ERRORS_PLACEHOLDER: &str = "<!-- LOAD_ERRORS_PLACEHOLDER -->";

// Used only if the embedded page is missing from the build.
const FALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><title>Release Atlas</title></head>
<body><!-- LOAD_ERRORS_PLACEHOLDER --><!-- SCENE_PLACEHOLDER --></body></html>"#;

pub fn get_map_html(scene: &Scene, session: &SessionState) -> Html<String> {
    let page = Asset::get("index.html")
        .map(|file| String::from_utf8_lossy(&file.data).into_owned())
        .unwrap_or_else(|| FALLBACK_PAGE.to_string());

    let html = page
        .replace(ERRORS_PLACEHOLDER, &load_error_banners(scene))
        .replace(SCENE_PLACEHOLDER, &render_svg(scene, session));
    Html(html)
}

fn load_error_banners(scene: &Scene) -> String {
    scene
        .errors
        .iter()
        .map(|e| {
            format!(
                r#"<div class="load-error" data-source="{}">⚠️ Could not load {}: {}</div>"#,
                e.dataset,
                e.dataset,
                escape_html(&e.cause.to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
