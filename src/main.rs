use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Import modules
mod constants;
mod error;
mod geo;
mod html_template;
mod interaction;
mod markers;
mod regions;
mod scene;
mod server;
mod settings;
mod tooltip;
mod utils;

use scene::SceneAssembler;
use server::{start_server, AppState};
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "release_atlas=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🗺️  ReleaseAtlas v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = match std::env::args_os().nth(1) {
        Some(path) => Settings::load_from(&PathBuf::from(path)),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    let scene = SceneAssembler::from_settings(&settings).assemble().await;
    if scene.errors.is_empty() {
        tracing::info!(
            regions = scene.regions.len(),
            markers = scene.markers.len(),
            "scene assembled"
        );
    } else {
        for e in &scene.errors {
            tracing::warn!(error = %e, "scene is partial");
        }
    }

    let port = settings.port;
    if settings.auto_open_browser {
        utils::open_browser(&format!("http://127.0.0.1:{port}"));
    }

    start_server(AppState::new(scene, settings), port).await
}
