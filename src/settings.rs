use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::fs::File;
use std::time::Duration;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_HEIGHT, DEFAULT_IMAGE_DIR, DEFAULT_MARKERS_SOURCE,
    DEFAULT_PORT, DEFAULT_REGIONS_OBJECT, DEFAULT_REGIONS_SOURCE, DEFAULT_WIDTH,
};
use crate::interaction::Viewport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub regions_source: String,
    pub regions_object: String,
    pub markers_source: String,
    pub image_dir: String,
    pub width: f64,
    pub height: f64,
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub color_seed: Option<u64>,
    #[serde(default)]
    pub auto_open_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            regions_source: DEFAULT_REGIONS_SOURCE.to_string(),
            regions_object: DEFAULT_REGIONS_OBJECT.to_string(),
            markers_source: DEFAULT_MARKERS_SOURCE.to_string(),
            image_dir: DEFAULT_IMAGE_DIR.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            color_seed: None,
            auto_open_browser: false,
        }
    }
}

impl Settings {
    /// Loads the default config file, writing one with defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if !config_path.exists() {
            let defaults = Settings::default();
            if let Err(e) = defaults.save_to(&config_path) {
                tracing::warn!(error = %e, "could not write default config");
            }
            return Ok(defaults);
        }
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Settings::default());
        }

        let file = File::open(config_path).context("Failed to open config file")?;
        let reader = BufReader::new(file);
        let mut config_map = HashMap::new();

        for line in reader.lines() {
            let line = line.context("Failed to read line from config")?;
            let line = line.trim();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
            }
        }

        Ok(Self::from_map(&config_map))
    }

    fn from_map(config_map: &HashMap<String, String>) -> Self {
        let mut settings = Settings::default();

        fn parsed<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str) -> Option<T> {
            let raw = map.get(key)?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "ignoring unparsable setting");
                    None
                }
            }
        }

        if let Some(port) = parsed(config_map, "port") {
            settings.port = port;
        }
        if let Some(source) = config_map.get("regions_source") {
            settings.regions_source = source.clone();
        }
        if let Some(object) = config_map.get("regions_object") {
            settings.regions_object = object.clone();
        }
        if let Some(source) = config_map.get("markers_source") {
            settings.markers_source = source.clone();
        }
        if let Some(dir) = config_map.get("image_dir") {
            settings.image_dir = dir.clone();
        }
        let extent = |v: &f64| v.is_finite() && *v > 0.0;
        if let Some(width) = parsed::<f64>(config_map, "width").filter(extent) {
            settings.width = width;
        }
        if let Some(height) = parsed::<f64>(config_map, "height").filter(extent) {
            settings.height = height;
        }
        // A zero timeout would fail every load.
        if let Some(timeout) = parsed::<u64>(config_map, "fetch_timeout_secs").filter(|t| *t > 0) {
            settings.fetch_timeout_secs = timeout;
        }
        if let Some(seed) = parsed(config_map, "color_seed") {
            settings.color_seed = Some(seed);
        }
        if let Some(auto_open) = parsed(config_map, "auto_open_browser") {
            settings.auto_open_browser = auto_open;
        }

        settings
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Creating config directory")?;
        }

        let mut content = String::new();
        content.push_str("# ReleaseAtlas Configuration File\n");
        content.push_str(&format!("port = {}\n", self.port));
        content.push_str(&format!("regions_source = \"{}\"\n", self.regions_source));
        content.push_str(&format!("regions_object = \"{}\"\n", self.regions_object));
        content.push_str(&format!("markers_source = \"{}\"\n", self.markers_source));
        content.push_str(&format!("image_dir = \"{}\"\n", self.image_dir));
        content.push_str(&format!("width = {}\n", self.width));
        content.push_str(&format!("height = {}\n", self.height));
        content.push_str(&format!("fetch_timeout_secs = {}\n", self.fetch_timeout_secs));
        if let Some(seed) = self.color_seed {
            content.push_str(&format!("color_seed = {}\n", seed));
        }
        content.push_str(&format!("auto_open_browser = {}\n", self.auto_open_browser));

        std::fs::write(config_path, content).context("Failed to write to config file")?;
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn config_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        config_path_for(&exe_dir)
    }
}

/// Config beside the binary, except under `cargo run`, where the binary
/// sits in `target/<profile>` and the config lives at the package root.
fn config_path_for(exe_dir: &Path) -> PathBuf {
    let in_target = exe_dir
        .parent()
        .filter(|dir| dir.ends_with("target"))
        .and_then(Path::parent);
    in_target.unwrap_or(exe_dir).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_keys_and_keeps_defaults_for_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release_atlas.ini");
        std::fs::write(
            &path,
            "# comment\n\
             port = 4000\n\
             markers_source = \"data/releases.json\"\n\
             width = -5\n\
             height = 640\n\
             fetch_timeout_secs = soon\n\
             color_seed = 42\n\
             unknown_key = 1\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.port, 4000);
        assert_eq!(settings.markers_source, "data/releases.json");
        assert_eq!(settings.width, DEFAULT_WIDTH);
        assert_eq!(settings.height, 640.0);
        assert_eq!(settings.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(settings.color_seed, Some(42));
        assert_eq!(settings.regions_object, "countries");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("release_atlas.ini");
        let settings = Settings {
            port: 3100,
            color_seed: Some(9),
            auto_open_browser: true,
            width: 1024.5,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn rejects_zero_timeout_and_unbounded_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release_atlas.ini");
        std::fs::write(
            &path,
            "fetch_timeout_secs = 0
width = inf
height = NaN
",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
        assert_eq!(settings.width, DEFAULT_WIDTH);
        assert_eq!(settings.height, DEFAULT_HEIGHT);
    }

    #[test]
    fn config_sits_at_package_root_under_cargo() {
        assert_eq!(
            config_path_for(Path::new("/work/atlas/target/debug")),
            PathBuf::from("/work/atlas/release_atlas.ini")
        );
        assert_eq!(
            config_path_for(Path::new("/opt/atlas/bin")),
            PathBuf::from("/opt/atlas/bin/release_atlas.ini")
        );
    }
}
