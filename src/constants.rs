// Config file, looked up next to the executable
pub const CONFIG_FILE_NAME: &str = "release_atlas.ini";

// Port configuration
pub const DEFAULT_PORT: u16 = 3001;

// Viewport defaults (browser window minus a 50px margin on a typical laptop screen)
pub const DEFAULT_WIDTH: f64 = 1200.0;
pub const DEFAULT_HEIGHT: f64 = 700.0;

// Projection parameters, Mercator centred slightly north so the populated latitudes fill the frame
pub const PROJECTION_CENTER: (f64, f64) = (0.0, 30.0);
pub const PROJECTION_SCALE: f64 = 180.0;

// Zoom limits shared by click-to-focus and gestures
pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 8.0;
// Fraction of the viewport a focused region should fill
pub const FOCUS_FILL: f64 = 0.9;
pub const BASE_STROKE_WIDTH: f64 = 1.5;

// Transition durations
pub const VIEW_TRANSITION_MS: u64 = 750;
// Spacing of the precomputed animation frames sent with each transition
pub const FRAME_INTERVAL_MS: u64 = 25;
pub const TOOLTIP_FADE_MS: u64 = 300;

// Tooltip placement relative to the pointer
pub const TOOLTIP_OFFSET_X: f64 = 40.0;
pub const TOOLTIP_OFFSET_Y: f64 = -50.0;

// Data loading
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_REGIONS_SOURCE: &str = "https://d3js.org/world-50m.v1.json";
pub const DEFAULT_REGIONS_OBJECT: &str = "countries";
pub const DEFAULT_MARKERS_SOURCE: &str = "./data/disney.json";
pub const DEFAULT_IMAGE_DIR: &str = "./img";

// Region fills, drawn at random with replacement
pub const REGION_PALETTE: &[&str] = &["#B4C67B", "#FFED7B", "#FFBE6B", "#FFAA7E"];

// Marker colours: the Dark2 categorical scheme
pub const MARKER_PALETTE: &[&str] = &[
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
];

// Image extensions tried when resolving a marker picture, in order
pub const IMAGE_EXTENSIONS: &[&str] = &["", "jpg", "jpeg", "png", "gif", "webp"];
