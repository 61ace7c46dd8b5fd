//! Boundary geometry. Decoded regions are `geo` multipolygons in degrees;
//! projecting maps them onto the same types in screen pixels.

pub mod path;
pub mod projection;
pub mod topology;

pub use path::PathData;
pub use projection::Mercator;
pub use topology::{decode_regions, RegionFeature};
