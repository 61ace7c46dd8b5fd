use geojson::{FeatureCollection, GeoJson};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::constants::MARKER_PALETTE;
use crate::error::LoadCause;

/// One release event as it appears in a feature's `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub location: String,
    pub time: String,
    #[serde(deserialize_with = "string_or_bool")]
    pub released: String,
    #[serde(deserialize_with = "integer_like")]
    pub id: i64,
    #[serde(deserialize_with = "lenient_number")]
    pub mass: f64,
    pub longitude: f64,
    pub latitude: f64,
}

/// Radius tier for a mass. Thresholds are exclusive lower bounds, so a mass
/// sitting exactly on a threshold lands in the tier below.
pub fn classify_radius(mass: f64) -> f64 {
    if mass > 20_000_000.0 {
        20.0
    } else if mass > 200_000.0 {
        15.0
    } else if mass > 20_000.0 {
        12.0
    } else if mass > 2_000.0 {
        7.0
    } else if mass > 20.0 {
        3.0
    } else {
        1.0
    }
}

/// Ordinal colour scale keyed by the raw mass value. Each distinct value
/// takes the next palette slot in first-seen order, wrapping around.
#[derive(Debug, Clone)]
pub struct ColorScale {
    palette: &'static [&'static str],
    assigned: HashMap<u64, usize>,
}

impl Default for ColorScale {
    fn default() -> Self {
        Self::new(MARKER_PALETTE)
    }
}

impl ColorScale {
    pub fn new(palette: &'static [&'static str]) -> Self {
        Self {
            palette,
            assigned: HashMap::new(),
        }
    }

    pub fn color_for(&mut self, mass: f64) -> &'static str {
        let next = self.assigned.len();
        let slot = *self.assigned.entry(mass_key(mass)).or_insert(next);
        self.palette[slot % self.palette.len()]
    }
}

fn mass_key(mass: f64) -> u64 {
    if mass.is_nan() {
        f64::NAN.to_bits()
    } else if mass == 0.0 {
        0.0f64.to_bits()
    } else {
        mass.to_bits()
    }
}

/// Parses a GeoJSON FeatureCollection of markers. Features whose properties
/// do not describe a marker are skipped with a warning; a document that is
/// not a feature collection is an error.
pub fn parse_markers(payload: &str) -> Result<Vec<Marker>, LoadCause> {
    let collection = FeatureCollection::try_from(payload.parse::<GeoJson>()?)?;

    let mut markers = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(properties) = feature.properties else {
            tracing::warn!(index, "marker feature without properties skipped");
            continue;
        };
        match serde_json::from_value::<Marker>(Value::Object(properties)) {
            Ok(marker) => markers.push(marker),
            Err(e) => tracing::warn!(index, error = %e, "invalid marker feature skipped"),
        }
    }
    Ok(markers)
}

fn string_or_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or bool, found {other}"
        ))),
    }
}

fn integer_like<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer id, found {value}")))
}

// Non-numeric masses become NaN and classify into the smallest tier.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_tiers_use_strict_thresholds() {
        assert_eq!(classify_radius(20_000_001.0), 20.0);
        assert_eq!(classify_radius(20_000_000.0), 15.0);
        assert_eq!(classify_radius(500_000.0), 15.0);
        assert_eq!(classify_radius(200_000.0), 12.0);
        assert_eq!(classify_radius(20_000.0), 7.0);
        assert_eq!(classify_radius(2_000.0), 3.0);
        assert_eq!(classify_radius(21.0), 3.0);
        assert_eq!(classify_radius(20.0), 1.0);
    }

    #[test]
    fn degenerate_masses_fall_to_smallest_tier() {
        assert_eq!(classify_radius(-5.0), 1.0);
        assert_eq!(classify_radius(f64::NAN), 1.0);
        assert_eq!(classify_radius(f64::NEG_INFINITY), 1.0);
        assert_eq!(classify_radius(f64::INFINITY), 20.0);
    }

    #[test]
    fn radius_is_monotone_in_mass() {
        let mut previous = classify_radius(-1.0);
        let mut mass = -1.0;
        while mass < 1e9 {
            let r = classify_radius(mass);
            assert!(r >= previous, "radius dropped at mass {mass}");
            previous = r;
            mass = mass * 1.37 + 3.0;
        }
    }

    #[test]
    fn color_scale_is_stable_per_value_and_cycles() {
        let mut scale = ColorScale::default();
        let a = scale.color_for(500_000.0);
        let b = scale.color_for(12.0);
        assert_eq!(a, MARKER_PALETTE[0]);
        assert_eq!(b, MARKER_PALETTE[1]);
        assert_eq!(scale.color_for(500_000.0), a);
        assert_eq!(scale.color_for(-0.0), scale.color_for(0.0));

        for i in 0..MARKER_PALETTE.len() - 3 {
            scale.color_for(1000.0 + i as f64);
        }
        // ninth distinct value wraps to the first colour
        assert_eq!(scale.color_for(99.0), MARKER_PALETTE[0]);
    }

    #[test]
    fn parses_feature_collection_with_loose_types() {
        let payload = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [-81.56, 28.42] },
                  "properties": {
                    "name": "Big Thunder Mountain", "location": "Orlando", "time": "1971",
                    "released": "true", "id": 1, "mass": 500000,
                    "longitude": -81.56, "latitude": 28.42 } },
                { "type": "Feature", "geometry": null, "properties": {
                    "name": "Space: 1999", "location": "Paris", "time": "1992",
                    "released": false, "id": 2.0, "mass": "n/a",
                    "longitude": 2.35, "latitude": 48.85 } },
                { "type": "Feature", "geometry": null, "properties": { "name": "incomplete" } },
                { "type": "Feature", "geometry": null, "properties": null }
            ]
        }"#;
        let markers = parse_markers(payload).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].released, "true");
        assert_eq!(markers[0].mass, 500_000.0);
        assert_eq!(markers[1].released, "false");
        assert_eq!(markers[1].id, 2);
        assert!(markers[1].mass.is_nan());
    }

    #[test]
    fn rejects_non_collections() {
        assert!(matches!(
            parse_markers(r#"{"type":"Topology"}"#),
            Err(LoadCause::Parse(_))
        ));
        assert!(matches!(parse_markers("[1,2"), Err(LoadCause::Parse(_))));
        // valid GeoJSON, but a lone feature is not a collection
        assert!(matches!(
            parse_markers(r#"{"type":"Feature","geometry":null,"properties":{}}"#),
            Err(LoadCause::Parse(_))
        ));
    }
}
