//! TopoJSON decoding.
//!
//! A topology stores every boundary once as an arc; polygons reference arcs
//! by index, with a negative index `!i` meaning arc `i` walked backwards.
//! Quantized topologies carry a `transform` and delta-encode arc positions.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::LoadCause;

/// One decoded boundary. Single polygons are widened to a one-member
/// multipolygon.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub code: Option<String>,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

type DecodedArc = Vec<Coord<f64>>;

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    transform: Option<QuantizeTransform>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    objects: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct QuantizeTransform {
    scale: [f64; 2],
    translate: [f64; 2],
}

/// Decodes the polygonal geometries of `object` into region features,
/// in document order. Non-area geometries are skipped.
pub fn decode_regions(payload: &str, object: &str) -> Result<Vec<RegionFeature>, LoadCause> {
    let topology: Topology = serde_json::from_str(payload)?;
    if topology.kind != "Topology" {
        return Err(LoadCause::Topology(format!(
            "expected type \"Topology\", found \"{}\"",
            topology.kind
        )));
    }

    let arcs = decode_arcs(&topology.arcs, topology.transform)?;
    let root = topology
        .objects
        .get(object)
        .ok_or_else(|| LoadCause::Topology(format!("object \"{object}\" not found")))?;

    let mut features = Vec::new();
    collect_features(root, &arcs, &mut features)?;
    Ok(features)
}

fn decode_arcs(
    raw: &[Vec<Vec<f64>>],
    transform: Option<QuantizeTransform>,
) -> Result<Vec<DecodedArc>, LoadCause> {
    raw.iter()
        .enumerate()
        .map(|(arc_index, positions)| {
            let (mut x, mut y) = (0.0, 0.0);
            positions
                .iter()
                .map(|pos| {
                    let (px, py) = match pos.as_slice() {
                        [px, py, ..] => (*px, *py),
                        _ => {
                            return Err(LoadCause::Topology(format!(
                                "arc {arc_index} has a position with fewer than two coordinates"
                            )))
                        }
                    };
                    Ok(match transform {
                        Some(t) => {
                            x += px;
                            y += py;
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        }
                        None => Coord { x: px, y: py },
                    })
                })
                .collect()
        })
        .collect()
}

fn collect_features(
    value: &Value,
    arcs: &[DecodedArc],
    out: &mut Vec<RegionFeature>,
) -> Result<(), LoadCause> {
    let obj = value
        .as_object()
        .ok_or_else(|| LoadCause::Topology("geometry must be an object".to_string()))?;

    let geometry = match obj.get("type").and_then(Value::as_str) {
        Some("GeometryCollection") => {
            let members = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| LoadCause::Topology("collection without geometries".to_string()))?;
            for member in members {
                collect_features(member, arcs, out)?;
            }
            return Ok(());
        }
        Some("Polygon") => MultiPolygon::new(vec![polygon(obj.get("arcs"), arcs)?]),
        Some("MultiPolygon") => {
            let polys = obj
                .get("arcs")
                .and_then(Value::as_array)
                .ok_or_else(|| LoadCause::Topology("multipolygon without arcs".to_string()))?;
            MultiPolygon::new(
                polys
                    .iter()
                    .map(|p| polygon(Some(p), arcs))
                    .collect::<Result<_, _>>()?,
            )
        }
        // Points, lines and null geometries have no area to draw.
        _ => return Ok(()),
    };

    let code = match obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let name = obj
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| code.clone())
        .unwrap_or_else(|| format!("region-{}", out.len()));

    out.push(RegionFeature {
        code,
        name,
        geometry,
    });
    Ok(())
}

// First ring is the exterior, the rest are holes.
fn polygon(value: Option<&Value>, arcs: &[DecodedArc]) -> Result<Polygon<f64>, LoadCause> {
    let rings = value
        .and_then(Value::as_array)
        .ok_or_else(|| LoadCause::Topology("polygon without arcs".to_string()))?;
    let mut rings = rings
        .iter()
        .map(|r| ring(r, arcs))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

fn ring(value: &Value, arcs: &[DecodedArc]) -> Result<LineString<f64>, LoadCause> {
    let indices = value
        .as_array()
        .ok_or_else(|| LoadCause::Topology("ring must be an array of arc indices".to_string()))?;

    let mut points: DecodedArc = Vec::new();
    for index in indices {
        let i = index
            .as_i64()
            .ok_or_else(|| LoadCause::Topology(format!("bad arc index {index}")))?;
        let (arc_index, reversed) = if i < 0 { (!i, true) } else { (i, false) };
        let arc = usize::try_from(arc_index)
            .ok()
            .and_then(|a| arcs.get(a))
            .ok_or_else(|| LoadCause::Topology(format!("arc index {i} out of range")))?;

        // Consecutive arcs share an endpoint.
        points.pop();
        if reversed {
            points.extend(arc.iter().rev().copied());
        } else {
            points.extend(arc.iter().copied());
        }
    }
    Ok(LineString::new(points))
}
