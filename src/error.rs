use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which dataset a load failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSet {
    Regions,
    Markers,
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSet::Regions => f.write_str("regions"),
            DataSet::Markers => f.write_str("markers"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadCause {
    #[error("IO error: {0}")]
    Io(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("JSON parse error: {0}")]
    Parse(String),
    #[error("invalid topology: {0}")]
    Topology(String),
}

impl From<std::io::Error> for LoadCause {
    fn from(e: std::io::Error) -> Self {
        LoadCause::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LoadCause {
    fn from(e: serde_json::Error) -> Self {
        LoadCause::Parse(e.to_string())
    }
}

impl From<geojson::Error> for LoadCause {
    fn from(e: geojson::Error) -> Self {
        LoadCause::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for LoadCause {
    fn from(e: reqwest::Error) -> Self {
        LoadCause::Http(e.to_string())
    }
}

/// A dataset could not be fetched or decoded. Fatal to that dataset's part
/// of the scene only.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to load {dataset}: {cause}")]
pub struct DataLoadError {
    pub dataset: DataSet,
    #[source]
    pub cause: LoadCause,
}

impl DataLoadError {
    pub fn new(dataset: DataSet, cause: impl Into<LoadCause>) -> Self {
        Self {
            dataset,
            cause: cause.into(),
        }
    }
}

impl Serialize for DataLoadError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("DataLoadError", 2)?;
        s.serialize_field("source", &self.dataset)?;
        s.serialize_field("cause", &self.cause.to_string())?;
        s.end()
    }
}

/// Bounds that cannot drive a focus transition. Recovered by falling back
/// to scale 1.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("region {0} has empty bounds")]
    EmptyBounds(String),
    #[error("region {0} has non-finite bounds")]
    NonFiniteBounds(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("unknown region {0}")]
    UnknownRegion(usize),
    #[error("unknown marker {0}")]
    UnknownMarker(usize),
}

/// A marker picture is absent from the image directory.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("no image asset named {image_name}")]
pub struct AssetMissing {
    pub image_name: String,
}
