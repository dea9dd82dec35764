use thiserror::Error;

/// Errors surfaced to callers of the parser and the classification pipeline.
///
/// Tile-load timeouts and degraded classifications are not errors: they are
/// recovered per point and only show up in [`crate::Progress`].
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("malformed GPX document: {0}")]
    MalformedDocument(String),
    #[error("GPX document contains no valid points")]
    NoValidPoints,
    #[error("map is not ready: base style and road layer must be loaded first")]
    MapNotReady,
    #[error("route classification was cancelled")]
    Cancelled,
    #[error("XML processing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid route data: {0}")]
    InvalidRouteData(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Failures reported by a map engine behind [`crate::MapQueryPort`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("camera move rejected: {0}")]
    CameraRejected(String),
    #[error("map engine unavailable")]
    Unavailable,
}
