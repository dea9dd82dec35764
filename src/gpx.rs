//! GPX parsing.
//!
//! Turns GPX text into the ordered point sequence the classifier consumes.
//! Track points (`trk`/`trkseg`/`trkpt`) are used when the document's tracks
//! yield any; otherwise route points (`rte`/`rtept`). Points with missing or
//! unusable coordinates are skipped with a warning.

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SurfaceError};
use crate::GeoPoint;

/// Why a point element was dropped.
#[derive(Debug, Clone, PartialEq)]
enum PointDefect {
    Missing(&'static str),
    NotNumeric(&'static str, String),
    OutOfRange,
}

impl std::fmt::Display for PointDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(attr) => write!(f, "missing '{attr}' attribute"),
            Self::NotNumeric(attr, value) => write!(f, "non-numeric '{attr}' value '{value}'"),
            Self::OutOfRange => write!(f, "coordinates out of range"),
        }
    }
}

#[derive(Debug, Default)]
struct Collected {
    track_points: Vec<GeoPoint>,
    route_points: Vec<GeoPoint>,
    has_track: bool,
    has_route: bool,
    skipped: usize,
}

/// Parse a GPX XML string into its ordered points.
///
/// # Errors
/// - [`SurfaceError::MalformedDocument`] when there is no `rte` or `trk` element
/// - [`SurfaceError::NoValidPoints`] when every point element was skipped
/// - [`SurfaceError::Xml`] when the text is not well-formed XML
///
/// # Example
/// ```
/// use route_surface::parse_gpx;
///
/// let gpx = r#"<gpx><trk><trkseg>
///     <trkpt lat="35.0" lon="139.0"/>
///     <trkpt lat="35.001" lon="139.001"/>
/// </trkseg></trk></gpx>"#;
/// let points = parse_gpx(gpx).unwrap();
/// assert_eq!(points.len(), 2);
/// ```
pub fn parse_gpx(xml: &str) -> Result<Vec<GeoPoint>> {
    let mut reader = Reader::from_str(xml);
    let mut collected = Collected::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trk" => {
                    collected.has_track = true;
                    parse_track(&mut reader, &mut collected)?;
                }
                b"rte" => {
                    collected.has_route = true;
                    parse_route(&mut reader, &mut collected)?;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"trk" => collected.has_track = true,
                b"rte" => collected.has_route = true,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }

    if !collected.has_track && !collected.has_route {
        return Err(SurfaceError::MalformedDocument(
            "no <rte> or <trk> element".to_string(),
        ));
    }

    let use_track = !collected.track_points.is_empty();
    let points = if use_track {
        collected.track_points
    } else {
        collected.route_points
    };

    debug!(
        "[GpxParser] Parsed {} points ({} skipped, source: {})",
        points.len(),
        collected.skipped,
        if use_track { "track" } else { "route" }
    );

    if points.is_empty() {
        return Err(SurfaceError::NoValidPoints);
    }

    Ok(points)
}

/// Parse a <trk> element.
fn parse_track(reader: &mut Reader<&[u8]>, out: &mut Collected) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkseg" => parse_segment(reader, out)?,
                _ => skip_element(reader, &e)?,
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Parse a <trkseg> element.
fn parse_segment(reader: &mut Reader<&[u8]>, out: &mut Collected) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => {
                    let point = parse_point(&e, reader)?;
                    push_point(&mut out.track_points, &mut out.skipped, point);
                }
                _ => skip_element(reader, &e)?,
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    push_point(&mut out.track_points, &mut out.skipped, parse_lat_lon(&e));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

/// Parse a <rte> element.
fn parse_route(reader: &mut Reader<&[u8]>, out: &mut Collected) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"rtept" => {
                    let point = parse_point(&e, reader)?;
                    push_point(&mut out.route_points, &mut out.skipped, point);
                }
                _ => skip_element(reader, &e)?,
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"rtept" {
                    push_point(&mut out.route_points, &mut out.skipped, parse_lat_lon(&e));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"rte" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }
    Ok(())
}

fn push_point(
    points: &mut Vec<GeoPoint>,
    skipped: &mut usize,
    parsed: std::result::Result<GeoPoint, PointDefect>,
) {
    match parsed {
        Ok(point) => points.push(point),
        Err(defect) => {
            *skipped += 1;
            warn!(
                "[GpxParser] Skipping point after #{}: {}",
                points.len(),
                defect
            );
        }
    }
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> std::result::Result<GeoPoint, PointDefect> {
    let mut lat: Option<String> = None;
    let mut lon: Option<String> = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).trim().to_string();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = Some(value),
            b"lon" => lon = Some(value),
            _ => {}
        }
    }

    let lat = parse_coord("lat", lat)?;
    let lon = parse_coord("lon", lon)?;

    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(PointDefect::OutOfRange);
    }
    Ok(point)
}

fn parse_coord(
    attribute: &'static str,
    raw: Option<String>,
) -> std::result::Result<f64, PointDefect> {
    let raw = raw.ok_or(PointDefect::Missing(attribute))?;
    raw.parse::<f64>()
        .map_err(|_| PointDefect::NotNumeric(attribute, raw))
}

/// Parse a point element (rtept, trkpt) and its children.
/// Called after receiving Event::Start for the point element; always
/// consumes through the matching end tag, even when the point is rejected.
fn parse_point(
    start: &BytesStart<'_>,
    reader: &mut Reader<&[u8]>,
) -> Result<std::result::Result<GeoPoint, PointDefect>> {
    let mut parsed = parse_lat_lon(start);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    if let Ok(point) = parsed.as_mut() {
                        point.elevation = text.trim().parse::<f64>().ok();
                    }
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    if let Ok(point) = parsed.as_mut() {
                        let text = text.trim();
                        if !text.is_empty() {
                            point.timestamp = Some(text.to_string());
                        }
                    }
                }
                _ => skip_element(reader, &e)?,
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }

    Ok(parsed)
}

/// Skip unknown elements and extensions, nested content included.
fn skip_element(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<()> {
    reader.read_to_end(start.name()).map_err(SurfaceError::Xml)?;
    Ok(())
}

/// Read text content of an element as an owned String.
fn read_text_owned(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SurfaceError::Xml(e)),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Morning Ride</name>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"><ele>10.0</ele><time>2025-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="35.001" lon="139.001"><ele>11.0</ele></trkpt>
      <trkpt lat="35.002" lon="139.002"/>
    </trkseg>
  </trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].elevation, Some(10.0));
        assert_eq!(points[0].timestamp.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(points[1].elevation, Some(11.0));
        assert_eq!(points[2].elevation, None);
        assert!((points[2].latitude - 35.002).abs() < 1e-10);
    }

    #[test]
    fn test_simple_route() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <rte>
    <name>Test Route</name>
    <rtept lat="35.0" lon="139.0"/>
    <rtept lat="36.0" lon="140.0"><name>Turn</name></rtept>
    <rtept lat="37.0" lon="141.0"/>
  </rte>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].latitude, 36.0);
        assert_eq!(points[2].longitude, 141.0);
    }

    #[test]
    fn test_multi_segment_track_keeps_document_order() {
        let xml = r#"<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="1.0" lon="1.0"/>
      <trkpt lat="2.0" lon="2.0"/>
    </trkseg>
    <trkseg>
      <trkpt lat="3.0" lon="3.0"/>
    </trkseg>
  </trk>
  <trk><trkseg><trkpt lat="4.0" lon="4.0"/></trkseg></trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_track_preferred_over_route() {
        let xml = r#"<gpx version="1.1">
  <rte><rtept lat="10.0" lon="10.0"/></rte>
  <trk><trkseg><trkpt lat="20.0" lon="20.0"/></trkseg></trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].latitude, 20.0);
    }

    #[test]
    fn test_empty_track_falls_back_to_route() {
        let xml = r#"<gpx version="1.1">
  <trk><name>empty</name></trk>
  <rte><rtept lat="10.0" lon="10.0"/><rtept lat="10.1" lon="10.1"/></rte>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![10.0, 10.1]);
    }

    #[test]
    fn test_track_of_invalid_points_falls_back_to_route() {
        let xml = r#"<gpx version="1.1">
  <trk><trkseg><trkpt lat="x" lon="1.0"/></trkseg></trk>
  <rte><rtept lat="5.0" lon="5.0"/></rte>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].latitude, 5.0);
    }

    #[test]
    fn test_no_route_or_track_is_malformed() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.0" lon="139.0"><name>Only a waypoint</name></wpt>
</gpx>"#;
        match parse_gpx(xml) {
            Err(SurfaceError::MalformedDocument(msg)) => assert!(msg.contains("rte")),
            other => panic!("Expected MalformedDocument, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_points_skipped() {
        let xml = r#"<gpx version="1.1">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0"/>
    <trkpt lon="139.5"/>
    <trkpt lat="north" lon="139.5"><ele>5</ele></trkpt>
    <trkpt lat="95.0" lon="139.5"/>
    <trkpt lat="36.0" lon="140.0"/>
  </trkseg></trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].latitude, 35.0);
        assert_eq!(points[1].latitude, 36.0);
    }

    #[test]
    fn test_all_points_invalid() {
        let xml = r#"<gpx version="1.1">
  <rte>
    <rtept lat="abc" lon="139.0"/>
    <rtept lat="35.0"/>
  </rte>
</gpx>"#;
        assert!(matches!(parse_gpx(xml), Err(SurfaceError::NoValidPoints)));
    }

    #[test]
    fn test_empty_track_has_no_valid_points() {
        let xml = r#"<gpx version="1.1"><trk/></gpx>"#;
        assert!(matches!(parse_gpx(xml), Err(SurfaceError::NoValidPoints)));
    }

    #[test]
    fn test_extensions_and_namespace() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
        <ele>42.5</ele>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].elevation, Some(42.5));
    }

    #[test]
    fn test_broken_xml() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="1" lon="1"></trkseg></trk></gpx>"#;
        assert!(parse_gpx(xml).is_err());
    }
}
