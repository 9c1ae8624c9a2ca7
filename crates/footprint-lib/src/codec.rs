//! Tagged WKT parsing and Web Mercator reprojection
//!
//! Record geometries arrive as WKT strings in geographic lon/lat (EPSG:4326),
//! optionally prefixed with an `SRID=<n>;` marker. [`GeometryCodec::parse`] turns
//! them into a [`ParsedGeometry`] in display units (EPSG:3857 meters) with its
//! extent computed once, so queries never touch the text again.

use crate::{EngineError, Result, utils};

use geo::{
    BoundingRect, Closest, ClosestPoint, Contains, Coord, CoordsIter, Geometry, LineString,
    MapCoords, MultiPolygon, Point, Polygon, Rect,
};
use wkt::TryFromWkt;

/// The only spatial reference accepted as input
pub const GEOGRAPHIC_SRID: u32 = 4326;

/// Geometry kinds the map knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// True for kinds drawn with a fill (polygons)
    #[inline]
    pub fn is_areal(self) -> bool {
        matches!(self, GeometryKind::Polygon | GeometryKind::MultiPolygon)
    }

    /// True for kinds drawn as strokes or fills rather than markers
    #[inline]
    pub fn is_shape(self) -> bool {
        !matches!(self, GeometryKind::Point)
    }
}

/// Normalized geometry in display units
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// A parsed, reprojected geometry with its precomputed extent
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGeometry {
    shape: Shape,
    extent: Rect<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ParsedGeometry {
    /// Wrap an already-projected shape, computing its extent
    ///
    /// Fails for empty shapes, which have no extent.
    pub fn from_shape(shape: Shape) -> Result<Self> {
        let extent = match &shape {
            Shape::Point(p) => Some(p.bounding_rect()),
            Shape::LineString(l) => l.bounding_rect(),
            Shape::Polygon(p) => p.bounding_rect(),
            Shape::MultiPolygon(m) => m.bounding_rect(),
        }
        .ok_or_else(|| EngineError::InvalidGeometry("empty geometry".to_string()))?;

        Ok(Self { shape, extent })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Axis-aligned extent in display units
    #[inline]
    pub fn extent(&self) -> Rect<f64> {
        self.extent
    }

    #[inline]
    pub fn kind(&self) -> GeometryKind {
        match self.shape {
            Shape::Point(_) => GeometryKind::Point,
            Shape::LineString(_) => GeometryKind::LineString,
            Shape::Polygon(_) => GeometryKind::Polygon,
            Shape::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// The point position, for point geometries
    #[inline]
    pub fn as_point(&self) -> Option<Point<f64>> {
        match self.shape {
            Shape::Point(p) => Some(p),
            _ => None,
        }
    }

    /// Whether an areal geometry covers the coordinate
    ///
    /// Always false for points and lines.
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        if !utils::rect_contains(&self.extent, coord) {
            return false;
        }
        match &self.shape {
            Shape::Polygon(p) => p.contains(&Point::from(coord)),
            Shape::MultiPolygon(m) => m.contains(&Point::from(coord)),
            Shape::Point(_) | Shape::LineString(_) => false,
        }
    }

    /// Closest point of the geometry to `coord`, in display units
    ///
    /// Returns `coord` itself when it lies on or inside the geometry.
    pub fn closest_point(&self, coord: Coord<f64>) -> Option<Point<f64>> {
        let target = Point::from(coord);
        let closest = match &self.shape {
            Shape::Point(p) => return Some(*p),
            Shape::LineString(l) => l.closest_point(&target),
            Shape::Polygon(p) => p.closest_point(&target),
            Shape::MultiPolygon(m) => m.closest_point(&target),
        };
        match closest {
            Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
            Closest::Indeterminate => None,
        }
    }

    /// Planar distance in display units from `coord` to the geometry
    pub fn distance_to(&self, coord: Coord<f64>) -> f64 {
        if self.contains(coord) {
            return 0.0;
        }
        match self.closest_point(coord) {
            Some(p) => (p.x() - coord.x).hypot(p.y() - coord.y),
            None => f64::INFINITY,
        }
    }

    /// Where a label should be drawn: on the point, or centered above a shape
    pub fn label_anchor(&self) -> Coord<f64> {
        match self.shape {
            Shape::Point(p) => p.0,
            _ => Coord {
                x: (self.extent.min().x + self.extent.max().x) / 2.0,
                y: self.extent.max().y,
            },
        }
    }

    /// Convert back to geographic coordinates (x = lon, y = lat)
    pub fn to_geographic(&self) -> Geometry<f64> {
        let inverse = |c: Coord<f64>| utils::mercator_to_lon_lat(c).0;
        match &self.shape {
            Shape::Point(p) => Geometry::Point(p.map_coords(inverse)),
            Shape::LineString(l) => Geometry::LineString(l.map_coords(inverse)),
            Shape::Polygon(p) => Geometry::Polygon(p.map_coords(inverse)),
            Shape::MultiPolygon(m) => Geometry::MultiPolygon(m.map_coords(inverse)),
        }
    }
}

/// Stateless WKT codec
pub struct GeometryCodec;

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeometryCodec {
    /// Parse tagged WKT in lon/lat and reproject it to display units
    pub fn parse(input: &str) -> Result<ParsedGeometry> {
        #[cfg(feature = "profiling")]
        profiling::scope!("codec::parse");

        let (srid, body) = strip_srid(input)?;
        if let Some(srid) = srid.filter(|s| *s != GEOGRAPHIC_SRID) {
            return Err(EngineError::InvalidGeometry(format!(
                "unsupported SRID {srid}, expected {GEOGRAPHIC_SRID}"
            )));
        }

        // WKT keywords are case-insensitive; numbers survive uppercasing
        let body = body.trim().to_ascii_uppercase();
        if body.is_empty() {
            return Err(EngineError::InvalidGeometry("empty input".to_string()));
        }
        // `POINT EMPTY` would otherwise come back as an empty MULTIPOINT
        if body.split_whitespace().next_back() == Some("EMPTY") {
            return Err(EngineError::InvalidGeometry(format!("empty geometry: {body}")));
        }

        let geometry = Geometry::<f64>::try_from_wkt_str(&body)
            .map_err(|e| EngineError::InvalidGeometry(e.to_string()))?;

        Self::project(geometry)
    }

    /// Reproject a geographic geometry (x = lon, y = lat) to display units
    pub fn project(geometry: Geometry<f64>) -> Result<ParsedGeometry> {
        validate_geographic(&geometry)?;

        let forward = |c: Coord<f64>| utils::wgs84_to_mercator(c.y, c.x).0;
        let shape = match geometry {
            Geometry::Point(p) => Shape::Point(p.map_coords(forward)),
            Geometry::LineString(l) if l.0.len() >= 2 => Shape::LineString(l.map_coords(forward)),
            Geometry::Polygon(p) if p.exterior().0.len() >= 3 => {
                Shape::Polygon(p.map_coords(forward))
            }
            Geometry::MultiPolygon(m) if !m.0.is_empty() => {
                Shape::MultiPolygon(m.map_coords(forward))
            }
            Geometry::LineString(_) | Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
                return Err(EngineError::InvalidGeometry(
                    "empty or degenerate geometry".to_string(),
                ));
            }
            other => {
                return Err(EngineError::InvalidGeometry(format!(
                    "unsupported geometry type {}",
                    geometry_type_name(&other)
                )));
            }
        };

        ParsedGeometry::from_shape(shape)
    }

    /// Inverse transform, see [`ParsedGeometry::to_geographic`]
    #[inline]
    pub fn unproject(parsed: &ParsedGeometry) -> Geometry<f64> {
        parsed.to_geographic()
    }
}

/// Split an optional `SRID=<n>;` prefix off a tagged WKT string
fn strip_srid(input: &str) -> Result<(Option<u32>, &str)> {
    let trimmed = input.trim_start();
    let has_prefix = trimmed
        .get(..4)
        .is_some_and(|p| p.eq_ignore_ascii_case("SRID"));
    if !has_prefix {
        return Ok((None, trimmed));
    }

    let rest = trimmed[4..].trim_start();
    let rest = rest
        .strip_prefix('=')
        .ok_or_else(|| EngineError::InvalidGeometry("malformed SRID prefix".to_string()))?;
    let (code, body) = rest
        .split_once(';')
        .ok_or_else(|| EngineError::InvalidGeometry("SRID prefix missing ';'".to_string()))?;
    let srid = code
        .trim()
        .parse::<u32>()
        .map_err(|_| EngineError::InvalidGeometry(format!("invalid SRID '{}'", code.trim())))?;

    Ok((Some(srid), body))
}

fn validate_geographic(geometry: &Geometry<f64>) -> Result<()> {
    for c in geometry.coords_iter() {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(EngineError::InvalidGeometry(
                "non-finite coordinate".to_string(),
            ));
        }
        if c.x.abs() > 180.0 || c.y.abs() > 90.0 {
            return Err(EngineError::InvalidGeometry(format!(
                "coordinate ({}, {}) outside lon/lat range",
                c.x, c.y
            )));
        }
    }
    Ok(())
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) => "LINE",
        Geometry::LineString(_) => "LINESTRING",
        Geometry::Polygon(_) => "POLYGON",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) => "RECT",
        Geometry::Triangle(_) => "TRIANGLE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_coords_close(a: &Geometry<f64>, b: &Geometry<f64>, tolerance: f64) {
        let a: Vec<_> = a.coords_iter().collect();
        let b: Vec<_> = b.coords_iter().collect();
        assert_eq!(a.len(), b.len());
        for (ca, cb) in a.iter().zip(b.iter()) {
            assert!((ca.x - cb.x).abs() < tolerance, "{ca:?} vs {cb:?}");
            assert!((ca.y - cb.y).abs() < tolerance, "{ca:?} vs {cb:?}");
        }
    }

    #[test]
    fn test_parse_point_roundtrip() {
        let parsed = GeometryCodec::parse("SRID=4326;POINT (-77.0353 38.8895)").unwrap();
        assert_eq!(parsed.kind(), GeometryKind::Point);

        let back = GeometryCodec::unproject(&parsed);
        let expected = Geometry::Point(Point::new(-77.0353, 38.8895));
        assert_coords_close(&back, &expected, 1e-6);
    }

    #[test]
    fn test_parse_polygon_roundtrip() {
        let wkt = "POLYGON ((10 10, 11 10, 11 11, 10 11, 10 10))";
        let parsed = GeometryCodec::parse(wkt).unwrap();
        assert_eq!(parsed.kind(), GeometryKind::Polygon);
        assert!(parsed.kind().is_areal());

        let back = parsed.to_geographic();
        let expected = Geometry::<f64>::try_from_wkt_str(wkt).unwrap();
        assert_coords_close(&back, &expected, 1e-6);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let wkt = "SRID=4326;MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))";
        let a = GeometryCodec::parse(wkt).unwrap();
        let b = GeometryCodec::parse(wkt).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind(), GeometryKind::MultiPolygon);
    }

    #[test]
    fn test_srid_prefix_variants() {
        for wkt in [
            "srid=4326;POINT (1 2)",
            "  SRID = 4326 ; POINT (1 2)",
            "POINT (1 2)",
            "point (1 2)",
        ] {
            let parsed = GeometryCodec::parse(wkt);
            assert!(parsed.is_ok(), "{wkt}: {parsed:?}");
        }
    }

    #[test]
    fn test_rejects_other_srid() {
        let err = GeometryCodec::parse("SRID=3857;POINT (1 2)").unwrap_err();
        assert!(err.to_string().contains("3857"));
    }

    #[test]
    fn test_rejects_unsupported_and_malformed() {
        for wkt in [
            "MULTIPOINT ((1 2), (3 4))",
            "GEOMETRYCOLLECTION (POINT (1 2))",
            "POINT (1",
            "NOT WKT AT ALL",
            "",
            "SRID=4326;",
            "SRID4326;POINT (1 2)",
            "POINT (200 10)",
        ] {
            assert!(
                matches!(
                    GeometryCodec::parse(wkt),
                    Err(EngineError::InvalidGeometry(_))
                ),
                "{wkt} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_geometry_is_reported_as_empty() {
        for wkt in ["POINT EMPTY", "point empty", "SRID=4326;LINESTRING EMPTY"] {
            match GeometryCodec::parse(wkt) {
                Err(EngineError::InvalidGeometry(message)) => {
                    assert!(message.starts_with("empty geometry"), "{wkt}: {message}");
                    assert!(!message.contains("MULTIPOINT"), "{wkt}: {message}");
                }
                other => panic!("{wkt} gave {other:?}"),
            }
        }
    }

    #[test]
    fn test_extent_is_precomputed() {
        let parsed = GeometryCodec::parse("LINESTRING (0 0, 1 1)").unwrap();
        let extent = parsed.extent();
        let far = utils::wgs84_to_mercator(1.0, 1.0);
        assert!(extent.min().x.abs() < 1e-9);
        assert!((extent.max().x - far.x()).abs() < 1e-6);
        assert!((extent.max().y - far.y()).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_contains_and_distance() {
        let parsed = GeometryCodec::parse("POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        let inside = utils::wgs84_to_mercator(0.5, 0.5).0;
        let outside = utils::wgs84_to_mercator(0.5, 2.0).0;

        assert!(parsed.contains(inside));
        assert_eq!(parsed.distance_to(inside), 0.0);
        assert!(!parsed.contains(outside));
        assert!(parsed.distance_to(outside) > 0.0);
    }

    #[test]
    fn test_label_anchor_above_shape() {
        let parsed = GeometryCodec::parse("POLYGON ((0 0, 2 0, 2 2, 0 2, 0 0))").unwrap();
        let anchor = parsed.label_anchor();
        assert!((anchor.y - parsed.extent().max().y).abs() < 1e-9);
        assert!(anchor.x > parsed.extent().min().x && anchor.x < parsed.extent().max().x);
    }
}
