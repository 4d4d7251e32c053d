//! [`GeometryEngine`] built on the `geo` crate.

use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use osmlite_core::{Geometry, GeometryEngine, GeometryKind, InvalidGeometry};

use crate::wkb;

/// Builds WGS84 geometries with `geo` and encodes them as WKB.
///
/// Closed areas become single-member multipolygons so the polygon table
/// holds one geometry type.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

fn check_coord(coord: Coord<f64>) -> Result<(), InvalidGeometry> {
    let Coord { x: lon, y: lat } = coord;
    if !lon.is_finite() || !lat.is_finite() {
        return Err(InvalidGeometry::NonFinite { lon, lat });
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(InvalidGeometry::OutOfRange { lon, lat });
    }
    Ok(())
}

fn distinct_count(points: &[Coord<f64>]) -> usize {
    let mut distinct: Vec<Coord<f64>> = Vec::new();
    for point in points {
        if !distinct.contains(point) {
            distinct.push(*point);
        }
        if distinct.len() > 2 {
            break;
        }
    }
    distinct.len()
}

impl GeometryEngine for GeoEngine {
    fn compute_point(&self, lon: f64, lat: f64) -> Result<Geometry, InvalidGeometry> {
        let coord = Coord { x: lon, y: lat };
        check_coord(coord)?;
        Ok(Geometry::new(GeometryKind::Point, wkb::point(coord)))
    }

    fn compute_line(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry> {
        points.iter().copied().try_for_each(check_coord)?;
        let found = distinct_count(points);
        if found < 2 {
            return Err(InvalidGeometry::TooFewPoints { required: 2, found });
        }
        let line = LineString::from(points.to_vec());
        Ok(Geometry::new(
            GeometryKind::LineString,
            wkb::line_string(&line),
        ))
    }

    fn compute_closed_area(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry> {
        points.iter().copied().try_for_each(check_coord)?;
        if points.len() < 4 {
            return Err(InvalidGeometry::TooFewPoints {
                required: 4,
                found: points.len(),
            });
        }
        if points.first() != points.last() {
            return Err(InvalidGeometry::NotClosed);
        }
        let polygon = Polygon::new(LineString::from(points.to_vec()), Vec::new());
        if polygon.unsigned_area() <= 0.0 {
            return Err(InvalidGeometry::ZeroArea);
        }
        Ok(Geometry::new(
            GeometryKind::MultiPolygon,
            wkb::multi_polygon(&MultiPolygon::new(vec![polygon])),
        ))
    }
}
