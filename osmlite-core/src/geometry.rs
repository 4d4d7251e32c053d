//! Geometry engine boundary.
//!
//! Computational geometry lives behind [`GeometryEngine`]; the router only
//! asks for point, line and closed-area candidates and stores whatever
//! well-known binary the engine returns.

use std::fmt;

use geo::Coord;
use thiserror::Error;

/// Shape of a computed geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// An open or closed line through ordered positions.
    LineString,
    /// One or more polygons; closed ways are stored as a single-member
    /// multipolygon.
    MultiPolygon,
}

impl GeometryKind {
    /// Geometry type name as recorded in `geometry_columns`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A valid geometry encoded as well-known binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    kind: GeometryKind,
    wkb: Vec<u8>,
}

impl Geometry {
    /// Wrap an encoded geometry.
    #[must_use]
    pub const fn new(kind: GeometryKind, wkb: Vec<u8>) -> Self {
        Self { kind, wkb }
    }

    /// Shape of the geometry.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Encoded bytes.
    #[must_use]
    pub fn wkb(&self) -> &[u8] {
        &self.wkb
    }

    /// Consume the geometry, returning the encoded bytes.
    #[must_use]
    pub fn into_wkb(self) -> Vec<u8> {
        self.wkb
    }
}

/// Reasons an engine refuses to build a geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidGeometry {
    /// A coordinate is NaN or infinite.
    #[error("coordinate ({lon}, {lat}) is not finite")]
    NonFinite {
        /// Longitude.
        lon: f64,
        /// Latitude.
        lat: f64,
    },
    /// A coordinate lies outside the WGS84 range.
    #[error("coordinate ({lon}, {lat}) is outside the WGS84 range")]
    OutOfRange {
        /// Longitude.
        lon: f64,
        /// Latitude.
        lat: f64,
    },
    /// Not enough distinct positions for the requested shape.
    #[error("expected at least {required} points but found {found}")]
    TooFewPoints {
        /// Points required.
        required: usize,
        /// Points available.
        found: usize,
    },
    /// First and last positions differ.
    #[error("ring is not closed")]
    NotClosed,
    /// The ring encloses no area.
    #[error("ring encloses no area")]
    ZeroArea,
}

/// Builds geometries from stored coordinates.
///
/// Points are `(lon, lat)` pairs in WGS84 with `x = lon`.
pub trait GeometryEngine {
    /// Build a point geometry.
    ///
    /// # Errors
    /// Returns [`InvalidGeometry`] when the position is unusable.
    fn compute_point(&self, lon: f64, lat: f64) -> Result<Geometry, InvalidGeometry>;

    /// Build a line through `points` in order.
    ///
    /// # Errors
    /// Returns [`InvalidGeometry`] when the points do not form a line.
    fn compute_line(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry>;

    /// Build an area bounded by the closed ring `points`.
    ///
    /// # Errors
    /// Returns [`InvalidGeometry`] when the points do not form a valid ring.
    fn compute_closed_area(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry>;
}

impl<G: GeometryEngine + ?Sized> GeometryEngine for &G {
    fn compute_point(&self, lon: f64, lat: f64) -> Result<Geometry, InvalidGeometry> {
        (**self).compute_point(lon, lat)
    }

    fn compute_line(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry> {
        (**self).compute_line(points)
    }

    fn compute_closed_area(&self, points: &[Coord<f64>]) -> Result<Geometry, InvalidGeometry> {
        (**self).compute_closed_area(points)
    }
}
