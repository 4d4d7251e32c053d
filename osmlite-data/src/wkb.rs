//! Minimal 2D well-known binary codec.
//!
//! Geometries are written little-endian. The reader accepts either byte
//! order and only extracts bounding boxes, which is all the spatial index
//! needs.

use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use osmlite_core::GeometryKind;

const LITTLE_ENDIAN: u8 = 1;
const POINT: u32 = 1;
const LINE_STRING: u32 = 2;
const POLYGON: u32 = 3;
const MULTI_POINT: u32 = 4;
const MULTI_LINE_STRING: u32 = 5;
const MULTI_POLYGON: u32 = 6;
const GEOMETRY_COLLECTION: u32 = 7;

/// OGC geometry type code for `kind`.
#[must_use]
pub const fn type_code(kind: GeometryKind) -> u32 {
    match kind {
        GeometryKind::Point => POINT,
        GeometryKind::LineString => LINE_STRING,
        GeometryKind::MultiPolygon => MULTI_POLYGON,
    }
}

struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn new(geometry_type: u32) -> Self {
        let mut writer = Self { bytes: Vec::new() };
        writer.header(geometry_type);
        writer
    }

    fn header(&mut self, geometry_type: u32) {
        self.bytes.push(LITTLE_ENDIAN);
        self.count(geometry_type);
    }

    fn count(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn length(&mut self, len: usize) {
        self.count(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn coord(&mut self, coord: Coord<f64>) {
        self.bytes.extend_from_slice(&coord.x.to_le_bytes());
        self.bytes.extend_from_slice(&coord.y.to_le_bytes());
    }

    fn ring(&mut self, ring: &LineString<f64>) {
        self.length(ring.0.len());
        for coord in &ring.0 {
            self.coord(*coord);
        }
    }
}

/// Encode a point.
#[must_use]
pub fn point(coord: Coord<f64>) -> Vec<u8> {
    let mut writer = Writer::new(POINT);
    writer.coord(coord);
    writer.bytes
}

/// Encode a line string.
#[must_use]
pub fn line_string(line: &LineString<f64>) -> Vec<u8> {
    let mut writer = Writer::new(LINE_STRING);
    writer.ring(line);
    writer.bytes
}

/// Encode a multipolygon.
#[must_use]
pub fn multi_polygon(polygons: &MultiPolygon<f64>) -> Vec<u8> {
    let mut writer = Writer::new(MULTI_POLYGON);
    writer.length(polygons.0.len());
    for polygon in &polygons.0 {
        write_polygon(&mut writer, polygon);
    }
    writer.bytes
}

fn write_polygon(writer: &mut Writer, polygon: &Polygon<f64>) {
    writer.header(POLYGON);
    writer.length(1 + polygon.interiors().len());
    writer.ring(polygon.exterior());
    for interior in polygon.interiors() {
        writer.ring(interior);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    little_endian: bool,
    min: Option<Coord<f64>>,
    max: Option<Coord<f64>>,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.bytes.split_first_chunk::<N>()?;
        self.bytes = rest;
        Some(*head)
    }

    fn u32(&mut self) -> Option<u32> {
        let raw = self.take::<4>()?;
        Some(if self.little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    }

    fn f64(&mut self) -> Option<f64> {
        let raw = self.take::<8>()?;
        Some(if self.little_endian {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        })
    }

    fn coord(&mut self) -> Option<()> {
        let x = self.f64()?;
        let y = self.f64()?;
        if x.is_nan() || y.is_nan() {
            return Some(());
        }
        self.min = Some(self.min.map_or(Coord { x, y }, |min| Coord {
            x: min.x.min(x),
            y: min.y.min(y),
        }));
        self.max = Some(self.max.map_or(Coord { x, y }, |max| Coord {
            x: max.x.max(x),
            y: max.y.max(y),
        }));
        Some(())
    }

    fn coords(&mut self) -> Option<()> {
        for _ in 0..self.u32()? {
            self.coord()?;
        }
        Some(())
    }

    fn geometry(&mut self) -> Option<()> {
        let [order] = self.take::<1>()?;
        self.little_endian = order == LITTLE_ENDIAN;
        match self.u32()? {
            POINT => self.coord(),
            LINE_STRING => self.coords(),
            POLYGON => {
                for _ in 0..self.u32()? {
                    self.coords()?;
                }
                Some(())
            }
            MULTI_POINT | MULTI_LINE_STRING | MULTI_POLYGON | GEOMETRY_COLLECTION => {
                for _ in 0..self.u32()? {
                    self.geometry()?;
                }
                Some(())
            }
            _ => None,
        }
    }
}

/// Bounding box of an encoded 2D geometry.
///
/// Returns `None` for truncated or unsupported input and for empty
/// geometries.
#[must_use]
pub fn bounds(bytes: &[u8]) -> Option<Rect<f64>> {
    let mut reader = Reader {
        bytes,
        little_endian: true,
        min: None,
        max: None,
    };
    reader.geometry()?;
    Some(Rect::new(reader.min?, reader.max?))
}
