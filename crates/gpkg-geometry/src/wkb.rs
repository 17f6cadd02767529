//! Well-known binary reader for 2D Polygon and MultiPolygon payloads.

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::header::ByteOrder;
use crate::{CatchmentGeometry, DecodeError};

pub const WKB_POLYGON: u32 = 3;
pub const WKB_MULTI_POLYGON: u32 = 6;

/// Bytes per XY coordinate pair.
const POINT_SIZE: usize = 16;

/// Cursor over a WKB payload. Every read is bounds checked; counts are
/// checked against the remaining payload before allocating.
struct WkbReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WkbReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        if self.remaining() < N {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                what,
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    fn byte_order(&mut self) -> Result<ByteOrder, DecodeError> {
        let [marker] = self.take::<1>("byte order")?;
        ByteOrder::from_wkb_marker(marker)
    }

    fn u32(&mut self, order: ByteOrder, what: &'static str) -> Result<u32, DecodeError> {
        Ok(order.u32(self.take::<4>(what)?))
    }

    fn f64(&mut self, order: ByteOrder) -> Result<f64, DecodeError> {
        Ok(order.f64(self.take::<8>("coordinate")?))
    }

    /// Read a count and reject it if even the smallest possible element
    /// could not fit in what is left.
    fn count(
        &mut self,
        order: ByteOrder,
        what: &'static str,
        min_element_size: usize,
    ) -> Result<usize, DecodeError> {
        let count = self.u32(order, what)?;
        if (count as usize).saturating_mul(min_element_size) > self.remaining() {
            return Err(DecodeError::CountTooLarge { what, count });
        }
        Ok(count as usize)
    }

    fn ring(&mut self, order: ByteOrder) -> Result<LineString<f64>, DecodeError> {
        let num_points = self.count(order, "point", POINT_SIZE)?;
        let mut coords = Vec::with_capacity(num_points);
        for _ in 0..num_points {
            let x = self.f64(order)?;
            let y = self.f64(order)?;
            coords.push(Coord { x, y });
        }
        Ok(LineString::new(coords))
    }

    /// Polygon body: ring count, then rings. The first ring is the exterior.
    fn polygon_body(&mut self, order: ByteOrder) -> Result<Polygon<f64>, DecodeError> {
        let num_rings = self.count(order, "ring", 4)?;
        let mut rings = Vec::with_capacity(num_rings);
        for _ in 0..num_rings {
            rings.push(self.ring(order)?);
        }
        let mut rings = rings.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }
}

/// Parse a WKB Polygon or MultiPolygon.
pub fn parse_wkb(data: &[u8]) -> Result<CatchmentGeometry, DecodeError> {
    let mut reader = WkbReader::new(data);
    let order = reader.byte_order()?;
    let geometry_type = reader.u32(order, "geometry type")?;

    match geometry_type {
        WKB_POLYGON => Ok(CatchmentGeometry::Polygon(reader.polygon_body(order)?)),
        WKB_MULTI_POLYGON => {
            // Each member is a full WKB Polygon with its own byte order and type
            let num_polygons = reader.count(order, "polygon", 9)?;
            let mut polygons = Vec::with_capacity(num_polygons);
            for _ in 0..num_polygons {
                let inner_order = reader.byte_order()?;
                let inner_type = reader.u32(inner_order, "geometry type")?;
                if inner_type != WKB_POLYGON {
                    return Err(DecodeError::UnsupportedGeometryType(inner_type));
                }
                polygons.push(reader.polygon_body(inner_order)?);
            }
            Ok(CatchmentGeometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        other => Err(DecodeError::UnsupportedGeometryType(other)),
    }
}
