//! GeoPackage binary encoder.
//!
//! Used to build fixture databases and to check decoding against known
//! point sequences. Z and M envelope ranges are written as zeros since the
//! geometry is strictly 2D.

use geo::Polygon;

use crate::header::{ByteOrder, EnvelopeKind};
use crate::wkb::{WKB_MULTI_POLYGON, WKB_POLYGON};
use crate::CatchmentGeometry;

/// Options controlling the header layout of an encoded blob.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub envelope: EnvelopeKind,
    /// Byte order used for the header, envelope and WKB payload.
    pub byte_order: ByteOrder,
    pub srs_id: i32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            envelope: EnvelopeKind::Xy,
            byte_order: ByteOrder::LittleEndian,
            srs_id: 4326,
        }
    }
}

/// Encode a geometry as a GeoPackage geometry blob.
pub fn encode_gpkg(geometry: &CatchmentGeometry, options: EncodeOptions) -> Vec<u8> {
    let order = options.byte_order;
    let mut out = Vec::with_capacity(64);

    out.extend_from_slice(b"GP");
    out.push(0);
    let order_bit = match order {
        ByteOrder::LittleEndian => 1,
        ByteOrder::BigEndian => 0,
    };
    out.push((options.envelope.indicator() << 1) | order_bit);
    order.put_i32(&mut out, options.srs_id);

    if options.envelope != EnvelopeKind::None {
        let (min_x, max_x, min_y, max_y) = match geometry.bbox() {
            Some(b) => (b.min_x, b.max_x, b.min_y, b.max_y),
            None => (f64::NAN, f64::NAN, f64::NAN, f64::NAN),
        };
        for v in [min_x, max_x, min_y, max_y] {
            order.put_f64(&mut out, v);
        }
        let extra = (options.envelope.size() - 32) / 8;
        for _ in 0..extra {
            order.put_f64(&mut out, 0.0);
        }
    }

    encode_wkb(geometry, order, &mut out);
    out
}

/// Encode a GeoPackage blob flagged as the empty geometry.
pub fn encode_empty(options: EncodeOptions) -> Vec<u8> {
    let order = options.byte_order;
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(b"GP");
    out.push(0);
    let order_bit = match order {
        ByteOrder::LittleEndian => 1,
        ByteOrder::BigEndian => 0,
    };
    out.push(0b0001_0000 | order_bit);
    order.put_i32(&mut out, options.srs_id);
    // Empty polygon payload
    out.push(order.wkb_marker());
    order.put_u32(&mut out, WKB_POLYGON);
    order.put_u32(&mut out, 0);
    out
}

/// Append a WKB Polygon or MultiPolygon.
pub fn encode_wkb(geometry: &CatchmentGeometry, order: ByteOrder, out: &mut Vec<u8>) {
    match geometry {
        CatchmentGeometry::Polygon(p) => write_polygon(p, order, out),
        CatchmentGeometry::MultiPolygon(mp) => {
            out.push(order.wkb_marker());
            order.put_u32(out, WKB_MULTI_POLYGON);
            order.put_u32(out, mp.0.len() as u32);
            for p in &mp.0 {
                write_polygon(p, order, out);
            }
        }
    }
}

fn write_polygon(polygon: &Polygon<f64>, order: ByteOrder, out: &mut Vec<u8>) {
    out.push(order.wkb_marker());
    order.put_u32(out, WKB_POLYGON);
    order.put_u32(out, 1 + polygon.interiors().len() as u32);
    for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors().iter()) {
        order.put_u32(out, ring.0.len() as u32);
        for c in ring.coords() {
            order.put_f64(out, c.x);
            order.put_f64(out, c.y);
        }
    }
}
