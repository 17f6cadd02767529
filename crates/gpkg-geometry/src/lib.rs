//! GeoPackage binary geometry decoder.
//!
//! Catchment boundaries are stored as GeoPackage geometry blobs: a short
//! `GP` header with an optional envelope, followed by a WKB Polygon or
//! MultiPolygon. This crate parses that encoding by hand into
//! [`geo`] polygons and renders it as GeoJSON.
//!
//! Decoding is pure and allocation-local; nothing here holds global state.
//!
//! ```
//! use gpkg_geometry::{decode_row, GeometryRow};
//!
//! // A NULL column value is simply absent, not an error.
//! assert_eq!(decode_row(None), GeometryRow::Absent);
//! ```

pub mod encode;
pub mod error;
pub mod geometry;
pub mod header;
pub mod wkb;

pub use encode::{encode_empty, encode_gpkg, EncodeOptions};
pub use error::DecodeError;
pub use geometry::{CatchmentGeometry, GeometryRow};
pub use header::{parse_header, ByteOrder, Envelope, EnvelopeKind, GpkgHeader};

/// Decode a GeoPackage geometry blob.
///
/// Blobs flagged empty decode to an empty MultiPolygon; use [`decode_row`]
/// to tell those apart from real geometry.
pub fn decode(raw: &[u8]) -> Result<CatchmentGeometry, DecodeError> {
    let header = parse_header(raw)?;
    if header.empty {
        return Ok(CatchmentGeometry::MultiPolygon(geo::MultiPolygon::new(
            Vec::new(),
        )));
    }
    wkb::parse_wkb(&raw[header.wkb_offset..])
}

/// Decode one column value into a tagged row outcome.
pub fn decode_row(raw: Option<&[u8]>) -> GeometryRow {
    let Some(raw) = raw else {
        return GeometryRow::Absent;
    };

    let header = match parse_header(raw) {
        Ok(header) => header,
        Err(e) => return GeometryRow::Malformed(e),
    };
    if header.empty {
        return GeometryRow::Absent;
    }

    match wkb::parse_wkb(&raw[header.wkb_offset..]) {
        Ok(geometry) if geometry.polygons().is_empty() => GeometryRow::Absent,
        Ok(geometry) => GeometryRow::Present(geometry),
        Err(e) => GeometryRow::Malformed(e),
    }
}
