//! Tests for GeoPackage geometry decoding.
//!
//! Blobs are built with the crate's own encoder for every header layout and
//! checked point by point against the source rings.

use geo::{polygon, MultiPolygon, Polygon};
use gpkg_geometry::{
    decode, decode_row, encode_empty, encode_gpkg, parse_header, ByteOrder, CatchmentGeometry,
    DecodeError, EncodeOptions, EnvelopeKind, GeometryRow,
};

fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ]
}

fn with_hole() -> Polygon<f64> {
    polygon!(
        exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
        interiors: [[(x: 2.0, y: 2.0), (x: 2.0, y: 4.0), (x: 4.0, y: 4.0), (x: 4.0, y: 2.0), (x: 2.0, y: 2.0)]]
    )
}

fn all_layouts() -> Vec<EncodeOptions> {
    let mut layouts = Vec::new();
    for envelope in EnvelopeKind::ALL {
        for byte_order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            layouts.push(EncodeOptions {
                envelope,
                byte_order,
                srs_id: 4326,
            });
        }
    }
    layouts
}

fn points(geometry: &CatchmentGeometry) -> Vec<(f64, f64)> {
    geometry.points().collect()
}

// ============================================================================
// Round trip on point data
// ============================================================================

#[test]
fn test_polygon_points_survive_every_layout() {
    let source = CatchmentGeometry::Polygon(with_hole());
    for options in all_layouts() {
        let blob = encode_gpkg(&source, options);
        let decoded = decode(&blob).unwrap_or_else(|e| panic!("{:?}: {}", options, e));
        assert_eq!(points(&decoded), points(&source), "layout {:?}", options);
        assert!(matches!(decoded, CatchmentGeometry::Polygon(_)));
    }
}

#[test]
fn test_multipolygon_points_survive_every_layout() {
    let source = CatchmentGeometry::MultiPolygon(MultiPolygon::new(vec![
        square(0.0, 0.0, 1.0),
        with_hole(),
        square(-150.25, 60.5, 0.125),
    ]));
    for options in all_layouts() {
        let blob = encode_gpkg(&source, options);
        let decoded = decode(&blob).unwrap();
        assert_eq!(points(&decoded), points(&source), "layout {:?}", options);
        match decoded {
            CatchmentGeometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 3);
                assert_eq!(mp.0[1].interiors().len(), 1);
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }
}

#[test]
fn test_header_reports_layout() {
    let source = CatchmentGeometry::Polygon(square(1.0, 2.0, 3.0));
    for options in all_layouts() {
        let blob = encode_gpkg(&source, options);
        let header = parse_header(&blob).unwrap();
        assert_eq!(header.envelope_kind, options.envelope);
        assert_eq!(header.byte_order, options.byte_order);
        assert_eq!(header.srs_id, 4326);
        assert_eq!(header.wkb_offset, 8 + options.envelope.size());
        if let Some(envelope) = header.envelope {
            assert_eq!(envelope.min_x, 1.0);
            assert_eq!(envelope.max_x, 4.0);
            assert_eq!(envelope.min_y, 2.0);
            assert_eq!(envelope.max_y, 5.0);
        }
    }
}

#[test]
fn test_mixed_byte_order_members() {
    // Header little endian, WKB big endian, and the second member little endian again.
    let mut blob = vec![b'G', b'P', 0, 0b0000_0001];
    blob.extend_from_slice(&4326i32.to_le_bytes());
    blob.push(0);
    blob.extend_from_slice(&6u32.to_be_bytes());
    blob.extend_from_slice(&2u32.to_be_bytes());
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        let mut member = Vec::new();
        gpkg_geometry::encode::encode_wkb(
            &CatchmentGeometry::Polygon(square(0.0, 0.0, 1.0)),
            order,
            &mut member,
        );
        blob.extend_from_slice(&member);
    }
    let decoded = decode(&blob).unwrap();
    assert_eq!(decoded.polygons().len(), 2);
    assert_eq!(decoded.polygons()[0], decoded.polygons()[1]);
}

// ============================================================================
// Row outcomes
// ============================================================================

#[test]
fn test_decode_row_null_is_absent() {
    assert_eq!(decode_row(None), GeometryRow::Absent);
}

#[test]
fn test_decode_row_empty_flag_is_absent() {
    let blob = encode_empty(EncodeOptions::default());
    assert_eq!(decode_row(Some(&blob)), GeometryRow::Absent);
}

#[test]
fn test_decode_row_too_short_is_malformed() {
    let row = decode_row(Some(b"GP"));
    assert!(matches!(
        row,
        GeometryRow::Malformed(DecodeError::TooShort { .. })
    ));
}

#[test]
fn test_decode_row_bad_magic_is_malformed() {
    let mut blob = encode_gpkg(
        &CatchmentGeometry::Polygon(square(0.0, 0.0, 1.0)),
        EncodeOptions::default(),
    );
    blob[0] = b'Z';
    assert!(decode_row(Some(&blob)).is_malformed());
}

#[test]
fn test_decode_row_linestring_is_malformed() {
    let mut blob = vec![b'G', b'P', 0, 1];
    blob.extend_from_slice(&4326i32.to_le_bytes());
    blob.push(1);
    blob.extend_from_slice(&2u32.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(
        decode_row(Some(&blob)),
        GeometryRow::Malformed(DecodeError::UnsupportedGeometryType(2))
    );
}

#[test]
fn test_decode_row_present() {
    let source = CatchmentGeometry::Polygon(square(5.0, 5.0, 2.0));
    let blob = encode_gpkg(&source, EncodeOptions::default());
    let row = decode_row(Some(&blob));
    assert_eq!(row.geometry(), Some(&source));
}

// ============================================================================
// GeoJSON agreement
// ============================================================================

#[test]
fn test_geojson_matches_ring_structure() {
    let source = CatchmentGeometry::MultiPolygon(MultiPolygon::new(vec![
        with_hole(),
        square(20.0, 20.0, 1.0),
    ]));
    let json = serde_json::to_value(source.to_geojson()).unwrap();
    assert_eq!(json["type"], "MultiPolygon");
    let coords = &json["coordinates"];
    assert_eq!(coords.as_array().unwrap().len(), 2);
    assert_eq!(coords[0].as_array().unwrap().len(), 2);
    assert_eq!(coords[1][0][1], serde_json::json!([21.0, 20.0]));
}
