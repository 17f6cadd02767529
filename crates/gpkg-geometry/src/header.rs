//! GeoPackage binary header parsing.
//!
//! Layout (GeoPackage 1.x, "StandardGeoPackageBinary"):
//!
//! ```text
//! offset  size  field
//! 0       2     magic "GP"
//! 2       1     version (0 = version 1)
//! 3       1     flags
//! 4       4     srs_id (int32, byte order from flags bit 0)
//! 8       n     envelope, n in {0, 32, 48, 48, 64}
//! 8+n     ...   WKB geometry
//! ```
//!
//! Flags byte: bit 0 header byte order (1 = little endian), bits 1-3
//! envelope indicator, bit 4 empty geometry, bit 5 extended type.

use crate::DecodeError;

/// Fixed part of the header before the envelope.
pub const FIXED_HEADER_LEN: usize = 8;

const MAGIC: [u8; 2] = *b"GP";

/// Byte order of multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// WKB byte order marker: 0 = big endian (XDR), 1 = little endian (NDR).
    pub fn from_wkb_marker(marker: u8) -> Result<Self, DecodeError> {
        match marker {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            other => Err(DecodeError::InvalidByteOrder(other)),
        }
    }

    pub fn wkb_marker(self) -> u8 {
        match self {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => 1,
        }
    }

    pub(crate) fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        }
    }

    pub(crate) fn i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
        }
    }

    pub(crate) fn f64(self, bytes: [u8; 8]) -> f64 {
        match self {
            ByteOrder::BigEndian => f64::from_be_bytes(bytes),
            ByteOrder::LittleEndian => f64::from_le_bytes(bytes),
        }
    }

    pub(crate) fn put_u32(self, out: &mut Vec<u8>, value: u32) {
        match self {
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    pub(crate) fn put_i32(self, out: &mut Vec<u8>, value: i32) {
        match self {
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    pub(crate) fn put_f64(self, out: &mut Vec<u8>, value: f64) {
        match self {
            ByteOrder::BigEndian => out.extend_from_slice(&value.to_be_bytes()),
            ByteOrder::LittleEndian => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Envelope indicator from flag bits 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// No envelope (0 bytes)
    None,
    /// [minx, maxx, miny, maxy] (32 bytes)
    Xy,
    /// [minx, maxx, miny, maxy, minz, maxz] (48 bytes)
    Xyz,
    /// [minx, maxx, miny, maxy, minm, maxm] (48 bytes)
    Xym,
    /// [minx, maxx, miny, maxy, minz, maxz, minm, maxm] (64 bytes)
    Xyzm,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 5] = [
        EnvelopeKind::None,
        EnvelopeKind::Xy,
        EnvelopeKind::Xyz,
        EnvelopeKind::Xym,
        EnvelopeKind::Xyzm,
    ];

    pub fn from_indicator(indicator: u8) -> Result<Self, DecodeError> {
        match indicator {
            0 => Ok(EnvelopeKind::None),
            1 => Ok(EnvelopeKind::Xy),
            2 => Ok(EnvelopeKind::Xyz),
            3 => Ok(EnvelopeKind::Xym),
            4 => Ok(EnvelopeKind::Xyzm),
            other => Err(DecodeError::InvalidEnvelope(other)),
        }
    }

    pub fn indicator(self) -> u8 {
        match self {
            EnvelopeKind::None => 0,
            EnvelopeKind::Xy => 1,
            EnvelopeKind::Xyz => 2,
            EnvelopeKind::Xym => 3,
            EnvelopeKind::Xyzm => 4,
        }
    }

    /// Envelope size in bytes.
    pub fn size(self) -> usize {
        match self {
            EnvelopeKind::None => 0,
            EnvelopeKind::Xy => 32,
            EnvelopeKind::Xyz | EnvelopeKind::Xym => 48,
            EnvelopeKind::Xyzm => 64,
        }
    }
}

/// Envelope stored in the header. Informational only; indexes are built
/// from the decoded rings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub z: Option<(f64, f64)>,
    pub m: Option<(f64, f64)>,
}

/// Parsed GeoPackage binary header.
#[derive(Debug, Clone, PartialEq)]
pub struct GpkgHeader {
    pub version: u8,
    pub byte_order: ByteOrder,
    pub envelope_kind: EnvelopeKind,
    pub empty: bool,
    pub srs_id: i32,
    pub envelope: Option<Envelope>,
    /// Offset of the WKB payload from the start of the blob.
    pub wkb_offset: usize,
}

/// Parse the header at the start of a GeoPackage geometry blob.
pub fn parse_header(data: &[u8]) -> Result<GpkgHeader, DecodeError> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(DecodeError::TooShort {
            needed: FIXED_HEADER_LEN,
            available: data.len(),
        });
    }

    if data[0..2] != MAGIC {
        return Err(DecodeError::BadMagic([data[0], data[1]]));
    }

    let version = data[2];
    if version != 0 {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let flags = data[3];
    if flags & 0b0010_0000 != 0 {
        return Err(DecodeError::ExtendedType);
    }
    let empty = flags & 0b0001_0000 != 0;
    let envelope_kind = EnvelopeKind::from_indicator((flags >> 1) & 0b111)?;
    let byte_order = if flags & 0b1 == 1 {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    };

    let srs_id = byte_order.i32([data[4], data[5], data[6], data[7]]);

    let wkb_offset = FIXED_HEADER_LEN + envelope_kind.size();
    if data.len() < wkb_offset {
        return Err(DecodeError::TooShort {
            needed: wkb_offset,
            available: data.len(),
        });
    }

    let envelope = match envelope_kind {
        EnvelopeKind::None => None,
        kind => {
            let values: Vec<f64> = data[FIXED_HEADER_LEN..wkb_offset]
                .chunks_exact(8)
                .map(|c| byte_order.f64([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            let (z, m) = match kind {
                EnvelopeKind::Xyz => (Some((values[4], values[5])), None),
                EnvelopeKind::Xym => (None, Some((values[4], values[5]))),
                EnvelopeKind::Xyzm => (
                    Some((values[4], values[5])),
                    Some((values[6], values[7])),
                ),
                _ => (None, None),
            };
            Some(Envelope {
                min_x: values[0],
                max_x: values[1],
                min_y: values[2],
                max_y: values[3],
                z,
                m,
            })
        }
    };

    Ok(GpkgHeader {
        version,
        byte_order,
        envelope_kind,
        empty,
        srs_id,
        envelope,
        wkb_offset,
    })
}
