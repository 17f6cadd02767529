//! Decode errors for GeoPackage geometry blobs.

use thiserror::Error;

/// Why a single geometry blob could not be decoded.
///
/// These never fail a whole load; the loader records the row as malformed
/// and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("blob too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    #[error("bad magic bytes: expected 'GP', got {0:?}")]
    BadMagic([u8; 2]),

    #[error("unsupported GeoPackage binary version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid envelope indicator {0}")]
    InvalidEnvelope(u8),

    #[error("extended GeoPackage geometry types are not supported")]
    ExtendedType,

    #[error("invalid WKB byte order marker {0}")]
    InvalidByteOrder(u8),

    #[error("unsupported WKB geometry type {0}")]
    UnsupportedGeometryType(u32),

    #[error("truncated WKB at offset {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },

    #[error("{what} count {count} exceeds remaining payload")]
    CountTooLarge { what: &'static str, count: u32 },
}
