//! Decode failure taxonomy.

use thiserror::Error;

use crate::MAX_INPUT_BYTES;

/// Reasons a GRIB2 message can be rejected.
///
/// All variants are recoverable from the caller's perspective: a failed
/// decode leaves any previously decoded raster in place.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input of {0} bytes exceeds the {MAX_INPUT_BYTES} byte limit")]
    TooLarge(usize),

    #[error("missing GRIB magic bytes")]
    BadMagic,

    #[error("unsupported GRIB edition {0}, only edition 2 is supported")]
    UnsupportedVersion(u8),

    #[error("unsupported grid definition template 3.{0}, only 3.0 and 3.1 are supported")]
    UnsupportedGridTemplate(u16),

    #[error("unsupported data representation template 5.{0}, only 5.40 (JPEG 2000) is supported")]
    UnsupportedPayloadTemplate(u16),

    #[error("truncated GRIB2 stream: {0}")]
    Truncated(String),

    #[error("pixel codec failure: {0}")]
    CodecFailure(String),
}
