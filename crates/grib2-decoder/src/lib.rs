//! GRIB2 decoder for pollutant overlay rasters (WMO FM 92 GRIB Edition 2).
//!
//! This crate parses the narrow slice of GRIB2 the air-quality models
//! publish: grid definition templates 3.0 (latitude/longitude) and 3.1
//! (rotated latitude/longitude), data representation template 5.40
//! (JPEG 2000 codestream), and the data section itself. Pixel decompression
//! is delegated to a [`PixelCodec`] implementation; this crate never assumes
//! which one is bound.
//!
//! Parsing is a pure computation over the input buffer. All expected
//! malformed-input conditions surface as typed [`DecodeError`] values; the
//! caller keeps whatever raster it already has.

pub mod codec;
pub mod error;
pub mod sections;
pub mod testdata;

use tracing::{debug, info};

pub use codec::{DecodeParams, PixelCodec};
pub use error::DecodeError;
pub use sections::{DataScaling, GridGeometry, GridTemplate, PoleRotation};

use overlay_common::RawRaster;

/// Upper bound on accepted input, a guard against resource exhaustion.
pub const MAX_INPUT_BYTES: usize = 100 * 1024 * 1024;

const GRIB_MAGIC: &[u8; 4] = b"GRIB";
const SUPPORTED_EDITION: u8 = 2;
/// Indicator section length; the section walk starts past it.
const INDICATOR_LEN: usize = 16;

const SECTION_GRID_DEF: u8 = 3;
const SECTION_DATA_REP: u8 = 5;
const SECTION_DATA: u8 = 7;

/// One fully decoded GRIB2 field: grid geometry, value scaling, and the
/// raster produced by the pixel codec. Created as a unit by [`decode`] and
/// replaced as a unit on refresh.
#[derive(Debug, Clone)]
pub struct Grib2Field {
    pub geometry: GridGeometry,
    pub scaling: DataScaling,
    pub raster: RawRaster,
}

/// Decode a GRIB2 message into a [`Grib2Field`].
///
/// Walks the self-describing sections in order, parsing the grid definition
/// and data representation sections, skipping the rest, and handing the data
/// section payload to `codec` together with `params`.
pub fn decode(
    bytes: &[u8],
    params: &DecodeParams,
    codec: &dyn PixelCodec,
) -> Result<Grib2Field, DecodeError> {
    check_indicator(bytes)?;

    let mut geometry: Option<GridGeometry> = None;
    let mut scaling: Option<DataScaling> = None;

    let mut offset = INDICATOR_LEN;
    loop {
        // The 4-byte end marker (and any trailing garbage) ends the walk.
        if bytes.len().saturating_sub(offset) < 6 {
            break;
        }
        let length = sections::read_u32(bytes, offset)? as usize;
        let kind = bytes[offset + 4];
        if length < 5 {
            return Err(DecodeError::Truncated(format!(
                "section {kind} declares impossible length {length}"
            )));
        }
        let section = bytes
            .get(offset..offset + length)
            .ok_or_else(|| DecodeError::Truncated(format!(
                "section {kind} declares {length} bytes but only {} remain",
                bytes.len() - offset
            )))?;

        match kind {
            SECTION_GRID_DEF => {
                let parsed = sections::parse_grid_definition(section)?;
                debug!(
                    ni = parsed.ni,
                    nj = parsed.nj,
                    template = ?parsed.template,
                    "parsed grid definition section"
                );
                geometry = Some(parsed);
            }
            SECTION_DATA_REP => {
                let parsed = sections::parse_data_representation(section)?;
                info!(
                    points = parsed.point_count,
                    template = parsed.payload_template,
                    "parsed data representation section"
                );
                scaling = Some(parsed);
            }
            SECTION_DATA => {
                return decode_data_section(section, geometry, scaling, params, codec);
            }
            _ => {} // Other sections only contribute the length to skip
        }

        offset += length;
        if offset >= bytes.len() {
            break;
        }
    }

    Err(DecodeError::Truncated(
        "stream ended before the data section".to_string(),
    ))
}

fn decode_data_section(
    section: &[u8],
    geometry: Option<GridGeometry>,
    scaling: Option<DataScaling>,
    params: &DecodeParams,
    codec: &dyn PixelCodec,
) -> Result<Grib2Field, DecodeError> {
    let geometry = geometry.ok_or_else(|| {
        DecodeError::Truncated("data section before any grid definition".to_string())
    })?;
    let scaling = scaling.ok_or_else(|| {
        DecodeError::CodecFailure("data section before any data representation".to_string())
    })?;

    let payload = &section[5..];
    let raster = codec
        .decode(payload, params)
        .ok_or_else(|| DecodeError::CodecFailure("codec declined the payload".to_string()))?;

    if !raster.is_consistent() {
        return Err(DecodeError::CodecFailure(format!(
            "codec returned {} pixels for a {}x{} raster",
            raster.pixels.len(),
            raster.width,
            raster.height
        )));
    }

    Ok(Grib2Field {
        geometry,
        scaling,
        raster,
    })
}

fn check_indicator(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.len() > MAX_INPUT_BYTES {
        return Err(DecodeError::TooLarge(bytes.len()));
    }
    if bytes.len() < INDICATOR_LEN {
        return Err(DecodeError::Truncated(format!(
            "{} bytes is shorter than the {INDICATOR_LEN}-byte indicator section",
            bytes.len()
        )));
    }
    if &bytes[0..4] != GRIB_MAGIC {
        return Err(DecodeError::BadMagic);
    }
    // Octet 8 of the indicator section is the edition number
    let edition = bytes[7];
    if edition != SUPPORTED_EDITION {
        return Err(DecodeError::UnsupportedVersion(edition));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StubCodec;
    use crate::testdata::Grib2MessageBuilder;

    fn params() -> DecodeParams {
        DecodeParams {
            scale: 1.0e9,
            min_value: 0.0,
            max_value: 40.0,
            max_alpha: 230,
        }
    }

    #[test]
    fn rejects_short_buffer() {
        let err = decode(&[0u8; 8], &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated(_)));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut msg = Grib2MessageBuilder::rotated_2x2().build();
        msg[0] = b'X';
        let err = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic));
    }

    #[test]
    fn rejects_wrong_edition() {
        let mut msg = Grib2MessageBuilder::rotated_2x2().build();
        msg[7] = 1;
        let err = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion(1)));
    }

    #[test]
    fn rejects_oversized_input_without_reading_it() {
        let msg = vec![0u8; MAX_INPUT_BYTES + 1];
        let err = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge(_)));
    }

    #[test]
    fn rejects_unsupported_grid_template() {
        let msg = Grib2MessageBuilder::rotated_2x2().grid_template(30).build();
        let err = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedGridTemplate(30)));
    }

    #[test]
    fn rejects_unsupported_payload_template() {
        let msg = Grib2MessageBuilder::rotated_2x2().payload_template(0).build();
        let err = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedPayloadTemplate(0)));
    }

    #[test]
    fn codec_decline_is_a_codec_failure() {
        let msg = Grib2MessageBuilder::rotated_2x2().build();
        let err = decode(&msg, &params(), &StubCodec::declining()).unwrap_err();
        assert!(matches!(err, DecodeError::CodecFailure(_)));
    }

    #[test]
    fn inconsistent_raster_is_a_codec_failure() {
        let msg = Grib2MessageBuilder::rotated_2x2().build();
        // Stub claims 3x3 but the builder's grid is irrelevant; the stub
        // produces a short pixel buffer on purpose.
        let err = decode(&msg, &params(), &StubCodec::inconsistent()).unwrap_err();
        assert!(matches!(err, DecodeError::CodecFailure(_)));
    }

    #[test]
    fn decodes_rotated_message_end_to_end() {
        let msg = Grib2MessageBuilder::rotated_2x2().build();
        let field = decode(&msg, &params(), &StubCodec::new(2, 2)).unwrap();

        assert_eq!(field.geometry.template, GridTemplate::RotatedLatLon);
        assert_eq!(field.geometry.ni, 2);
        assert_eq!(field.geometry.nj, 2);
        let rot = field.geometry.rotation.as_ref().unwrap();
        assert!((rot.south_pole_lat_deg - (-31.758312)).abs() < 1e-5);
        assert_eq!(field.raster.width, 2);
        assert_eq!(field.raster.height, 2);
        assert_eq!(field.scaling.payload_template, 40);
    }

    #[test]
    fn skips_unknown_sections() {
        let msg = Grib2MessageBuilder::rotated_2x2()
            .with_local_use_section(32)
            .build();
        assert!(decode(&msg, &params(), &StubCodec::new(2, 2)).is_ok());
    }
}
