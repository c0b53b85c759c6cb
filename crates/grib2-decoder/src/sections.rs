//! GRIB2 section parsing.
//!
//! Sections arrive as self-describing blocks: a 4-byte big-endian length,
//! a 1-byte section kind, then the section body. The functions here take the
//! full section slice (length prefix included) so byte offsets match the
//! GRIB2 documentation's octet numbering minus one.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Grid definition template kinds this decoder accepts (code table 3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridTemplate {
    /// Template 3.0: latitude/longitude (equidistant cylindrical)
    PlainLatLon,
    /// Template 3.1: rotated latitude/longitude
    RotatedLatLon,
}

/// Rotated-pole parameters from a template 3.1 grid definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoleRotation {
    pub south_pole_lat_deg: f64,
    pub south_pole_lon_deg: f64,
    pub angle_deg: f64,
}

/// Section 3: grid geometry. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub template: GridTemplate,
    /// Points along a parallel (grid width)
    pub ni: u32,
    /// Points along a meridian (grid height)
    pub nj: u32,
    pub first_lat_deg: f64,
    pub first_lon_deg: f64,
    pub last_lat_deg: f64,
    pub last_lon_deg: f64,
    /// Latitude increment, sign-corrected by the scan flags
    pub d_lat_deg: f64,
    /// Longitude increment, sign-corrected by the scan flags
    pub d_lon_deg: f64,
    pub scan_mode: u8,
    /// Present only for [`GridTemplate::RotatedLatLon`]
    pub rotation: Option<PoleRotation>,
}

/// Serialized form of [`DataScaling`], without the precomputed factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingParams {
    pub reference_value: f32,
    pub binary_scale: i16,
    pub decimal_scale: i16,
    pub bits_per_value: u16,
    pub original_type: u16,
    pub payload_template: u16,
    pub point_count: u32,
}

/// Section 5: value scaling metadata.
///
/// Packed integers map to physical values as `(R + raw * 2^E) * 10^-D`.
/// Both powers are computed once at construction since `scale` sits on the
/// per-pixel path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScalingParams", into = "ScalingParams")]
pub struct DataScaling {
    pub reference_value: f32,
    pub binary_scale: i16,
    pub decimal_scale: i16,
    pub bits_per_value: u16,
    pub original_type: u16,
    pub payload_template: u16,
    pub point_count: u32,
    pow2_e: f64,
    pow10_neg_d: f64,
}

impl DataScaling {
    pub fn new(params: ScalingParams) -> Self {
        Self {
            pow2_e: 2f64.powi(params.binary_scale as i32),
            pow10_neg_d: 10f64.powi(-(params.decimal_scale as i32)),
            reference_value: params.reference_value,
            binary_scale: params.binary_scale,
            decimal_scale: params.decimal_scale,
            bits_per_value: params.bits_per_value,
            original_type: params.original_type,
            payload_template: params.payload_template,
            point_count: params.point_count,
        }
    }

    /// Physical value of one packed integer.
    pub fn scale(&self, raw: u32) -> f64 {
        (self.reference_value as f64 + raw as f64 * self.pow2_e) * self.pow10_neg_d
    }
}

impl From<ScalingParams> for DataScaling {
    fn from(params: ScalingParams) -> Self {
        Self::new(params)
    }
}

impl From<DataScaling> for ScalingParams {
    fn from(s: DataScaling) -> Self {
        Self {
            reference_value: s.reference_value,
            binary_scale: s.binary_scale,
            decimal_scale: s.decimal_scale,
            bits_per_value: s.bits_per_value,
            original_type: s.original_type,
            payload_template: s.payload_template,
            point_count: s.point_count,
        }
    }
}

const TEMPLATE_LAT_LON: u16 = 0;
const TEMPLATE_ROTATED_LAT_LON: u16 = 1;
const TEMPLATE_JPEG2000: u16 = 40;

/// Degrees per encoded angle unit when the basic angle is not declared.
const DEFAULT_DEGREES_PER_UNIT: f64 = 1.0e-6;

/// Parse section 3 (grid definition).
///
/// Template layout, relative to the template body at byte 14:
/// earth shape and radii (0..15), Ni/Nj (16..23), basic angle and
/// subdivisions (24..31), first point (32..39), resolution flags (40),
/// last point (41..48), i/j increments (49..56), scan mode (57).
/// Template 3.1 appends the south pole and rotation angle (58..69).
pub fn parse_grid_definition(section: &[u8]) -> Result<GridGeometry, DecodeError> {
    let template = read_u16(section, 12)?;
    let template = match template {
        TEMPLATE_LAT_LON => GridTemplate::PlainLatLon,
        TEMPLATE_ROTATED_LAT_LON => GridTemplate::RotatedLatLon,
        other => return Err(DecodeError::UnsupportedGridTemplate(other)),
    };

    let gd = 14usize;

    let ni = read_u32(section, gd + 16)?;
    let nj = read_u32(section, gd + 20)?;

    // Basic angle and its subdivisions define the degrees-per-unit factor;
    // zero in either field means the default microdegree encoding.
    let basic_angle = read_u32(section, gd + 24)?;
    let subdivisions = read_u32(section, gd + 28)?;
    let unit = if basic_angle == 0 || subdivisions == 0 {
        DEFAULT_DEGREES_PER_UNIT
    } else {
        basic_angle as f64 / subdivisions as f64
    };

    let first_lat_deg = read_i32(section, gd + 32)? as f64 * unit;
    let first_lon_deg = read_i32(section, gd + 36)? as f64 * unit;
    let last_lat_deg = read_i32(section, gd + 41)? as f64 * unit;
    let last_lon_deg = read_i32(section, gd + 45)? as f64 * unit;

    let di = read_u32(section, gd + 49)? as f64 * unit;
    let dj = read_u32(section, gd + 53)? as f64 * unit;
    let scan_mode = *section
        .get(gd + 57)
        .ok_or_else(|| truncated_section(3, section.len()))?;

    // Scan flag bit 7: points scan in the -i direction.
    // Scan flag bit 6: points scan in the +j direction.
    let d_lon_deg = if scan_mode & 0x80 != 0 { -di } else { di };
    let d_lat_deg = if scan_mode & 0x40 != 0 { dj } else { -dj };

    let rotation = match template {
        GridTemplate::PlainLatLon => None,
        GridTemplate::RotatedLatLon => Some(PoleRotation {
            south_pole_lat_deg: read_i32(section, gd + 58)? as f64 * unit,
            south_pole_lon_deg: read_i32(section, gd + 62)? as f64 * unit,
            angle_deg: read_i32(section, gd + 66)? as f64 * unit,
        }),
    };

    Ok(GridGeometry {
        template,
        ni,
        nj,
        first_lat_deg,
        first_lon_deg,
        last_lat_deg,
        last_lon_deg,
        d_lat_deg,
        d_lon_deg,
        scan_mode,
        rotation,
    })
}

/// Parse section 5 (data representation).
pub fn parse_data_representation(section: &[u8]) -> Result<DataScaling, DecodeError> {
    let point_count = read_u32(section, 5)?;
    let payload_template = read_u16(section, 9)?;
    if payload_template != TEMPLATE_JPEG2000 {
        return Err(DecodeError::UnsupportedPayloadTemplate(payload_template));
    }

    let reference_value = read_f32(section, 11)?;
    let binary_scale = read_i16(section, 15)?;
    let decimal_scale = read_i16(section, 17)?;
    let bits_per_value = read_u16(section, 19)?;
    let original_type = read_u16(section, 21)?;

    Ok(DataScaling::new(ScalingParams {
        reference_value,
        binary_scale,
        decimal_scale,
        bits_per_value,
        original_type,
        payload_template,
        point_count,
    }))
}

fn truncated_section(kind: u8, len: usize) -> DecodeError {
    DecodeError::Truncated(format!("section {kind} is only {len} bytes"))
}

// GRIB2 is big-endian throughout.

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let b = field(bytes, offset, 4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> Result<i32, DecodeError> {
    let b = field(bytes, offset, 4)?;
    Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let b = field(bytes, offset, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

pub(crate) fn read_i16(bytes: &[u8], offset: usize) -> Result<i16, DecodeError> {
    let b = field(bytes, offset, 2)?;
    Ok(i16::from_be_bytes([b[0], b[1]]))
}

pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> Result<f32, DecodeError> {
    let b = field(bytes, offset, 4)?;
    Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn field(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    bytes.get(offset..offset + len).ok_or_else(|| {
        DecodeError::Truncated(format!(
            "read of {len} bytes at offset {offset} past end ({} bytes)",
            bytes.len()
        ))
    })
}
