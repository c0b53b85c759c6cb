//! Pixel codec seam.
//!
//! Decompression of the data section payload is intentionally behind a
//! trait: production binds a JPEG 2000 codestream decoder, tests bind a
//! stub. The decoder core in [`crate::decode`] is identical either way.

use overlay_common::{RawRaster, SeriesSpec};

/// Default ceiling for overlay opacity. Full 255 makes the basemap
/// unreadable under saturated plumes.
pub const DEFAULT_MAX_ALPHA: u8 = 230;

/// Per-series decode parameters handed to the codec alongside the payload.
///
/// `scale` converts the model's native unit to the display unit (kg/m3 to
/// ug/m3 for particulate series). `min_value` maps to alpha 0, `max_value`
/// to `max_alpha`, linearly, clamped at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub scale: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub max_alpha: u8,
}

impl DecodeParams {
    pub fn for_series(spec: &SeriesSpec) -> Self {
        Self {
            scale: spec.unit_scale,
            min_value: spec.overlay_min,
            max_value: spec.overlay_max,
            max_alpha: DEFAULT_MAX_ALPHA,
        }
    }

    /// Alpha for one physical value under these parameters.
    pub fn alpha_for(&self, value: f32) -> u8 {
        if !value.is_finite() {
            return 0;
        }
        let span = self.max_value - self.min_value;
        if span <= 0.0 {
            return 0;
        }
        let t = ((value - self.min_value) / span).clamp(0.0, 1.0);
        (t * self.max_alpha as f32).round() as u8
    }
}

/// Decompresses a data section payload into an alpha raster.
///
/// Returns `None` when the payload is not a stream the codec understands;
/// the decoder surfaces that as a codec failure without attempting
/// recovery.
pub trait PixelCodec: Send + Sync {
    fn decode(&self, payload: &[u8], params: &DecodeParams) -> Option<RawRaster>;
}

/// Deterministic stand-in codec for tests. Ignores the payload bytes and
/// fabricates a raster of the configured shape.
pub struct StubCodec {
    width: u32,
    height: u32,
    mode: StubMode,
}

enum StubMode {
    Produce,
    Decline,
    Inconsistent,
}

impl StubCodec {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mode: StubMode::Produce,
        }
    }

    /// A codec that refuses every payload.
    pub fn declining() -> Self {
        Self {
            width: 0,
            height: 0,
            mode: StubMode::Decline,
        }
    }

    /// A codec that returns a raster whose pixel count disagrees with its
    /// declared dimensions.
    pub fn inconsistent() -> Self {
        Self {
            width: 3,
            height: 3,
            mode: StubMode::Inconsistent,
        }
    }
}

impl PixelCodec for StubCodec {
    fn decode(&self, _payload: &[u8], params: &DecodeParams) -> Option<RawRaster> {
        match self.mode {
            StubMode::Decline => None,
            StubMode::Inconsistent => Some(RawRaster {
                width: self.width,
                height: self.height,
                pixels: vec![0; 4],
                values: None,
            }),
            StubMode::Produce => {
                let n = (self.width * self.height) as usize;
                let pixels: Vec<u8> = (0..n).map(|i| ((i * 37) % 251) as u8).collect();
                let values = pixels
                    .iter()
                    .map(|&p| {
                        params.min_value
                            + (p as f32 / 250.0) * (params.max_value - params.min_value)
                    })
                    .collect();
                Some(RawRaster {
                    width: self.width,
                    height: self.height,
                    pixels,
                    values: Some(values),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_common::Pollutant;

    #[test]
    fn alpha_is_linear_between_the_bounds() {
        let p = DecodeParams {
            scale: 1.0,
            min_value: 0.0,
            max_value: 40.0,
            max_alpha: 230,
        };
        assert_eq!(p.alpha_for(0.0), 0);
        assert_eq!(p.alpha_for(40.0), 230);
        assert_eq!(p.alpha_for(20.0), 115);
    }

    #[test]
    fn alpha_clamps_outside_the_bounds() {
        let p = DecodeParams {
            scale: 1.0,
            min_value: 20.0,
            max_value: 100.0,
            max_alpha: 230,
        };
        assert_eq!(p.alpha_for(-5.0), 0);
        assert_eq!(p.alpha_for(400.0), 230);
        assert_eq!(p.alpha_for(f32::NAN), 0);
    }

    #[test]
    fn for_series_carries_the_series_bounds() {
        let p = DecodeParams::for_series(Pollutant::O3.spec());
        assert_eq!(p.min_value, 20.0);
        assert_eq!(p.max_value, 100.0);
        assert_eq!(p.max_alpha, DEFAULT_MAX_ALPHA);
    }
}
