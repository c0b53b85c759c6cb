//! Decoded raster payload produced by the pixel codec.

use serde::{Deserialize, Serialize};

/// A decoded single-channel raster.
///
/// `pixels` is row-major (left-to-right, top-to-bottom), one byte per grid
/// point, used as an alpha-like channel (0 = fully transparent). `values`
/// optionally carries the physical quantity at each point, in display units,
/// parallel to `pixels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub values: Option<Vec<f32>>,
}

impl RawRaster {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, values: Option<Vec<f32>>) -> Self {
        Self {
            width,
            height,
            pixels,
            values,
        }
    }

    /// Number of grid points the dimensions declare.
    pub fn point_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the buffers match the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.point_count()
            && self
                .values
                .as_ref()
                .map_or(true, |v| v.len() == self.pixels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_checks_both_buffers() {
        let r = RawRaster::new(2, 3, vec![0; 6], None);
        assert!(r.is_consistent());

        let r = RawRaster::new(2, 3, vec![0; 6], Some(vec![0.0; 6]));
        assert!(r.is_consistent());

        let r = RawRaster::new(2, 3, vec![0; 5], None);
        assert!(!r.is_consistent());

        let r = RawRaster::new(2, 3, vec![0; 6], Some(vec![0.0; 4]));
        assert!(!r.is_consistent());
    }
}
