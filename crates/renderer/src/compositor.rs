//! Per-tile overlay rendering.
//!
//! For every pixel of a requested tile the compositor walks backwards
//! through the coordinate chain: tile pixel to absolute basemap pixel,
//! basemap pixel to latitude/longitude through the inverse projection, then
//! into the model grid through the sampler. The sampled alpha tints the
//! basemap with the overlay colour. This loop runs tile_size^2 times per
//! tile and is the hottest path in the system; rows are rendered in
//! parallel and nothing in the loop allocates.

use rayon::prelude::*;

use grid_sampler::GridSampler;
use overlay_common::TileCoord;
use projection::MapTransformer;

use crate::png;
use crate::RenderError;

/// Tile layout and overlay appearance.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Square tile edge, pixels
    pub tile_size: u32,
    /// Number of zoom levels; the deepest level is 1:1 with basemap pixels
    pub level_count: u32,
    /// Overlay tint, RGB
    pub overlay_rgb: [u8; 3],
    /// Sampled alpha at or above this renders fully saturated. Kept below
    /// 255 so the basemap is never completely obscured.
    pub saturation_alpha: u8,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            level_count: 9,
            overlay_rgb: [0x6B, 0x3A, 0x1E], // dark brown
            saturation_alpha: 230,
        }
    }
}

/// An RGBA image, row-major, 4 bytes per pixel.
#[derive(Debug, Clone)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TileImage {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    fn is_consistent(&self) -> bool {
        self.pixels.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

/// Renders overlay tiles against a fixed basemap transform.
pub struct TileCompositor {
    config: CompositorConfig,
    transformer: MapTransformer,
}

impl TileCompositor {
    pub fn new(config: CompositorConfig, transformer: MapTransformer) -> Self {
        Self {
            config,
            transformer,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Render one tile as encoded PNG bytes.
    ///
    /// With no sampler the base tile is encoded unmodified; a missing
    /// overlay never fails a tile request.
    pub fn render(
        &self,
        coord: TileCoord,
        sampler: Option<&GridSampler>,
        base: &TileImage,
    ) -> Result<Vec<u8>, RenderError> {
        let size = self.config.tile_size;
        if base.width != size || base.height != size || !base.is_consistent() {
            return Err(RenderError::BufferShape {
                expected: (size as usize) * (size as usize) * 4,
                actual: base.pixels.len(),
            });
        }

        let Some(sampler) = sampler else {
            return png::encode_rgba(&base.pixels, size, size);
        };

        // Zoom scale relative to the deepest level: 1.0 at the bottom,
        // halving at each level up.
        let scale = 2f64.powi(coord.zoom as i32 - (self.config.level_count as i32 - 1));
        let tile_span = size as f64 / scale;
        let origin_x = coord.col as f64 * tile_span;
        let origin_y = coord.row as f64 * tile_span;

        let stride = (size as usize) * 4;
        let mut out = base.pixels.clone();
        let [or, og, ob] = self.config.overlay_rgb;
        let saturation = self.config.saturation_alpha;

        out.par_chunks_mut(stride)
            .enumerate()
            .for_each(|(tile_y, row)| {
                let world_y = origin_y + tile_y as f64 / scale;
                for (tile_x, px) in row.chunks_exact_mut(4).enumerate() {
                    let world_x = origin_x + tile_x as f64 / scale;

                    let (lat, lon) = self.transformer.pixel_to_lat_lon(world_x, world_y);
                    let a = sampler.alpha_at_lat_lon(lat, lon);
                    if a <= 0.0 {
                        continue; // outside the grid or fully transparent
                    }
                    let alpha = (a.round() as u8).min(saturation);
                    blend_over(px, or, og, ob, alpha);
                }
            });

        png::encode_rgba(&out, size, size)
    }
}

/// Source-over composite of one overlay pixel onto a base pixel, in place.
#[inline]
fn blend_over(dst: &mut [u8], sr: u8, sg: u8, sb: u8, sa: u8) {
    let sa16 = sa as u16;
    let inv = 255 - sa16;
    dst[0] = ((sr as u16 * sa16 + dst[0] as u16 * inv) / 255) as u8;
    dst[1] = ((sg as u16 * sa16 + dst[1] as u16 * inv) / 255) as u8;
    dst[2] = ((sb as u16 * sa16 + dst[2] as u16 * inv) / 255) as u8;
    dst[3] = (sa16 + dst[3] as u16 * inv / 255) as u8;
}
